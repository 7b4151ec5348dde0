use super::errors::{DenyReason, LifecycleError};
use super::transition_gate::{Actor, Role};
use super::value_objects::{OrderStatus, UserId};
use crate::store::{OrderFilter, OrderSort};

// ============================================================================
// Boards - the order lists each observer renders
// ============================================================================
//
//   Kitchen   PREPARING   oldest first   CHEF, OWNER
//   Pending   PENDING     oldest first   STAFF, CHEF, OWNER
//   Ready     READY       oldest first   STAFF, OWNER
//   Customer  own orders  newest first   that customer, STAFF, OWNER
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Board {
    Kitchen,
    Pending,
    Ready,
    Customer(UserId),
}

impl Board {
    pub fn filter(&self) -> OrderFilter {
        match self {
            Board::Kitchen => OrderFilter::status(OrderStatus::Preparing),
            Board::Pending => OrderFilter::status(OrderStatus::Pending),
            Board::Ready => OrderFilter::status(OrderStatus::Ready),
            Board::Customer(customer_id) => OrderFilter::customer(customer_id.clone()),
        }
    }

    pub fn sort(&self) -> OrderSort {
        match self {
            Board::Kitchen | Board::Pending | Board::Ready => OrderSort::CreatedAsc,
            Board::Customer(_) => OrderSort::CreatedDesc,
        }
    }

    /// Label for logs and metrics
    pub fn name(&self) -> &'static str {
        match self {
            Board::Kitchen => "kitchen",
            Board::Pending => "pending",
            Board::Ready => "ready",
            Board::Customer(_) => "customer",
        }
    }

    pub fn authorize(&self, actor: &Actor) -> Result<(), LifecycleError> {
        let allowed = match (self, actor.role) {
            (Board::Kitchen, Role::Chef | Role::Owner) => true,
            (Board::Pending, Role::Staff | Role::Chef | Role::Owner) => true,
            (Board::Ready, Role::Staff | Role::Owner) => true,
            (Board::Customer(_), Role::Staff | Role::Owner) => true,
            (Board::Customer(customer_id), Role::Customer) => {
                if customer_id != &actor.id {
                    return Err(LifecycleError::PermissionDenied(DenyReason::NotOwner));
                }
                true
            }
            (Board::Kitchen | Board::Pending | Board::Ready | Board::Customer(_), _) => false,
        };

        if allowed {
            Ok(())
        } else {
            Err(LifecycleError::PermissionDenied(DenyReason::InsufficientRole))
        }
    }
}
