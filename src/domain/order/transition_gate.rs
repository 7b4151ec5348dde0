use serde::{Deserialize, Serialize};

use super::errors::DenyReason;
use super::value_objects::{Order, OrderStatus, UserId};

// ============================================================================
// Transition Gate - who may move an order where
// ============================================================================
//
//   PENDING ──► PREPARING ──► READY ──► COMPLETED
//      │
//      └──► CANCELLED
//
// COMPLETED and CANCELLED are terminal. Pure and synchronous: no I/O.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Owner,
    Staff,
    Chef,
    Customer,
}

/// Caller identity, supplied per request by the auth collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self { id: UserId::new(id), role }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Who may drive an edge of the lifecycle graph
enum Allowance {
    Roles(&'static [Role]),
    /// Staff roles, or the customer who owns the order
    RolesOrOwner(&'static [Role]),
}

const FRONT_OF_HOUSE: &[Role] = &[Role::Staff, Role::Chef, Role::Owner];
const KITCHEN: &[Role] = &[Role::Chef, Role::Owner];
const COUNTER: &[Role] = &[Role::Staff, Role::Owner];

fn edge(from: OrderStatus, to: OrderStatus) -> Option<Allowance> {
    use OrderStatus::*;

    match (from, to) {
        (Pending, Preparing) => Some(Allowance::Roles(FRONT_OF_HOUSE)),
        (Pending, Cancelled) => Some(Allowance::RolesOrOwner(FRONT_OF_HOUSE)),
        (Preparing, Ready) => Some(Allowance::Roles(KITCHEN)),
        (Ready, Completed) => Some(Allowance::Roles(COUNTER)),
        (Pending, _) | (Preparing, _) | (Ready, _) | (Completed, _) | (Cancelled, _) => None,
    }
}

/// Decide whether `actor` may move `order` to `requested`
pub fn check_transition(actor: &Actor, order: &Order, requested: OrderStatus) -> Decision {
    let current = order.status;

    if current.is_terminal() {
        return Decision::Deny(DenyReason::IllegalStateTransition);
    }

    if current == requested {
        return Decision::Deny(DenyReason::NoOp);
    }

    let Some(allowance) = edge(current, requested) else {
        return Decision::Deny(DenyReason::IllegalStateTransition);
    };

    match allowance {
        Allowance::Roles(roles) => {
            if roles.contains(&actor.role) {
                Decision::Allow
            } else {
                Decision::Deny(DenyReason::InsufficientRole)
            }
        }
        Allowance::RolesOrOwner(roles) => match actor.role {
            Role::Customer if order.customer_id() == &actor.id => Decision::Allow,
            Role::Customer => Decision::Deny(DenyReason::NotOwner),
            role if roles.contains(&role) => Decision::Allow,
            _ => Decision::Deny(DenyReason::InsufficientRole),
        },
    }
}

/// Every status `actor` could move `order` to right now
pub fn next_legal_statuses(actor: &Actor, order: &Order) -> Vec<OrderStatus> {
    OrderStatus::ALL
        .into_iter()
        .filter(|status| check_transition(actor, order, *status).is_allowed())
        .collect()
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::value_objects::{CustomerRef, Money, OrderId};
    use chrono::Utc;

    const ROLES: [Role; 4] = [Role::Owner, Role::Staff, Role::Chef, Role::Customer];

    fn order_at(status: OrderStatus) -> Order {
        Order {
            id: OrderId::new("abc123"),
            customer: CustomerRef {
                id: UserId::new("cust-1"),
                name: "Mei".to_string(),
                email: "mei@example.com".to_string(),
            },
            items: vec![],
            total_amount: Money::from_minor(0),
            status,
            created_at: Utc::now(),
        }
    }

    fn actor(role: Role) -> Actor {
        match role {
            // the owning customer
            Role::Customer => Actor::new("cust-1", role),
            _ => Actor::new(format!("{:?}-1", role).to_lowercase(), role),
        }
    }

    fn in_table(from: OrderStatus, to: OrderStatus, role: Role) -> bool {
        use OrderStatus::*;
        match (from, to) {
            (Pending, Preparing) => matches!(role, Role::Staff | Role::Chef | Role::Owner),
            (Pending, Cancelled) => true,
            (Preparing, Ready) => matches!(role, Role::Chef | Role::Owner),
            (Ready, Completed) => matches!(role, Role::Staff | Role::Owner),
            _ => false,
        }
    }

    #[test]
    fn test_gate_matches_transition_table_exhaustively() {
        for from in OrderStatus::ALL {
            for to in OrderStatus::ALL {
                for role in ROLES {
                    let decision = check_transition(&actor(role), &order_at(from), to);
                    assert_eq!(
                        decision.is_allowed(),
                        in_table(from, to, role),
                        "{:?} -> {:?} as {:?} gave {:?}",
                        from, to, role, decision
                    );
                }
            }
        }
    }

    #[test]
    fn test_same_status_is_noop_for_live_orders() {
        for status in [OrderStatus::Pending, OrderStatus::Preparing, OrderStatus::Ready] {
            for role in ROLES {
                assert_eq!(
                    check_transition(&actor(role), &order_at(status), status),
                    Decision::Deny(DenyReason::NoOp)
                );
            }
        }
    }

    #[test]
    fn test_terminal_orders_reject_everything() {
        for status in [OrderStatus::Completed, OrderStatus::Cancelled] {
            for to in OrderStatus::ALL {
                assert_eq!(
                    check_transition(&actor(Role::Owner), &order_at(status), to),
                    Decision::Deny(DenyReason::IllegalStateTransition)
                );
            }
        }
    }

    #[test]
    fn test_customer_cannot_accept_own_order() {
        let decision = check_transition(&actor(Role::Customer), &order_at(OrderStatus::Pending), OrderStatus::Preparing);
        assert_eq!(decision, Decision::Deny(DenyReason::InsufficientRole));
    }

    #[test]
    fn test_other_customer_cannot_cancel() {
        let stranger = Actor::new("cust-2", Role::Customer);
        let decision = check_transition(&stranger, &order_at(OrderStatus::Pending), OrderStatus::Cancelled);
        assert_eq!(decision, Decision::Deny(DenyReason::NotOwner));
    }

    #[test]
    fn test_skipping_a_stage_is_illegal() {
        let decision = check_transition(&actor(Role::Owner), &order_at(OrderStatus::Pending), OrderStatus::Ready);
        assert_eq!(decision, Decision::Deny(DenyReason::IllegalStateTransition));
    }

    #[test]
    fn test_next_legal_statuses_per_role() {
        let pending = order_at(OrderStatus::Pending);
        assert_eq!(
            next_legal_statuses(&actor(Role::Staff), &pending),
            vec![OrderStatus::Preparing, OrderStatus::Cancelled]
        );
        assert_eq!(next_legal_statuses(&actor(Role::Customer), &pending), vec![OrderStatus::Cancelled]);

        let preparing = order_at(OrderStatus::Preparing);
        assert!(next_legal_statuses(&actor(Role::Staff), &preparing).is_empty());
        assert_eq!(next_legal_statuses(&actor(Role::Chef), &preparing), vec![OrderStatus::Ready]);

        assert!(next_legal_statuses(&actor(Role::Owner), &order_at(OrderStatus::Completed)).is_empty());
    }
}
