// ============================================================================
// Durable Record Collaborators
// ============================================================================
//
// The order store owns canonical order state; the notification ledger owns
// per-user inboxes. Both sit behind traits so the lifecycle core never names a
// backend.
//
// - memory  - process-local maps (tests, demo)
// - scylla  - ScyllaDB tables, status changes via lightweight transactions
//
// ============================================================================

mod memory;
mod scylla;

pub use memory::{InMemoryNotificationLedger, InMemoryOrderStore};
pub use scylla::{ScyllaNotificationLedger, ScyllaOrderStore};

use async_trait::async_trait;

use crate::domain::notification::{Notification, NotificationId};
use crate::domain::order::{Order, OrderDraft, OrderId, OrderStatus, UserId};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Result of a compare-and-set status write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Applied,
    /// Stored status no longer matched the expected one
    Conflict { current: OrderStatus },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub customer_id: Option<UserId>,
}

impl OrderFilter {
    pub fn status(status: OrderStatus) -> Self {
        Self { status: Some(status), customer_id: None }
    }

    pub fn customer(customer_id: UserId) -> Self {
        Self { status: None, customer_id: Some(customer_id) }
    }

    pub fn matches(&self, order: &Order) -> bool {
        self.status.map_or(true, |s| order.status == s)
            && self.customer_id.as_ref().map_or(true, |c| order.customer_id() == c)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSort {
    CreatedAsc,
    CreatedDesc,
}

impl OrderSort {
    pub fn apply(&self, orders: &mut [Order]) {
        match self {
            OrderSort::CreatedAsc => orders.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
            OrderSort::CreatedDesc => orders.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        }
    }
}

#[async_trait]
pub trait OrderStore: Send + Sync + 'static {
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, StoreError>;

    async fn find_many(&self, filter: &OrderFilter, sort: OrderSort) -> Result<Vec<Order>, StoreError>;

    /// Persist a validated draft as a new PENDING order
    async fn create(&self, draft: &OrderDraft) -> Result<Order, StoreError>;

    /// Set `new` only if the stored status is still `expected`
    async fn update_status(
        &self,
        id: &OrderId,
        expected: OrderStatus,
        new: OrderStatus,
    ) -> Result<UpdateOutcome, StoreError>;

    async fn delete(&self, id: &OrderId) -> Result<(), StoreError>;
}

#[async_trait]
pub trait NotificationLedger: Send + Sync + 'static {
    async fn create(
        &self,
        user_id: &UserId,
        message: &str,
        order_id: Option<&OrderId>,
    ) -> Result<Notification, StoreError>;

    async fn find_by_id(&self, id: &NotificationId) -> Result<Option<Notification>, StoreError>;

    /// Newest first
    async fn list_by_user(&self, user_id: &UserId, limit: usize) -> Result<Vec<Notification>, StoreError>;

    /// Returns how many entries flipped to read
    async fn mark_all_read(&self, user_id: &UserId) -> Result<u64, StoreError>;

    async fn delete(&self, id: &NotificationId) -> Result<(), StoreError>;
}
