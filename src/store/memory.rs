use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use super::{NotificationLedger, OrderFilter, OrderSort, OrderStore, StoreError, UpdateOutcome};
use crate::domain::notification::{Notification, NotificationId};
use crate::domain::order::{Order, OrderDraft, OrderId, OrderStatus, UserId};

// ============================================================================
// In-Memory Order Store
// ============================================================================
//
// The status compare-and-set runs under the write lock, so two racing
// transitions on one order serialize and the loser sees a Conflict.
//
// ============================================================================

#[derive(Default)]
pub struct InMemoryOrderStore {
    orders: RwLock<HashMap<OrderId, Order>>,
    offline: AtomicBool,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an order verbatim, keeping its id and status
    pub async fn insert(&self, order: Order) {
        self.orders.write().await.insert(order.id.clone(), order);
    }

    /// Simulate an outage: every call fails with `Unavailable` while set
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, StoreError> {
        self.check_online()?;
        Ok(self.orders.read().await.get(id).cloned())
    }

    async fn find_many(&self, filter: &OrderFilter, sort: OrderSort) -> Result<Vec<Order>, StoreError> {
        self.check_online()?;
        let mut orders: Vec<Order> = self
            .orders
            .read()
            .await
            .values()
            .filter(|order| filter.matches(order))
            .cloned()
            .collect();
        sort.apply(&mut orders);
        Ok(orders)
    }

    async fn create(&self, draft: &OrderDraft) -> Result<Order, StoreError> {
        self.check_online()?;
        let order = Order {
            id: OrderId::generate(),
            customer: draft.customer.clone(),
            items: draft.items(),
            total_amount: draft.total(),
            status: OrderStatus::Pending,
            created_at: Utc::now(),
        };
        self.orders.write().await.insert(order.id.clone(), order.clone());
        Ok(order)
    }

    async fn update_status(
        &self,
        id: &OrderId,
        expected: OrderStatus,
        new: OrderStatus,
    ) -> Result<UpdateOutcome, StoreError> {
        self.check_online()?;
        let mut orders = self.orders.write().await;
        let order = orders.get_mut(id).ok_or(StoreError::NotFound)?;

        if order.status != expected {
            return Ok(UpdateOutcome::Conflict { current: order.status });
        }

        order.status = new;
        Ok(UpdateOutcome::Applied)
    }

    async fn delete(&self, id: &OrderId) -> Result<(), StoreError> {
        self.check_online()?;
        self.orders
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }
}

// ============================================================================
// In-Memory Notification Ledger
// ============================================================================

#[derive(Default)]
pub struct InMemoryNotificationLedger {
    entries: RwLock<Vec<Notification>>,
    offline: AtomicBool,
}

impl InMemoryNotificationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Every entry for `order_id`, any user
    pub async fn for_order(&self, order_id: &OrderId) -> Vec<Notification> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|n| n.order_id.as_ref() == Some(order_id))
            .cloned()
            .collect()
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory ledger offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationLedger for InMemoryNotificationLedger {
    async fn create(
        &self,
        user_id: &UserId,
        message: &str,
        order_id: Option<&OrderId>,
    ) -> Result<Notification, StoreError> {
        self.check_online()?;
        let notification = Notification::new(user_id.clone(), message, order_id.cloned());
        self.entries.write().await.push(notification.clone());
        Ok(notification)
    }

    async fn find_by_id(&self, id: &NotificationId) -> Result<Option<Notification>, StoreError> {
        self.check_online()?;
        Ok(self.entries.read().await.iter().find(|n| &n.id == id).cloned())
    }

    async fn list_by_user(&self, user_id: &UserId, limit: usize) -> Result<Vec<Notification>, StoreError> {
        self.check_online()?;
        // entries are appended in creation order
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .rev()
            .filter(|n| &n.user_id == user_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn mark_all_read(&self, user_id: &UserId) -> Result<u64, StoreError> {
        self.check_online()?;
        let mut flipped = 0;
        for entry in self.entries.write().await.iter_mut() {
            if &entry.user_id == user_id && !entry.is_read {
                entry.is_read = true;
                flipped += 1;
            }
        }
        Ok(flipped)
    }

    async fn delete(&self, id: &NotificationId) -> Result<(), StoreError> {
        self.check_online()?;
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|n| &n.id != id);
        if entries.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
