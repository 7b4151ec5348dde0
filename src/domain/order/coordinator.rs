use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::board::Board;
use super::errors::{DenyReason, LifecycleError};
use super::events::LifecycleEvent;
use super::transition_gate::{check_transition, Actor, Decision, Role};
use super::value_objects::{Order, OrderDraft, OrderId, OrderStatus};
use crate::domain::notification::messages;
use crate::messaging::{BroadcastChannel, ReadyNotifier};
use crate::metrics::Metrics;
use crate::store::{NotificationLedger, OrderStore, StoreError, UpdateOutcome};

// ============================================================================
// Lifecycle Coordinator
// ============================================================================
//
// Orchestrates: Gate → compare-and-set commit → broadcast + notification
//
// The commit is the only step that can fail the request once the gate has
// passed. Broadcast, ledger and email run after it and are logged on failure.
//
// ============================================================================

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Upper bound on every order store call
    pub store_timeout: Duration,
    /// Upper bound on the post-commit broadcast and ledger writes
    pub side_effect_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_secs(5),
            side_effect_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    /// Status changed; carries the order as re-read after the commit
    Applied(Order),
    /// The order already had the requested status
    Unchanged(Order),
}

impl TransitionOutcome {
    pub fn order(&self) -> &Order {
        match self {
            TransitionOutcome::Applied(order) | TransitionOutcome::Unchanged(order) => order,
        }
    }

    pub fn into_order(self) -> Order {
        match self {
            TransitionOutcome::Applied(order) | TransitionOutcome::Unchanged(order) => order,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, TransitionOutcome::Applied(_))
    }
}

pub struct LifecycleCoordinator {
    store: Arc<dyn OrderStore>,
    ledger: Arc<dyn NotificationLedger>,
    channel: BroadcastChannel,
    notifier: Arc<dyn ReadyNotifier>,
    metrics: Option<Arc<Metrics>>,
    config: CoordinatorConfig,
}

impl LifecycleCoordinator {
    pub fn new(
        store: Arc<dyn OrderStore>,
        ledger: Arc<dyn NotificationLedger>,
        channel: BroadcastChannel,
        notifier: Arc<dyn ReadyNotifier>,
        metrics: Option<Arc<Metrics>>,
        config: CoordinatorConfig,
    ) -> Self {
        Self { store, ledger, channel, notifier, metrics, config }
    }

    /// Move `order_id` to `requested` on behalf of `actor`
    pub async fn apply_transition(
        &self,
        actor: &Actor,
        order_id: &OrderId,
        requested: OrderStatus,
    ) -> Result<TransitionOutcome, LifecycleError> {
        let started = Instant::now();
        let result = self.transition(actor, order_id, requested).await;

        let outcome = match &result {
            Ok(TransitionOutcome::Applied(_)) => "applied",
            Ok(TransitionOutcome::Unchanged(_)) => "unchanged",
            Err(error) => error.kind(),
        };
        if let Some(metrics) = &self.metrics {
            metrics.record_transition(outcome, started.elapsed().as_secs_f64());
        }

        match &result {
            Err(error) if error.is_validation() => tracing::debug!(
                order_id = %order_id,
                requested = %requested,
                role = ?actor.role,
                error = %error,
                "Transition rejected"
            ),
            Err(error) => tracing::warn!(
                order_id = %order_id,
                requested = %requested,
                error = %error,
                "Transition failed"
            ),
            Ok(_) => {}
        }

        result
    }

    async fn transition(
        &self,
        actor: &Actor,
        order_id: &OrderId,
        requested: OrderStatus,
    ) -> Result<TransitionOutcome, LifecycleError> {
        let order = self.load(order_id).await?;
        let expected = order.status;

        match check_transition(actor, &order, requested) {
            Decision::Allow => {}
            Decision::Deny(DenyReason::NoOp) => return Ok(TransitionOutcome::Unchanged(order)),
            Decision::Deny(reason) => return Err(LifecycleError::from_denial(reason, expected, requested)),
        }

        match self.commit(order_id, expected, requested).await? {
            UpdateOutcome::Applied => {}
            UpdateOutcome::Conflict { current } => {
                tracing::info!(
                    order_id = %order_id,
                    expected = %expected,
                    found = %current,
                    "Status changed underneath us, re-evaluating once"
                );

                let fresh = self.load(order_id).await?;
                match check_transition(actor, &fresh, requested) {
                    Decision::Allow => {}
                    Decision::Deny(DenyReason::NoOp) => return Ok(TransitionOutcome::Unchanged(fresh)),
                    Decision::Deny(_) => {
                        return Err(LifecycleError::ConflictingTransition { expected, found: fresh.status })
                    }
                }

                if let UpdateOutcome::Conflict { current } = self.commit(order_id, fresh.status, requested).await? {
                    return Err(LifecycleError::ConflictingTransition { expected: fresh.status, found: current });
                }
            }
        }

        tracing::info!(
            order_id = %order_id,
            from = %expected,
            to = %requested,
            role = ?actor.role,
            "✅ Order status committed"
        );

        let updated = match self.load(order_id).await {
            Ok(order) => order,
            Err(error) => {
                // the commit stands; answer with what we know it became
                tracing::warn!(order_id = %order_id, error = %error, "Re-read after commit failed");
                Order { status: requested, ..order }
            }
        };

        self.after_status_commit(&updated).await;

        Ok(TransitionOutcome::Applied(updated))
    }

    /// Validate, price and persist a new order, then announce it
    pub async fn place_order(&self, actor: &Actor, draft: &OrderDraft) -> Result<Order, LifecycleError> {
        if actor.role == Role::Customer && actor.id != draft.customer.id {
            return Err(LifecycleError::PermissionDenied(DenyReason::NotOwner));
        }
        draft.validate().map_err(LifecycleError::InvalidOrder)?;

        let order = self
            .bounded(self.store.create(draft))
            .await
            .map_err(|error| LifecycleError::StoreUnavailable(error.to_string()))?;

        tracing::info!(
            order_id = %order.id,
            customer = %order.customer.id,
            items = order.items.len(),
            total = %order.total_amount,
            "📝 Order placed"
        );

        let event = LifecycleEvent::new_order(&order);
        let placed = messages::order_placed();
        tokio::join!(
            self.broadcast(&event),
            self.notify_customer(&order, &placed, "placed"),
        );

        Ok(order)
    }

    /// Orders on `board`, if `actor` may see it
    pub async fn list_board(&self, actor: &Actor, board: &Board) -> Result<Vec<Order>, LifecycleError> {
        board.authorize(actor)?;
        self.bounded(self.store.find_many(&board.filter(), board.sort()))
            .await
            .map_err(|error| LifecycleError::StoreUnavailable(error.to_string()))
    }

    // ------------------------------------------------------------------------
    // Store access
    // ------------------------------------------------------------------------

    async fn bounded<T>(&self, call: impl Future<Output = Result<T, StoreError>>) -> Result<T, StoreError> {
        match tokio::time::timeout(self.config.store_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Unavailable(format!(
                "no answer within {:?}",
                self.config.store_timeout
            ))),
        }
    }

    async fn load(&self, order_id: &OrderId) -> Result<Order, LifecycleError> {
        match self.bounded(self.store.find_by_id(order_id)).await {
            Ok(Some(order)) => Ok(order),
            Ok(None) | Err(StoreError::NotFound) => Err(LifecycleError::NotFound(order_id.clone())),
            Err(StoreError::Unavailable(reason)) => Err(LifecycleError::StoreUnavailable(reason)),
        }
    }

    async fn commit(
        &self,
        order_id: &OrderId,
        expected: OrderStatus,
        new: OrderStatus,
    ) -> Result<UpdateOutcome, LifecycleError> {
        match self.bounded(self.store.update_status(order_id, expected, new)).await {
            Ok(outcome) => Ok(outcome),
            Err(StoreError::NotFound) => Err(LifecycleError::NotFound(order_id.clone())),
            Err(StoreError::Unavailable(reason)) => Err(LifecycleError::StoreUnavailable(reason)),
        }
    }

    // ------------------------------------------------------------------------
    // Side effects: logged, never returned
    // ------------------------------------------------------------------------

    async fn after_status_commit(&self, order: &Order) {
        let event = LifecycleEvent::status_update(order);

        match messages::for_status(order) {
            Some(message) => {
                tokio::join!(
                    self.broadcast(&event),
                    self.notify_customer(order, &message, order.status.as_str()),
                );
            }
            None => self.broadcast(&event).await,
        }

        if order.status == OrderStatus::Ready {
            self.send_ready_email(order);
        }
    }

    async fn broadcast(&self, event: &LifecycleEvent) {
        let published = tokio::time::timeout(self.config.side_effect_timeout, self.channel.publish(event)).await;

        match published {
            Ok(Ok(())) => {}
            Ok(Err(error)) => tracing::warn!(
                order_id = %event.order_id,
                status = %event.status,
                error = %error,
                "Broadcast failed; observers will catch up on resync"
            ),
            Err(_) => tracing::warn!(
                order_id = %event.order_id,
                status = %event.status,
                "Broadcast timed out; observers will catch up on resync"
            ),
        }
    }

    async fn notify_customer(&self, order: &Order, message: &str, trigger: &str) {
        let write = self.ledger.create(order.customer_id(), message, Some(&order.id));

        match tokio::time::timeout(self.config.side_effect_timeout, write).await {
            Ok(Ok(notification)) => {
                tracing::debug!(
                    order_id = %order.id,
                    notification_id = %notification.id,
                    trigger,
                    "Customer notified"
                );
                if let Some(metrics) = &self.metrics {
                    metrics.record_notification(trigger);
                }
            }
            Ok(Err(error)) => {
                tracing::error!(order_id = %order.id, error = %error, trigger, "Notification write failed")
            }
            Err(_) => tracing::error!(order_id = %order.id, trigger, "Notification write timed out"),
        }
    }

    fn send_ready_email(&self, order: &Order) {
        let notifier = self.notifier.clone();
        let order_id = order.id.clone();
        let to = order.customer.email.clone();
        let summary = messages::ready_summary(order);

        tokio::spawn(async move {
            if let Err(error) = notifier.notify_ready(&to, &summary).await {
                tracing::warn!(order_id = %order_id, error = %error, "Ready email failed");
            }
        });
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actors::HubConfig;
    use crate::domain::order::{CustomerRef, MenuItem, Money, OrderItem, UserId};
    use crate::messaging::{InMemoryTransport, LogNotifier};
    use crate::store::{InMemoryNotificationLedger, InMemoryOrderStore, OrderFilter, OrderSort};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::Barrier;

    struct Harness {
        store: Arc<InMemoryOrderStore>,
        ledger: Arc<InMemoryNotificationLedger>,
        transport: InMemoryTransport,
        channel: BroadcastChannel,
        metrics: Arc<Metrics>,
    }

    impl Harness {
        fn new() -> Self {
            let transport = InMemoryTransport::new();
            let channel = BroadcastChannel::start(Arc::new(transport.clone()), HubConfig::new("test"), None, None);
            Self {
                store: Arc::new(InMemoryOrderStore::new()),
                ledger: Arc::new(InMemoryNotificationLedger::new()),
                transport,
                channel,
                metrics: Arc::new(Metrics::new().unwrap()),
            }
        }

        fn coordinator(&self) -> LifecycleCoordinator {
            self.coordinator_over(self.store.clone())
        }

        fn coordinator_over(&self, store: Arc<dyn OrderStore>) -> LifecycleCoordinator {
            LifecycleCoordinator::new(
                store,
                self.ledger.clone(),
                self.channel.clone(),
                Arc::new(LogNotifier),
                Some(self.metrics.clone()),
                CoordinatorConfig {
                    store_timeout: Duration::from_millis(200),
                    side_effect_timeout: Duration::from_millis(500),
                },
            )
        }
    }

    fn customer() -> Actor {
        Actor::new("cust-1", Role::Customer)
    }

    fn order(id: &str, status: OrderStatus) -> Order {
        Order {
            id: OrderId::new(id),
            customer: CustomerRef {
                id: UserId::new("cust-1"),
                name: "Mei".to_string(),
                email: "mei@example.com".to_string(),
            },
            items: vec![
                OrderItem {
                    menu_item_id: "m1".to_string(),
                    name: "Pancakes".to_string(),
                    unit_price: Money::from_minor(650),
                    quantity: 2,
                    special_request: None,
                },
                OrderItem {
                    menu_item_id: "m2".to_string(),
                    name: "Coffee".to_string(),
                    unit_price: Money::from_minor(250),
                    quantity: 1,
                    special_request: Some("oat milk".to_string()),
                },
            ],
            total_amount: Money::from_minor(1550),
            status,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_owner_customer_cancels_pending_order() {
        let h = Harness::new();
        h.store.insert(order("abc123", OrderStatus::Pending)).await;
        let mut rx = h.channel.subscribe().await;

        let outcome = h
            .coordinator()
            .apply_transition(&customer(), &OrderId::new("abc123"), OrderStatus::Cancelled)
            .await
            .unwrap();

        assert!(outcome.is_applied());
        assert_eq!(outcome.order().status, OrderStatus::Cancelled);

        let event = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        assert_eq!(event.kind, crate::domain::order::EventKind::StatusUpdate);
        assert_eq!(event.status, OrderStatus::Cancelled);
        assert_eq!(h.transport.publish_count(), 1);

        let notes = h.ledger.for_order(&OrderId::new("abc123")).await;
        assert_eq!(notes.len(), 1);
        assert!(notes[0].message.contains("cancelled"));
    }

    #[tokio::test]
    async fn test_customer_cannot_start_preparing() {
        let h = Harness::new();
        h.store.insert(order("abc123", OrderStatus::Pending)).await;

        let result = h
            .coordinator()
            .apply_transition(&customer(), &OrderId::new("abc123"), OrderStatus::Preparing)
            .await;

        assert_eq!(result, Err(LifecycleError::PermissionDenied(DenyReason::InsufficientRole)));
        assert_eq!(h.transport.publish_count(), 0);
        assert!(h.ledger.for_order(&OrderId::new("abc123")).await.is_empty());
    }

    #[tokio::test]
    async fn test_other_customer_cannot_cancel() {
        let h = Harness::new();
        h.store.insert(order("abc123", OrderStatus::Pending)).await;

        let result = h
            .coordinator()
            .apply_transition(&Actor::new("cust-2", Role::Customer), &OrderId::new("abc123"), OrderStatus::Cancelled)
            .await;

        assert_eq!(result, Err(LifecycleError::PermissionDenied(DenyReason::NotOwner)));
    }

    #[tokio::test]
    async fn test_chef_marks_ready_and_customer_gets_summary() {
        let h = Harness::new();
        h.store.insert(order("abc123", OrderStatus::Preparing)).await;

        let outcome = h
            .coordinator()
            .apply_transition(&Actor::new("chef-1", Role::Chef), &OrderId::new("abc123"), OrderStatus::Ready)
            .await
            .unwrap();
        assert_eq!(outcome.order().status, OrderStatus::Ready);

        let notes = h.ledger.for_order(&OrderId::new("abc123")).await;
        assert_eq!(notes.len(), 1);
        let message = &notes[0].message;
        assert!(message.contains("Pancakes × 2"));
        assert!(message.contains("Coffee × 1"));
        assert!(message.contains("15.50"));
        assert_eq!(h.metrics.notifications_written.with_label_values(&["READY"]).get(), 1);
    }

    #[tokio::test]
    async fn test_completed_order_rejects_everything() {
        let h = Harness::new();
        h.store.insert(order("abc123", OrderStatus::Completed)).await;
        let coordinator = h.coordinator();

        for requested in OrderStatus::ALL {
            let result = coordinator
                .apply_transition(&Actor::new("owner", Role::Owner), &OrderId::new("abc123"), requested)
                .await;
            assert_eq!(
                result,
                Err(LifecycleError::InvalidTransition { from: OrderStatus::Completed, to: requested })
            );
        }
    }

    #[tokio::test]
    async fn test_same_status_is_unchanged_not_error() {
        let h = Harness::new();
        h.store.insert(order("abc123", OrderStatus::Preparing)).await;

        let outcome = h
            .coordinator()
            .apply_transition(&Actor::new("chef-1", Role::Chef), &OrderId::new("abc123"), OrderStatus::Preparing)
            .await
            .unwrap();

        assert!(matches!(outcome, TransitionOutcome::Unchanged(_)));
        assert_eq!(h.transport.publish_count(), 0);
        assert_eq!(h.metrics.transitions_total.with_label_values(&["unchanged"]).get(), 1);
    }

    #[tokio::test]
    async fn test_missing_order_is_not_found() {
        let h = Harness::new();
        let result = h
            .coordinator()
            .apply_transition(&customer(), &OrderId::new("nope"), OrderStatus::Cancelled)
            .await;
        assert_eq!(result, Err(LifecycleError::NotFound(OrderId::new("nope"))));
    }

    #[tokio::test]
    async fn test_store_outage_aborts_without_broadcast() {
        let h = Harness::new();
        h.store.insert(order("abc123", OrderStatus::Pending)).await;
        h.store.set_offline(true);

        let result = h
            .coordinator()
            .apply_transition(&Actor::new("staff", Role::Staff), &OrderId::new("abc123"), OrderStatus::Preparing)
            .await;

        assert!(matches!(result, Err(LifecycleError::StoreUnavailable(_))));
        assert_eq!(h.transport.publish_count(), 0);
    }

    #[tokio::test]
    async fn test_broadcast_and_ledger_failures_do_not_fail_commit() {
        let h = Harness::new();
        h.store.insert(order("abc123", OrderStatus::Pending)).await;
        h.transport.set_offline(true);
        h.ledger.set_offline(true);

        let outcome = h
            .coordinator()
            .apply_transition(&Actor::new("staff", Role::Staff), &OrderId::new("abc123"), OrderStatus::Preparing)
            .await
            .unwrap();

        assert_eq!(outcome.order().status, OrderStatus::Preparing);
        let stored = h.store.find_by_id(&OrderId::new("abc123")).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Preparing);
    }

    /// Never answers the calls it is told to stall
    struct StallingStore {
        inner: Arc<InMemoryOrderStore>,
        stall_reads: bool,
        stall_writes: bool,
    }

    #[async_trait]
    impl OrderStore for StallingStore {
        async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, StoreError> {
            if self.stall_reads {
                std::future::pending::<()>().await;
            }
            self.inner.find_by_id(id).await
        }

        async fn find_many(&self, filter: &OrderFilter, sort: OrderSort) -> Result<Vec<Order>, StoreError> {
            self.inner.find_many(filter, sort).await
        }

        async fn create(&self, draft: &OrderDraft) -> Result<Order, StoreError> {
            self.inner.create(draft).await
        }

        async fn update_status(
            &self,
            id: &OrderId,
            expected: OrderStatus,
            new: OrderStatus,
        ) -> Result<UpdateOutcome, StoreError> {
            if self.stall_writes {
                std::future::pending::<()>().await;
            }
            self.inner.update_status(id, expected, new).await
        }

        async fn delete(&self, id: &OrderId) -> Result<(), StoreError> {
            self.inner.delete(id).await
        }
    }

    #[tokio::test]
    async fn test_unresponsive_store_times_out_as_unavailable() {
        let h = Harness::new();
        h.store.insert(order("abc123", OrderStatus::Pending)).await;
        let staff = Actor::new("staff", Role::Staff);
        let id = OrderId::new("abc123");

        for (stall_reads, stall_writes) in [(true, false), (false, true)] {
            let coordinator = h.coordinator_over(Arc::new(StallingStore {
                inner: h.store.clone(),
                stall_reads,
                stall_writes,
            }));

            let result = tokio::time::timeout(
                Duration::from_secs(2),
                coordinator.apply_transition(&staff, &id, OrderStatus::Preparing),
            )
            .await
            .expect("store timeout did not fire");

            assert!(matches!(result, Err(LifecycleError::StoreUnavailable(_))));
        }

        assert_eq!(h.transport.publish_count(), 0);
        let stored = h.store.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Pending);
        assert!(h.ledger.for_order(&id).await.is_empty());
    }

    /// Holds the first two reads until both callers have read, so both
    /// decide against the same snapshot
    struct LockstepStore {
        inner: Arc<InMemoryOrderStore>,
        barrier: Barrier,
        reads: AtomicU32,
    }

    #[async_trait]
    impl OrderStore for LockstepStore {
        async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, StoreError> {
            let found = self.inner.find_by_id(id).await;
            if self.reads.fetch_add(1, Ordering::SeqCst) < 2 {
                self.barrier.wait().await;
            }
            found
        }

        async fn find_many(&self, filter: &OrderFilter, sort: OrderSort) -> Result<Vec<Order>, StoreError> {
            self.inner.find_many(filter, sort).await
        }

        async fn create(&self, draft: &OrderDraft) -> Result<Order, StoreError> {
            self.inner.create(draft).await
        }

        async fn update_status(
            &self,
            id: &OrderId,
            expected: OrderStatus,
            new: OrderStatus,
        ) -> Result<UpdateOutcome, StoreError> {
            self.inner.update_status(id, expected, new).await
        }

        async fn delete(&self, id: &OrderId) -> Result<(), StoreError> {
            self.inner.delete(id).await
        }
    }

    #[tokio::test]
    async fn test_cancel_accept_race_has_one_winner() {
        let h = Harness::new();
        h.store.insert(order("abc123", OrderStatus::Pending)).await;
        let coordinator = h.coordinator_over(Arc::new(LockstepStore {
            inner: h.store.clone(),
            barrier: Barrier::new(2),
            reads: AtomicU32::new(0),
        }));

        let id = OrderId::new("abc123");
        let staff = Actor::new("staff", Role::Staff);
        let owner = customer();
        let (accept, cancel) = tokio::join!(
            coordinator.apply_transition(&staff, &id, OrderStatus::Preparing),
            coordinator.apply_transition(&owner, &id, OrderStatus::Cancelled),
        );

        let results = [accept, cancel];
        let winners = results.iter().filter(|r| r.is_ok()).count();
        let conflicts = results
            .iter()
            .filter(|r| matches!(r, Err(LifecycleError::ConflictingTransition { .. })))
            .count();
        assert_eq!((winners, conflicts), (1, 1));

        let stored = h.store.find_by_id(&id).await.unwrap().unwrap();
        let winner_status = results.iter().find_map(|r| r.as_ref().ok()).map(|o| o.order().status);
        assert_eq!(Some(stored.status), winner_status);
        assert_eq!(h.ledger.for_order(&id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_place_order_validates_and_announces() {
        let h = Harness::new();
        let coordinator = h.coordinator();
        let mut rx = h.channel.subscribe().await;

        let pancakes = MenuItem {
            id: "m1".to_string(),
            name: "Pancakes".to_string(),
            price: Money::from_minor(650),
            is_available: true,
        };
        let draft = OrderDraft::new(CustomerRef {
            id: UserId::new("cust-1"),
            name: "Mei".to_string(),
            email: "mei@example.com".to_string(),
        })
        .line(pancakes.clone(), 3, None);

        let placed = coordinator.place_order(&customer(), &draft).await.unwrap();
        assert_eq!(placed.status, OrderStatus::Pending);
        assert_eq!(placed.total_amount, Money::from_minor(1950));

        let event = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        assert_eq!(event.kind, crate::domain::order::EventKind::NewOrder);
        assert_eq!(h.ledger.for_order(&placed.id).await.len(), 1);

        let empty = OrderDraft::new(draft.customer.clone());
        assert!(matches!(
            coordinator.place_order(&customer(), &empty).await,
            Err(LifecycleError::InvalidOrder(_))
        ));

        let stranger = Actor::new("cust-9", Role::Customer);
        assert_eq!(
            coordinator.place_order(&stranger, &draft).await,
            Err(LifecycleError::PermissionDenied(DenyReason::NotOwner))
        );

        let mut priceless = pancakes.clone();
        priceless.price = Money::from_minor(i64::MAX / 2);
        let overflowing = OrderDraft::new(draft.customer.clone()).line(priceless, 3, None);
        let mut refund = pancakes;
        refund.price = Money::from_minor(-650);
        let negative = OrderDraft::new(draft.customer.clone()).line(refund, 1, None);
        for bad in [overflowing, negative] {
            assert!(matches!(
                coordinator.place_order(&customer(), &bad).await,
                Err(LifecycleError::InvalidOrder(_))
            ));
        }
        assert_eq!(h.store.find_many(&OrderFilter::default(), OrderSort::CreatedAsc).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_board_enforces_roles() {
        let h = Harness::new();
        h.store.insert(order("a1", OrderStatus::Preparing)).await;
        h.store.insert(order("a2", OrderStatus::Pending)).await;
        let coordinator = h.coordinator();

        let kitchen = coordinator.list_board(&Actor::new("chef", Role::Chef), &Board::Kitchen).await.unwrap();
        assert_eq!(kitchen.len(), 1);
        assert_eq!(kitchen[0].id, OrderId::new("a1"));

        assert!(coordinator.list_board(&customer(), &Board::Kitchen).await.is_err());
    }
}
