use chrono::{DateTime, Utc};
use kameo::actor::{ActorRef, WeakActorRef};
use kameo::error::Infallible;
use kameo::message::{Context, Message};
use kameo::Actor as _;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::domain::order::{Actor, Board, EventKey, EventKind, LifecycleError, LifecycleEvent, Order, OrderStatus};
use crate::messaging::BroadcastChannel;
use crate::metrics::Metrics;
use crate::store::OrderStore;

// ============================================================================
// Observer Session Actor - one connected board or customer view
// ============================================================================
//
// Events are invalidation hints only. A relevant event schedules a debounced
// re-fetch from the order store; the view is always what the store said, never
// what an event carried. Duplicates are dropped by key, and a missed event is
// healed by the periodic resync or an explicit refresh.
//
//   broadcast rx ──► forwarder task ──Deliver──► ObserverSession ──► watch<ObserverView>
//                        (lagged ──Resync──►)         ▲
//   resync timer ──────────────────────Resync─────────┘
//
// ============================================================================

const SEEN_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct ObserverConfig {
    pub debounce: Duration,
    pub resync_interval: Duration,
    pub store_timeout: Duration,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_secs(1),
            resync_interval: Duration::from_secs(30),
            store_timeout: Duration::from_secs(5),
        }
    }
}

/// What the client renders
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObserverView {
    pub orders: Vec<Order>,
    pub refreshed_at: Option<DateTime<Utc>>,
    /// Bumped on every successful re-fetch
    pub generation: u64,
}

impl ObserverView {
    pub fn status_of(&self, order_id: &str) -> Option<OrderStatus> {
        self.orders.iter().find(|o| o.id.as_str() == order_id).map(|o| o.status)
    }
}

pub struct ObserverSession {
    board: Board,
    store: Arc<dyn OrderStore>,
    config: ObserverConfig,
    view: watch::Sender<ObserverView>,
    seen: VecDeque<EventKey>,
    refresh_pending: bool,
    metrics: Option<Arc<Metrics>>,
    myself: Option<WeakActorRef<ObserverSession>>,
}

impl ObserverSession {
    /// Authorize `actor` for `board`, load it, and start following the channel
    pub async fn open(
        actor: &Actor,
        board: Board,
        store: Arc<dyn OrderStore>,
        channel: &BroadcastChannel,
        config: ObserverConfig,
        metrics: Option<Arc<Metrics>>,
    ) -> Result<ObserverHandle, LifecycleError> {
        board.authorize(actor)?;

        // subscribe before the first fetch so nothing falls in between
        let events = channel.subscribe().await;
        let (view, view_rx) = watch::channel(ObserverView::default());
        let resync_interval = config.resync_interval;
        let name = board.name();

        let session = ObserverSession::spawn(ObserverSession {
            board,
            store,
            config,
            view,
            seen: VecDeque::with_capacity(SEEN_CAPACITY),
            refresh_pending: false,
            metrics,
            myself: None,
        });

        tracing::info!(board = name, user = %actor.id, "👀 Observer session opened");

        let tasks = vec![
            spawn_forwarder(events, session.clone()),
            spawn_resync(resync_interval, session.clone()),
        ];

        Ok(ObserverHandle { session, view: view_rx, tasks })
    }

    /// True when the event should trigger a re-fetch; records it as seen
    fn admit(&mut self, event: &LifecycleEvent) -> bool {
        let key = event.key();
        if self.seen.contains(&key) {
            tracing::debug!(board = self.board.name(), order_id = %event.order_id, "Duplicate delivery dropped");
            return false;
        }
        if self.seen.len() == SEEN_CAPACITY {
            self.seen.pop_front();
        }
        self.seen.push_back(key);

        match event.kind {
            EventKind::NewOrder => event.status == OrderStatus::Pending,
            EventKind::StatusUpdate => true,
        }
    }

    fn schedule_refresh(&mut self) {
        if self.refresh_pending {
            return;
        }
        let Some(session) = self.myself.clone() else {
            return;
        };
        self.refresh_pending = true;

        let debounce = self.config.debounce;
        tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            if let Some(session) = session.upgrade() {
                let _ = session.tell(FlushRefresh).await;
            }
        });
    }

    async fn refresh(&mut self) -> Result<(), LifecycleError> {
        let filter = self.board.filter();
        let query = self.store.find_many(&filter, self.board.sort());
        let result = match tokio::time::timeout(self.config.store_timeout, query).await {
            Ok(Ok(orders)) => Ok(orders),
            Ok(Err(error)) => Err(LifecycleError::StoreUnavailable(error.to_string())),
            Err(_) => Err(LifecycleError::StoreUnavailable("observer fetch timed out".to_string())),
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_refresh(self.board.name(), result.is_ok());
        }

        match result {
            Ok(orders) => {
                tracing::debug!(board = self.board.name(), orders = orders.len(), "Observer refreshed");
                self.view.send_modify(|view| {
                    view.orders = orders;
                    view.refreshed_at = Some(Utc::now());
                    view.generation += 1;
                });
                Ok(())
            }
            Err(error) => {
                // keep showing the last good view
                tracing::warn!(board = self.board.name(), error = %error, "Observer refresh failed");
                Err(error)
            }
        }
    }
}

fn spawn_forwarder(
    mut events: broadcast::Receiver<LifecycleEvent>,
    session: ActorRef<ObserverSession>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let delivered = match events.recv().await {
                Ok(event) => session.tell(Deliver(event)).await.is_ok(),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Observer fell behind the channel, forcing refresh");
                    session.tell(Resync).await.is_ok()
                }
                Err(broadcast::error::RecvError::Closed) => false,
            };
            if !delivered {
                break;
            }
        }
    })
}

fn spawn_resync(period: Duration, session: ActorRef<ObserverSession>) -> JoinHandle<()> {
    let session = session.downgrade();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // the first tick fires immediately; on_start already fetched
        interval.tick().await;
        loop {
            interval.tick().await;
            let Some(session) = session.upgrade() else { break };
            if session.tell(Resync).await.is_err() {
                break;
            }
        }
    })
}

impl kameo::Actor for ObserverSession {
    type Args = Self;
    type Error = Infallible;

    async fn on_start(mut state: Self::Args, actor_ref: ActorRef<Self>) -> Result<Self, Self::Error> {
        state.myself = Some(actor_ref.downgrade());
        // an unreachable store leaves an empty view until the next resync
        let _ = state.refresh().await;
        Ok(state)
    }
}

// ============================================================================
// Messages
// ============================================================================

pub struct Deliver(pub LifecycleEvent);

/// Re-fetch now
pub struct Refresh;

/// Background re-fetch (timer, lag); failures only logged
pub struct Resync;

/// Debounce timer elapsed
pub struct FlushRefresh;

impl Message<Deliver> for ObserverSession {
    type Reply = ();

    async fn handle(&mut self, msg: Deliver, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        let event = msg.0;
        if self.admit(&event) {
            tracing::debug!(
                board = self.board.name(),
                order_id = %event.order_id,
                status = %event.status,
                "Lifecycle event, refresh scheduled"
            );
            self.schedule_refresh();
        }
    }
}

impl Message<Refresh> for ObserverSession {
    type Reply = Result<(), LifecycleError>;

    async fn handle(&mut self, _msg: Refresh, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        self.refresh().await
    }
}

impl Message<Resync> for ObserverSession {
    type Reply = ();

    async fn handle(&mut self, _msg: Resync, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        let _ = self.refresh().await;
    }
}

impl Message<FlushRefresh> for ObserverSession {
    type Reply = ();

    async fn handle(&mut self, _msg: FlushRefresh, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        self.refresh_pending = false;
        let _ = self.refresh().await;
    }
}

// ============================================================================
// Handle
// ============================================================================

pub struct ObserverHandle {
    session: ActorRef<ObserverSession>,
    view: watch::Receiver<ObserverView>,
    tasks: Vec<JoinHandle<()>>,
}

impl ObserverHandle {
    pub fn view(&self) -> ObserverView {
        self.view.borrow().clone()
    }

    /// A receiver that wakes on every re-fetch
    pub fn changes(&self) -> watch::Receiver<ObserverView> {
        self.view.clone()
    }

    /// User-triggered refresh; returns once the view is updated
    pub async fn refresh(&self) -> Result<(), LifecycleError> {
        match self.session.ask(Refresh).await {
            Ok(()) => Ok(()),
            Err(kameo::error::SendError::HandlerError(error)) => Err(error),
            Err(_) => Err(LifecycleError::ChannelUnavailable("observer session stopped".to_string())),
        }
    }

    pub async fn close(mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        let _ = self.session.stop_gracefully().await;
    }
}

impl Drop for ObserverHandle {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actors::HubConfig;
    use crate::domain::order::{CustomerRef, Money, OrderDraft, OrderId, Role, UserId};
    use crate::messaging::InMemoryTransport;
    use crate::store::{InMemoryOrderStore, OrderFilter, OrderSort, StoreError, UpdateOutcome};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn order(id: &str, customer: &str, status: OrderStatus) -> Order {
        Order {
            id: OrderId::new(id),
            customer: CustomerRef {
                id: UserId::new(customer),
                name: customer.to_string(),
                email: format!("{}@example.com", customer),
            },
            items: vec![],
            total_amount: Money::from_minor(500),
            status,
            created_at: Utc::now(),
        }
    }

    fn quick() -> ObserverConfig {
        ObserverConfig {
            debounce: Duration::from_millis(30),
            resync_interval: Duration::from_secs(3600),
            store_timeout: Duration::from_millis(200),
        }
    }

    async fn wait_generation(handle: &ObserverHandle, at_least: u64) -> ObserverView {
        let mut changes = handle.changes();
        let view = tokio::time::timeout(Duration::from_secs(2), changes.wait_for(|v| v.generation >= at_least))
            .await
            .expect("observer did not refresh in time")
            .expect("observer view closed");
        view.clone()
    }

    fn channel() -> (InMemoryTransport, BroadcastChannel) {
        let transport = InMemoryTransport::new();
        let channel = BroadcastChannel::start(Arc::new(transport.clone()), HubConfig::new("test"), None, None);
        (transport, channel)
    }

    #[tokio::test]
    async fn test_opening_board_requires_role() {
        let (_transport, channel) = channel();
        let store = Arc::new(InMemoryOrderStore::new());

        let result = ObserverSession::open(
            &Actor::new("u1", Role::Customer),
            Board::Kitchen,
            store,
            &channel,
            quick(),
            None,
        )
        .await;

        assert!(matches!(result, Err(LifecycleError::PermissionDenied(_))));
    }

    #[tokio::test]
    async fn test_initial_view_is_filtered_and_sorted() {
        let (_transport, channel) = channel();
        let store = Arc::new(InMemoryOrderStore::new());
        store.insert(order("a1", "u1", OrderStatus::Pending)).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        store.insert(order("a2", "u2", OrderStatus::Pending)).await;
        store.insert(order("a3", "u1", OrderStatus::Ready)).await;

        let handle = ObserverSession::open(
            &Actor::new("s1", Role::Staff),
            Board::Pending,
            store,
            &channel,
            quick(),
            None,
        )
        .await
        .unwrap();

        let view = wait_generation(&handle, 1).await;
        let ids: Vec<_> = view.orders.iter().map(|o| o.id.as_str().to_string()).collect();
        assert_eq!(ids, vec!["a1", "a2"]);
        handle.close().await;
    }

    #[tokio::test]
    async fn test_duplicate_deliveries_refresh_once() {
        let (_transport, channel) = channel();
        let store = Arc::new(InMemoryOrderStore::new());
        let metrics = Arc::new(Metrics::new().unwrap());

        let handle = ObserverSession::open(
            &Actor::new("c1", Role::Chef),
            Board::Kitchen,
            store.clone(),
            &channel,
            quick(),
            Some(metrics.clone()),
        )
        .await
        .unwrap();
        wait_generation(&handle, 1).await;

        let preparing = order("a1", "u1", OrderStatus::Preparing);
        store.insert(preparing.clone()).await;
        let event = LifecycleEvent::status_update(&preparing);
        for _ in 0..5 {
            // the same event delivered repeatedly
            channel.publish(&event).await.unwrap();
        }

        let view = wait_generation(&handle, 2).await;
        assert_eq!(view.status_of("a1"), Some(OrderStatus::Preparing));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(handle.view().generation, 2);
        assert_eq!(metrics.observer_refreshes.with_label_values(&["kitchen", "ok"]).get(), 2);
        handle.close().await;
    }

    #[tokio::test]
    async fn test_new_order_only_interests_pending() {
        let (_transport, channel) = channel();
        let store = Arc::new(InMemoryOrderStore::new());

        let handle = ObserverSession::open(
            &Actor::new("s1", Role::Staff),
            Board::Pending,
            store,
            &channel,
            quick(),
            None,
        )
        .await
        .unwrap();
        wait_generation(&handle, 1).await;

        // a NEW_ORDER that claims a non-PENDING status is ignored
        channel.publish(&LifecycleEvent::new_order(&order("a1", "u1", OrderStatus::Ready))).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(handle.view().generation, 1);

        channel.publish(&LifecycleEvent::new_order(&order("a2", "u1", OrderStatus::Pending))).await.unwrap();
        wait_generation(&handle, 2).await;
        handle.close().await;
    }

    #[tokio::test]
    async fn test_missed_events_heal_on_refresh() {
        let (_transport, channel) = channel();
        let store = Arc::new(InMemoryOrderStore::new());

        let handle = ObserverSession::open(
            &Actor::new("u1", Role::Customer),
            Board::Customer(UserId::new("u1")),
            store.clone(),
            &channel,
            quick(),
            None,
        )
        .await
        .unwrap();
        wait_generation(&handle, 1).await;

        // changed in the store, no event published
        store.insert(order("a1", "u1", OrderStatus::Ready)).await;
        assert!(handle.view().orders.is_empty());

        handle.refresh().await.unwrap();
        assert_eq!(handle.view().status_of("a1"), Some(OrderStatus::Ready));
    }

    #[tokio::test]
    async fn test_store_outage_keeps_last_view() {
        let (_transport, channel) = channel();
        let store = Arc::new(InMemoryOrderStore::new());
        store.insert(order("a1", "u1", OrderStatus::Ready)).await;

        let handle = ObserverSession::open(
            &Actor::new("s1", Role::Staff),
            Board::Ready,
            store.clone(),
            &channel,
            quick(),
            None,
        )
        .await
        .unwrap();
        wait_generation(&handle, 1).await;

        store.set_offline(true);
        assert!(matches!(handle.refresh().await, Err(LifecycleError::StoreUnavailable(_))));
        assert_eq!(handle.view().orders.len(), 1);
    }

    /// Board queries hang while `stalled` is set
    struct StallingStore {
        inner: InMemoryOrderStore,
        stalled: AtomicBool,
    }

    #[async_trait]
    impl OrderStore for StallingStore {
        async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, StoreError> {
            self.inner.find_by_id(id).await
        }

        async fn find_many(&self, filter: &OrderFilter, sort: OrderSort) -> Result<Vec<Order>, StoreError> {
            if self.stalled.load(Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
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
    async fn test_unresponsive_store_times_out_and_keeps_view() {
        let (_transport, channel) = channel();
        let store = Arc::new(StallingStore {
            inner: InMemoryOrderStore::new(),
            stalled: AtomicBool::new(false),
        });
        store.inner.insert(order("a1", "u1", OrderStatus::Preparing)).await;

        let handle = ObserverSession::open(
            &Actor::new("c1", Role::Chef),
            Board::Kitchen,
            store.clone(),
            &channel,
            quick(),
            None,
        )
        .await
        .unwrap();
        wait_generation(&handle, 1).await;

        store.stalled.store(true, Ordering::SeqCst);
        let result = tokio::time::timeout(Duration::from_secs(2), handle.refresh())
            .await
            .expect("observer fetch was not bounded");

        assert!(matches!(result, Err(LifecycleError::StoreUnavailable(_))));
        let view = handle.view();
        assert_eq!(view.generation, 1);
        assert_eq!(view.status_of("a1"), Some(OrderStatus::Preparing));
    }
}
