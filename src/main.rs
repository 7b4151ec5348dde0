use scylla::client::session::Session;
use scylla::client::session_builder::SessionBuilder;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use kameo::Actor;
use order_lifecycle::actors::{HealthMonitorActor, ObserverSession};
use order_lifecycle::config::{AppConfig, StoreKind, TransportKind};
use order_lifecycle::domain::notification::Inbox;
use order_lifecycle::domain::order::{
    Actor as Caller, Board, CustomerRef, LifecycleCoordinator, MenuItem, Money, OrderDraft, OrderStatus, Role, UserId,
};
use order_lifecycle::messaging::{BroadcastChannel, BroadcastTransport, InMemoryTransport, LogNotifier, RedisTransport};
use order_lifecycle::metrics::{self, Metrics};
use order_lifecycle::store::{
    InMemoryNotificationLedger, InMemoryOrderStore, NotificationLedger, OrderStore, ScyllaNotificationLedger,
    ScyllaOrderStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with environment-based filtering
    // Default to INFO level, can be overridden with RUST_LOG env var
    // Example: RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,order_lifecycle=debug")))
        .init();

    tracing::info!("🚀 Starting Order Lifecycle Coordinator demo");

    let config = AppConfig::from_env()?;
    tracing::info!(transport = ?config.transport, store = ?config.store, topic = %config.topic, "Configuration loaded");

    // === 1. Metrics and health ===
    let metrics = Arc::new(Metrics::new()?);
    let health = HealthMonitorActor::spawn(HealthMonitorActor::new(Some(metrics.clone())));

    // Start metrics HTTP server in background thread
    let metrics_registry = Arc::new(metrics.registry().clone());
    let server_health = health.clone();
    let port = config.metrics_port;
    std::thread::spawn(move || {
        let rt = match tokio::runtime::Runtime::new() {
            Ok(rt) => rt,
            Err(e) => {
                tracing::error!("Metrics runtime error: {}", e);
                return;
            }
        };
        rt.block_on(async {
            if let Err(e) = metrics::start_metrics_server(metrics_registry, Some(server_health), port).await {
                tracing::error!("Metrics server error: {}", e);
            }
        });
    });

    // === 2. Order store and notification ledger ===
    let (store, ledger): (Arc<dyn OrderStore>, Arc<dyn NotificationLedger>) = match config.store {
        StoreKind::Scylla => {
            tracing::info!(node = %config.scylla_node, "Connecting to ScyllaDB...");
            let session: Session = SessionBuilder::new().known_node(&config.scylla_node).build().await?;
            session
                .query_unpaged(
                    format!(
                        "CREATE KEYSPACE IF NOT EXISTS {} WITH REPLICATION = \
                         {{'class': 'SimpleStrategy', 'replication_factor': 1}}",
                        config.keyspace
                    ),
                    &[],
                )
                .await?;
            session.use_keyspace(&config.keyspace, false).await?;
            let session = Arc::new(session);

            let orders = ScyllaOrderStore::new(session.clone());
            orders.ensure_schema().await?;
            let notifications = ScyllaNotificationLedger::new(session);
            notifications.ensure_schema().await?;
            (Arc::new(orders), Arc::new(notifications))
        }
        StoreKind::Memory => (Arc::new(InMemoryOrderStore::new()), Arc::new(InMemoryNotificationLedger::new())),
    };

    // === 3. Shared broadcast channel ===
    let transport: Arc<dyn BroadcastTransport> = match config.transport {
        TransportKind::Redis => Arc::new(RedisTransport::new(&config.redis_url)?),
        TransportKind::Memory => Arc::new(InMemoryTransport::new()),
    };
    let channel = BroadcastChannel::shared(|| {
        BroadcastChannel::start(transport, config.hub(), Some(health.clone()), Some(metrics.clone()))
    });

    let coordinator = LifecycleCoordinator::new(
        store.clone(),
        ledger.clone(),
        channel.clone(),
        Arc::new(LogNotifier),
        Some(metrics.clone()),
        config.coordinator(),
    );

    // === 4. Connect the boards ===
    let chef = Caller::new("chef-1", Role::Chef);
    let staff = Caller::new("staff-1", Role::Staff);
    let customer = Caller::new("customer-1", Role::Customer);

    let kitchen = ObserverSession::open(&chef, Board::Kitchen, store.clone(), &channel, config.observer(), Some(metrics.clone())).await?;
    let pending = ObserverSession::open(&staff, Board::Pending, store.clone(), &channel, config.observer(), Some(metrics.clone())).await?;
    let ready = ObserverSession::open(&staff, Board::Ready, store.clone(), &channel, config.observer(), Some(metrics.clone())).await?;
    let mine = ObserverSession::open(
        &customer,
        Board::Customer(customer.id.clone()),
        store.clone(),
        &channel,
        config.observer(),
        Some(metrics.clone()),
    )
    .await?;

    // === 5. Demonstrate the order lifecycle ===
    let draft = OrderDraft::new(CustomerRef {
        id: UserId::new("customer-1"),
        name: "Mei".to_string(),
        email: "mei@example.com".to_string(),
    })
    .line(
        MenuItem {
            id: "egg-crepe".to_string(),
            name: "Egg Crepe".to_string(),
            price: Money::from_minor(450),
            is_available: true,
        },
        2,
        Some("extra scallions"),
    )
    .line(
        MenuItem {
            id: "soy-milk".to_string(),
            name: "Soy Milk".to_string(),
            price: Money::from_minor(250),
            is_available: true,
        },
        1,
        None,
    );

    let order = coordinator.place_order(&customer, &draft).await?;
    tracing::info!(order_id = %order.id, total = %order.total_amount, "✅ Order placed");

    let settle = config.refresh_debounce + Duration::from_millis(500);
    tokio::time::sleep(settle).await;
    tracing::info!(orders = pending.view().orders.len(), "Pending board");

    coordinator.apply_transition(&staff, &order.id, OrderStatus::Preparing).await?;
    tokio::time::sleep(settle).await;
    tracing::info!(orders = kitchen.view().orders.len(), "Kitchen board");

    // a customer can no longer cancel once the kitchen has it
    if let Err(e) = coordinator.apply_transition(&customer, &order.id, OrderStatus::Cancelled).await {
        tracing::info!(error = %e, "Late cancel rejected as expected");
    }

    coordinator.apply_transition(&chef, &order.id, OrderStatus::Ready).await?;
    tokio::time::sleep(settle).await;
    tracing::info!(orders = ready.view().orders.len(), "Ready board");

    let completed = coordinator
        .apply_transition(&staff, &order.id, OrderStatus::Completed)
        .await?
        .into_order();
    tracing::info!(order_id = %completed.id, status = %completed.status, "Order picked up");
    tokio::time::sleep(settle).await;
    tracing::info!(status = ?mine.view().status_of(order.id.as_str()), "Customer view");

    let inbox = Inbox::new(ledger);
    for note in inbox.list(&customer).await? {
        tracing::info!(read = note.is_read, "📬 {}", note.message.replace('\n', " | "));
    }
    tracing::info!(unread = inbox.unread_count(&customer).await?, "Inbox");

    for handle in [kitchen, pending, ready, mine] {
        handle.close().await;
    }

    tracing::info!("🎉 Demo complete!");

    Ok(())
}
