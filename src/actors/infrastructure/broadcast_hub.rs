use futures_util::StreamExt;
use kameo::actor::{ActorRef, WeakActorRef};
use kameo::error::{Infallible, SendError};
use kameo::message::{Context, Message};
use kameo::reply::{Reply, ReplyError};
use kameo::Actor;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::health_monitor::{HealthMonitorActor, UpdateHealth};
use crate::actors::core::HealthStatus;
use crate::domain::order::LifecycleEvent;
use crate::messaging::{BroadcastTransport, ChannelError, TransportLink, TransportPublisher};
use crate::metrics::Metrics;
use crate::utils::{retry_with_backoff, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitState, RetryConfig};

// ============================================================================
// Broadcast Hub Actor - the process-wide pub/sub connection
// ============================================================================
//
// Responsibilities:
// - Own the single transport link; every publish and subscribe goes through
//   this mailbox, so at most one connect attempt is ever in flight
// - Connect lazily on first publish or subscribe
// - Pump received payloads into the local fan-out channel
// - Reconnect with backoff after the link drops, while anyone listens
// - Guard publishes with a circuit breaker
// - Report link state to the health monitor
//
// Link lifecycle:
//   Disconnected ──connect──► Connected(gen N) ──stream ends──► Disconnected
//                                  │                                 │
//                                  └──publish error (drop link)──────┤
//                                                                    ▼
//                                                    reconnect loop (if listeners)
//
// ============================================================================

const COMPONENT: &str = "broadcast";

#[derive(Clone, Debug)]
pub struct HubConfig {
    pub topic: String,
    pub connect_timeout: Duration,
    pub reconnect: RetryConfig,
    pub breaker: CircuitBreakerConfig,
}

impl HubConfig {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            connect_timeout: Duration::from_secs(10),
            reconnect: RetryConfig::reconnect(),
            breaker: CircuitBreakerConfig::default(),
        }
    }
}

struct LiveLink {
    publisher: Box<dyn TransportPublisher>,
    pump: JoinHandle<()>,
}

impl Drop for LiveLink {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

pub struct BroadcastHub {
    transport: Arc<dyn BroadcastTransport>,
    config: HubConfig,
    local: broadcast::Sender<LifecycleEvent>,
    breaker: CircuitBreaker,
    link: Option<LiveLink>,
    generation: u64,
    reconnecting: bool,
    health: Option<ActorRef<HealthMonitorActor>>,
    metrics: Option<Arc<Metrics>>,
    myself: Option<WeakActorRef<BroadcastHub>>,
}

impl BroadcastHub {
    pub fn new(
        transport: Arc<dyn BroadcastTransport>,
        config: HubConfig,
        local: broadcast::Sender<LifecycleEvent>,
        health: Option<ActorRef<HealthMonitorActor>>,
        metrics: Option<Arc<Metrics>>,
    ) -> Self {
        let breaker = CircuitBreaker::new(config.breaker.clone());
        Self {
            transport,
            config,
            local,
            breaker,
            link: None,
            generation: 0,
            reconnecting: false,
            health,
            metrics,
            myself: None,
        }
    }

    async fn report(&self, status: HealthStatus, details: impl Into<String>) {
        if let Some(health) = &self.health {
            let _ = health
                .tell(UpdateHealth {
                    component: COMPONENT.to_string(),
                    status,
                    details: Some(details.into()),
                })
                .await;
        }
    }

    /// Open the link unless one is already live
    async fn ensure_link(&mut self) -> Result<(), ChannelError> {
        if self.link.is_some() {
            return Ok(());
        }

        let transport = self.transport.name();
        let connect = self.transport.connect(&self.config.topic);
        let result = match tokio::time::timeout(self.config.connect_timeout, connect).await {
            Ok(result) => result,
            Err(_) => Err(ChannelError::Unavailable(format!(
                "connect timed out after {:?}",
                self.config.connect_timeout
            ))),
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_connect(transport, result.is_ok());
        }

        match result {
            Ok(TransportLink { publisher, incoming }) => {
                self.generation += 1;
                let pump = self.spawn_pump(incoming, self.generation);
                self.link = Some(LiveLink { publisher, pump });

                tracing::info!(
                    transport,
                    topic = %self.config.topic,
                    generation = self.generation,
                    "📡 Broadcast link established"
                );
                self.report(HealthStatus::Healthy, format!("connected via {}", transport)).await;
                Ok(())
            }
            Err(error) => {
                tracing::warn!(transport, error = %error, "Broadcast connect failed");
                self.report(HealthStatus::Unhealthy(error.to_string()), "connect failed").await;
                Err(error)
            }
        }
    }

    fn spawn_pump(
        &self,
        mut incoming: futures_util::stream::BoxStream<'static, String>,
        generation: u64,
    ) -> JoinHandle<()> {
        let local = self.local.clone();
        let hub = self.myself.clone();

        tokio::spawn(async move {
            while let Some(payload) = incoming.next().await {
                match LifecycleEvent::from_json(&payload) {
                    Ok(event) => {
                        tracing::debug!(
                            order_id = %event.order_id,
                            status = %event.status,
                            "Received lifecycle event"
                        );
                        // no local listeners is fine
                        let _ = local.send(event);
                    }
                    Err(error) => {
                        tracing::warn!(error = %error, "Dropping malformed lifecycle payload");
                    }
                }
            }

            if let Some(hub) = hub.and_then(|weak| weak.upgrade()) {
                let _ = hub.tell(ConnectionLost { generation }).await;
            }
        })
    }

    fn drop_link(&mut self) {
        // dropping aborts the pump, so no ConnectionLost follows
        self.link = None;
    }

    async fn publish_payload(&mut self, payload: String) -> Result<(), ChannelError> {
        if let Err(error) = self.ensure_link().await {
            self.schedule_reconnect();
            return Err(error);
        }

        let topic = self.config.topic.clone();
        let Some(link) = self.link.as_mut() else {
            return Err(ChannelError::Unavailable("link vanished".to_string()));
        };

        match link.publisher.publish(&topic, payload).await {
            Ok(()) => Ok(()),
            Err(error) => {
                tracing::warn!(error = %error, "Publish failed, dropping broadcast link");
                self.drop_link();
                self.report(HealthStatus::Degraded(error.to_string()), "publish failed").await;
                self.schedule_reconnect();
                Err(error)
            }
        }
    }

    /// Start the backoff loop unless one is running or nobody listens.
    /// Once the backoff is spent it keeps trying at `max_delay` until the
    /// link is back, the last listener leaves or the hub stops.
    fn schedule_reconnect(&mut self) {
        if self.reconnecting || self.local.receiver_count() == 0 {
            return;
        }
        let Some(hub) = self.myself.clone() else {
            return;
        };

        self.reconnecting = true;
        let config = self.config.reconnect.clone();
        let local = self.local.clone();

        tokio::spawn(async move {
            let backoff = retry_with_backoff(config.clone(), |attempt| reconnect_once(&hub, &local, attempt)).await;

            if let Err(mut error) = backoff.into_result() {
                let mut attempt = config.max_attempts;
                loop {
                    if matches!(error, ChannelError::HubStopped) || local.receiver_count() == 0 {
                        break;
                    }
                    tracing::warn!(
                        error = %error,
                        delay_ms = config.max_delay.as_millis() as u64,
                        "Broadcast link still down, retrying at capped interval"
                    );
                    tokio::time::sleep(config.max_delay).await;
                    attempt += 1;
                    match reconnect_once(&hub, &local, attempt).await {
                        Ok(()) => break,
                        Err(next) => error = next,
                    }
                }
            }

            if let Some(hub) = hub.upgrade() {
                let _ = hub.tell(ReconnectFinished).await;
            }
        });
    }

    fn sync_breaker_gauge(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.update_circuit_breaker_state(self.breaker.state().as_gauge());
        }
    }
}

/// One reconnect attempt; nothing to do once nobody listens
async fn reconnect_once(
    hub: &WeakActorRef<BroadcastHub>,
    local: &broadcast::Sender<LifecycleEvent>,
    attempt: u32,
) -> Result<(), ChannelError> {
    if local.receiver_count() == 0 {
        return Ok(());
    }
    let Some(hub) = hub.upgrade() else {
        return Err(ChannelError::HubStopped);
    };
    tracing::debug!(attempt, "Reconnecting broadcast link");
    hub.ask(EnsureConnected).await.map_err(unwrap_send_error)
}

/// Collapse a mailbox failure into the channel error taxonomy
pub fn unwrap_send_error<M>(error: SendError<M, ChannelError>) -> ChannelError {
    match error {
        SendError::HandlerError(error) => error,
        _ => ChannelError::HubStopped,
    }
}

impl Actor for BroadcastHub {
    type Args = Self;
    type Error = Infallible;

    async fn on_start(mut state: Self::Args, actor_ref: ActorRef<Self>) -> Result<Self, Self::Error> {
        tracing::info!(
            transport = state.transport.name(),
            topic = %state.config.topic,
            "BroadcastHub started"
        );
        state.myself = Some(actor_ref.downgrade());
        Ok(state)
    }
}

// ============================================================================
// Messages
// ============================================================================

/// Serialize and publish one event
pub struct Publish(pub LifecycleEvent);

/// Connect now if not connected
pub struct EnsureConnected;

/// A local subscriber appeared; connect, or keep retrying in the background
pub struct Attach;

/// The pump for `generation` saw its stream end
pub struct ConnectionLost {
    pub generation: u64,
}

pub struct ReconnectFinished;

pub struct GetHubStatus;

#[derive(Debug, Clone, PartialEq)]
pub struct HubStatus {
    pub connected: bool,
    pub generation: u64,
    pub circuit: CircuitState,
    pub subscribers: usize,
}

impl Reply for HubStatus {
    type Ok = Self;
    type Error = Infallible;
    type Value = Self;

    fn to_result(self) -> Result<Self, Infallible> {
        Ok(self)
    }

    fn into_any_err(self) -> Option<Box<dyn ReplyError>> {
        None
    }

    fn into_value(self) -> Self::Value {
        self
    }
}

// ============================================================================
// Message Handlers
// ============================================================================

impl Message<Publish> for BroadcastHub {
    type Reply = Result<(), ChannelError>;

    async fn handle(&mut self, msg: Publish, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        let event = msg.0;
        let event_type = event.kind.as_str();
        let payload = event.to_json().map_err(|e| ChannelError::Encode(e.to_string()))?;

        let breaker = self.breaker.clone();
        let result = match breaker.call(self.publish_payload(payload)).await {
            Ok(()) => Ok(()),
            Err(CircuitBreakerError::CircuitOpen) => Err(ChannelError::CircuitOpen),
            Err(CircuitBreakerError::OperationFailed(error)) => Err(error),
        };
        self.sync_breaker_gauge();

        if let Some(metrics) = &self.metrics {
            let reason = match &result {
                Err(ChannelError::CircuitOpen) => "circuit_open",
                Err(_) => "transport",
                Ok(()) => "",
            };
            metrics.record_publish(event_type, result.is_ok(), reason);
        }

        match &result {
            Ok(()) => tracing::debug!(
                order_id = %event.order_id,
                status = %event.status,
                event_type,
                "Published lifecycle event"
            ),
            Err(error) => {
                if self.breaker.state() == CircuitState::Open {
                    self.report(HealthStatus::Unhealthy("circuit breaker open".to_string()), error.to_string())
                        .await;
                }
            }
        }

        result
    }
}

impl Message<EnsureConnected> for BroadcastHub {
    type Reply = Result<(), ChannelError>;

    async fn handle(&mut self, _msg: EnsureConnected, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        self.ensure_link().await
    }
}

impl Message<Attach> for BroadcastHub {
    type Reply = ();

    async fn handle(&mut self, _msg: Attach, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        if self.ensure_link().await.is_err() {
            self.schedule_reconnect();
        }
    }
}

impl Message<ConnectionLost> for BroadcastHub {
    type Reply = ();

    async fn handle(&mut self, msg: ConnectionLost, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        if msg.generation != self.generation || self.link.is_none() {
            // a stale pump; the link it belonged to is already gone
            return;
        }

        tracing::warn!(generation = msg.generation, "Broadcast link lost");
        self.drop_link();
        self.report(HealthStatus::Degraded("link lost".to_string()), "reconnecting").await;
        self.schedule_reconnect();
    }
}

impl Message<ReconnectFinished> for BroadcastHub {
    type Reply = ();

    async fn handle(&mut self, _msg: ReconnectFinished, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        self.reconnecting = false;
        // the link may have dropped again while the loop was winding down
        if self.link.is_none() {
            self.schedule_reconnect();
        }
    }
}

impl Message<GetHubStatus> for BroadcastHub {
    type Reply = HubStatus;

    async fn handle(&mut self, _msg: GetHubStatus, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        HubStatus {
            connected: self.link.is_some(),
            generation: self.generation,
            circuit: self.breaker.state(),
            subscribers: self.local.receiver_count(),
        }
    }
}
