use futures_util::FutureExt;
use kameo::actor::ActorRef;
use kameo::Actor;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, OnceLock};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::transport::{BroadcastTransport, ChannelError};
use crate::actors::{
    unwrap_send_error, Attach, BroadcastHub, GetHubStatus, HealthMonitorActor, HubConfig, HubStatus, Publish,
};
use crate::domain::order::LifecycleEvent;
use crate::metrics::Metrics;

// ============================================================================
// Broadcast Channel - handle onto the broadcast hub
// ============================================================================
//
// Cheap to clone. Publishing goes through the hub's mailbox; subscribers read
// from a local fan-out that the hub's pump feeds, so a slow subscriber never
// holds up a publisher.
//
// ============================================================================

const LOCAL_CAPACITY: usize = 256;

static SHARED: OnceLock<BroadcastChannel> = OnceLock::new();

#[derive(Clone)]
pub struct BroadcastChannel {
    hub: ActorRef<BroadcastHub>,
    local: broadcast::Sender<LifecycleEvent>,
}

impl BroadcastChannel {
    /// Spawn a hub over `transport`. Does not connect yet.
    pub fn start(
        transport: Arc<dyn BroadcastTransport>,
        config: HubConfig,
        health: Option<ActorRef<HealthMonitorActor>>,
        metrics: Option<Arc<Metrics>>,
    ) -> Self {
        let (local, _) = broadcast::channel(LOCAL_CAPACITY);
        let hub = BroadcastHub::spawn(BroadcastHub::new(transport, config, local.clone(), health, metrics));
        Self { hub, local }
    }

    /// The process-wide channel. `init` runs only for the first caller.
    pub fn shared(init: impl FnOnce() -> BroadcastChannel) -> BroadcastChannel {
        SHARED.get_or_init(init).clone()
    }

    /// Publish on the shared topic. Returns once the transport accepted the
    /// payload, not when anyone has processed it.
    pub async fn publish(&self, event: &LifecycleEvent) -> Result<(), ChannelError> {
        self.hub.ask(Publish(event.clone())).await.map_err(unwrap_send_error)
    }

    /// Receive every event delivered on the topic from now on. Connects if
    /// needed; when the broker is down the hub keeps retrying in the background.
    pub async fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        let receiver = self.local.subscribe();
        if self.hub.ask(Attach).await.is_err() {
            tracing::error!("Broadcast hub is not running; subscriber will stay idle");
        }
        receiver
    }

    /// Run `callback` once per received event on a background task. Errors
    /// and panics raised by the callback are logged and the loop continues.
    pub async fn on_message<F, Fut>(&self, mut callback: F) -> JoinHandle<()>
    where
        F: FnMut(LifecycleEvent) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let mut receiver = self.subscribe().await;

        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => {
                        let order_id = event.order_id.clone();
                        let outcome = AssertUnwindSafe(async { callback(event).await }).catch_unwind().await;
                        match outcome {
                            Ok(Ok(())) => {}
                            Ok(Err(error)) => {
                                tracing::warn!(order_id = %order_id, error = %error, "Lifecycle callback failed");
                            }
                            Err(_) => {
                                tracing::error!(order_id = %order_id, "Lifecycle callback panicked");
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Lifecycle callback fell behind, events skipped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    pub async fn status(&self) -> Result<HubStatus, ChannelError> {
        self.hub.ask(GetHubStatus).await.map_err(|_| ChannelError::HubStopped)
    }
}
