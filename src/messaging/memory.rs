use async_trait::async_trait;
use futures_util::StreamExt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

use super::transport::{BroadcastTransport, ChannelError, TransportLink, TransportPublisher};

// ============================================================================
// In-Process Transport
// ============================================================================
//
// A broker living in this process, for tests and single-node demos. It can
// be taken offline (connects fail) and can sever every open link, which is
// what a broker restart looks like to a client.
//
// ============================================================================

#[derive(Clone)]
pub struct InMemoryTransport {
    inner: Arc<Inner>,
}

struct Inner {
    bus: broadcast::Sender<(String, String)>,
    /// Bumped to sever all live links
    epoch: watch::Sender<u64>,
    offline: AtomicBool,
    connects: AtomicU32,
    published: AtomicU32,
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTransport {
    pub fn new() -> Self {
        let (bus, _) = broadcast::channel(1024);
        let (epoch, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                bus,
                epoch,
                offline: AtomicBool::new(false),
                connects: AtomicU32::new(0),
                published: AtomicU32::new(0),
            }),
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    /// Drop every open link; their incoming streams end
    pub fn sever_links(&self) {
        self.inner.epoch.send_modify(|epoch| *epoch += 1);
    }

    /// Successful connects so far
    pub fn connect_count(&self) -> u32 {
        self.inner.connects.load(Ordering::SeqCst)
    }

    pub fn publish_count(&self) -> u32 {
        self.inner.published.load(Ordering::SeqCst)
    }

    /// Inject a raw payload as if another process had published it
    pub fn inject(&self, topic: &str, payload: impl Into<String>) {
        let _ = self.inner.bus.send((topic.to_string(), payload.into()));
    }
}

struct InMemoryPublisher {
    inner: Arc<Inner>,
    epoch: u64,
}

#[async_trait]
impl TransportPublisher for InMemoryPublisher {
    async fn publish(&mut self, topic: &str, payload: String) -> Result<(), ChannelError> {
        if self.inner.offline.load(Ordering::SeqCst) || *self.inner.epoch.borrow() != self.epoch {
            return Err(ChannelError::Unavailable("in-memory link severed".to_string()));
        }

        // no live receivers is not an error for pub/sub
        let _ = self.inner.bus.send((topic.to_string(), payload));
        self.inner.published.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl BroadcastTransport for InMemoryTransport {
    async fn connect(&self, topic: &str) -> Result<TransportLink, ChannelError> {
        if self.inner.offline.load(Ordering::SeqCst) {
            return Err(ChannelError::Unavailable("in-memory broker offline".to_string()));
        }

        let rx = self.inner.bus.subscribe();
        let mut epoch_rx = self.inner.epoch.subscribe();
        let epoch = *epoch_rx.borrow_and_update();
        let topic = topic.to_string();

        let incoming = futures_util::stream::unfold((rx, epoch_rx), move |(mut rx, mut epoch_rx)| {
            let topic = topic.clone();
            async move {
                loop {
                    tokio::select! {
                        changed = epoch_rx.changed() => {
                            // severed, or the transport itself was dropped
                            let _ = changed;
                            return None;
                        }
                        received = rx.recv() => match received {
                            Ok((t, payload)) if t == topic => return Some((payload, (rx, epoch_rx))),
                            Ok(_) => continue,
                            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                                tracing::warn!(skipped, "In-memory link lagged, messages lost");
                                continue;
                            }
                            Err(broadcast::error::RecvError::Closed) => return None,
                        }
                    }
                }
            }
        })
        .boxed();

        self.inner.connects.fetch_add(1, Ordering::SeqCst);

        Ok(TransportLink {
            publisher: Box::new(InMemoryPublisher { inner: self.inner.clone(), epoch }),
            incoming,
        })
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
