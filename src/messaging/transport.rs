use async_trait::async_trait;
use futures_util::stream::BoxStream;

// ============================================================================
// Broadcast Transport Abstraction
// ============================================================================
//
// A transport knows how to open one physical link to the pub/sub broker:
// a publisher half and a stream of raw payloads received on the topic. The
// stream ending means the link dropped. Reconnection policy lives in the
// broadcast hub, not here.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChannelError {
    #[error("transport unavailable: {0}")]
    Unavailable(String),

    #[error("circuit breaker open, broadcast suspended")]
    CircuitOpen,

    #[error("could not encode lifecycle event: {0}")]
    Encode(String),

    #[error("broadcast hub is not running")]
    HubStopped,
}

#[async_trait]
pub trait TransportPublisher: Send + Sync {
    async fn publish(&mut self, topic: &str, payload: String) -> Result<(), ChannelError>;
}

/// One established connection
pub struct TransportLink {
    pub publisher: Box<dyn TransportPublisher>,
    pub incoming: BoxStream<'static, String>,
}

#[async_trait]
pub trait BroadcastTransport: Send + Sync + 'static {
    /// Open a link and subscribe it to `topic`
    async fn connect(&self, topic: &str) -> Result<TransportLink, ChannelError>;

    /// Name used in logs and health reports
    fn name(&self) -> &'static str;
}
