// ============================================================================
// Messaging Module
// ============================================================================
//
// - transport    - the link abstraction a broker adapter implements
// - redis_pubsub - Redis pub/sub adapter
// - memory       - in-process adapter (tests, demo)
// - channel      - BroadcastChannel, the handle everyone publishes through
// - mailer       - best-effort READY notifier
//
// ============================================================================

mod channel;
mod mailer;
mod memory;
mod redis_pubsub;
mod transport;

pub use channel::BroadcastChannel;
pub use mailer::{LogNotifier, ReadyNotifier};
pub use memory::InMemoryTransport;
pub use redis_pubsub::RedisTransport;
pub use transport::{BroadcastTransport, ChannelError, TransportLink, TransportPublisher};
