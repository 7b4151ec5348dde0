use async_trait::async_trait;
use futures_util::StreamExt;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use super::transport::{BroadcastTransport, ChannelError, TransportLink, TransportPublisher};

// ============================================================================
// Redis Pub/Sub Transport
// ============================================================================
//
// Publishing goes over a multiplexed connection; receiving uses a dedicated
// pub/sub connection subscribed to the lifecycle topic. Redis pub/sub is
// fire-and-forget: messages sent while a subscriber is reconnecting are lost,
// which observers recover from by re-fetching.
//
// ============================================================================

pub struct RedisTransport {
    client: redis::Client,
}

impl RedisTransport {
    pub fn new(url: &str) -> Result<Self, ChannelError> {
        let client = redis::Client::open(url).map_err(|e| ChannelError::Unavailable(e.to_string()))?;
        Ok(Self { client })
    }
}

struct RedisPublisher {
    connection: MultiplexedConnection,
}

#[async_trait]
impl TransportPublisher for RedisPublisher {
    async fn publish(&mut self, topic: &str, payload: String) -> Result<(), ChannelError> {
        let receivers: i64 = self
            .connection
            .publish(topic, payload)
            .await
            .map_err(|e| ChannelError::Unavailable(e.to_string()))?;

        tracing::debug!(topic = %topic, receivers, "Published to Redis");
        Ok(())
    }
}

#[async_trait]
impl BroadcastTransport for RedisTransport {
    async fn connect(&self, topic: &str) -> Result<TransportLink, ChannelError> {
        let connection = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| ChannelError::Unavailable(e.to_string()))?;

        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|e| ChannelError::Unavailable(e.to_string()))?;
        pubsub
            .subscribe(topic)
            .await
            .map_err(|e| ChannelError::Unavailable(e.to_string()))?;

        tracing::info!(topic = %topic, "Subscribed to Redis channel");

        let incoming = pubsub
            .into_on_message()
            .filter_map(|msg| async move {
                match msg.get_payload::<String>() {
                    Ok(payload) => Some(payload),
                    Err(e) => {
                        tracing::warn!(error = %e, "Dropping non-text Redis payload");
                        None
                    }
                }
            })
            .boxed();

        Ok(TransportLink {
            publisher: Box::new(RedisPublisher { connection }),
            incoming,
        })
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
