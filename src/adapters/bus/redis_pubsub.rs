//! Redis PUBLISH/SUBSCRIBE bus.
//!
//! Each room maps to the channel `<prefix>:room:<room_id>`. Publishing goes
//! through the shared multiplexed connection; every subscription owns a
//! dedicated pub/sub connection driven by a forwarding task, which is
//! aborted on close so the server drops the subscription.

use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::domain::chat::ChatEvent;
use crate::domain::foundation::RoomId;
use crate::ports::{BusCapabilities, BusError, BusSubscription, MessageBus};

/// Buffered payloads per subscription between the Redis reader and the pump.
const FORWARD_BUFFER: usize = 64;

/// Cross-process broadcast bus on Redis pub/sub.
#[derive(Clone)]
pub struct RedisPubSubBus {
    client: redis::Client,
    conn: MultiplexedConnection,
    key_prefix: String,
}

impl RedisPubSubBus {
    pub fn new(client: redis::Client, conn: MultiplexedConnection, key_prefix: &str) -> Self {
        Self {
            client,
            conn,
            key_prefix: key_prefix.to_string(),
        }
    }

    fn channel(&self, room: &RoomId) -> String {
        channel_name(&self.key_prefix, room)
    }
}

fn channel_name(prefix: &str, room: &RoomId) -> String {
    format!("{}:room:{}", prefix, room)
}

#[async_trait]
impl MessageBus for RedisPubSubBus {
    fn name(&self) -> &'static str {
        "redis-pubsub"
    }

    fn capabilities(&self) -> BusCapabilities {
        BusCapabilities {
            history: false,
            ordered: true,
        }
    }

    async fn publish(&self, room: &RoomId, event: &ChatEvent) -> Result<(), BusError> {
        let payload = event.to_json().map_err(|e| BusError::Malformed(e.to_string()))?;

        let mut conn = self.conn.clone();
        conn.publish::<_, _, i64>(self.channel(room), payload)
            .await
            .map_err(|e: redis::RedisError| BusError::unavailable(e))?;

        Ok(())
    }

    async fn subscribe(&self, room: &RoomId) -> Result<Box<dyn BusSubscription>, BusError> {
        let channel = self.channel(room);

        let mut pubsub = self
            .client
            .get_async_connection()
            .await
            .map_err(|e: redis::RedisError| BusError::unavailable(e))?
            .into_pubsub();
        pubsub
            .subscribe(&channel)
            .await
            .map_err(|e: redis::RedisError| BusError::unavailable(e))?;

        let (tx, rx) = mpsc::channel(FORWARD_BUFFER);
        let forwarder = tokio::spawn(async move {
            let mut messages = pubsub.into_on_message();
            while let Some(msg) = messages.next().await {
                let payload: String = match msg.get_payload() {
                    Ok(payload) => payload,
                    Err(e) => {
                        tracing::warn!(channel = %channel, error = %e, "Non-text pub/sub payload");
                        continue;
                    }
                };
                if tx.send(payload).await.is_err() {
                    break;
                }
            }
        });

        Ok(Box::new(RedisPubSubSubscription {
            receiver: Some(rx),
            forwarder: Some(forwarder),
        }))
    }
}

struct RedisPubSubSubscription {
    receiver: Option<mpsc::Receiver<String>>,
    forwarder: Option<JoinHandle<()>>,
}

#[async_trait]
impl BusSubscription for RedisPubSubSubscription {
    async fn next_event(&mut self) -> Result<Option<ChatEvent>, BusError> {
        let Some(receiver) = self.receiver.as_mut() else {
            return Ok(None);
        };

        match receiver.recv().await {
            Some(payload) => ChatEvent::from_json(&payload)
                .map(Some)
                .map_err(|e| BusError::Malformed(e.to_string())),
            None => {
                self.receiver = None;
                Ok(None)
            }
        }
    }

    async fn close(&mut self) {
        self.receiver = None;
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
    }
}

impl Drop for RedisPubSubSubscription {
    fn drop(&mut self) {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
    }
}
