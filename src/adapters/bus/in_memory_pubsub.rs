//! In-memory pub/sub bus backed by one tokio broadcast channel per room.
//!
//! Fire-and-forget: events published to a room with no subscribers are
//! dropped, and a subscriber that falls more than `channel_capacity` events
//! behind skips the oldest ones (logged as a warning).

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};

use crate::domain::chat::ChatEvent;
use crate::domain::foundation::RoomId;
use crate::ports::{BusCapabilities, BusError, BusSubscription, MessageBus};

/// Single-process broadcast bus.
pub struct InMemoryPubSubBus {
    rooms: RwLock<HashMap<RoomId, broadcast::Sender<String>>>,
    channel_capacity: usize,
}

impl InMemoryPubSubBus {
    pub fn new(channel_capacity: usize) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            channel_capacity: channel_capacity.max(1),
        }
    }

    /// Number of live subscriptions for a room.
    pub async fn subscriber_count(&self, room: &RoomId) -> usize {
        self.rooms
            .read()
            .await
            .get(room)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl MessageBus for InMemoryPubSubBus {
    fn name(&self) -> &'static str {
        "in-memory-pubsub"
    }

    fn capabilities(&self) -> BusCapabilities {
        BusCapabilities {
            history: false,
            ordered: true,
        }
    }

    async fn publish(&self, room: &RoomId, event: &ChatEvent) -> Result<(), BusError> {
        let payload = event.to_json().map_err(|e| BusError::Malformed(e.to_string()))?;

        let rooms = self.rooms.read().await;
        let Some(sender) = rooms.get(room) else {
            return Ok(());
        };

        if sender.send(payload).is_err() {
            // Every receiver is gone; forget the channel.
            drop(rooms);
            let mut rooms = self.rooms.write().await;
            if rooms.get(room).is_some_and(|tx| tx.receiver_count() == 0) {
                rooms.remove(room);
            }
        }

        Ok(())
    }

    async fn subscribe(&self, room: &RoomId) -> Result<Box<dyn BusSubscription>, BusError> {
        let mut rooms = self.rooms.write().await;
        let sender = rooms.entry(room.clone()).or_insert_with(|| {
            let (tx, _) = broadcast::channel(self.channel_capacity);
            tx
        });

        Ok(Box::new(PubSubSubscription {
            room: room.clone(),
            receiver: Some(sender.subscribe()),
        }))
    }
}

struct PubSubSubscription {
    room: RoomId,
    receiver: Option<broadcast::Receiver<String>>,
}

#[async_trait]
impl BusSubscription for PubSubSubscription {
    async fn next_event(&mut self) -> Result<Option<ChatEvent>, BusError> {
        let Some(receiver) = self.receiver.as_mut() else {
            return Ok(None);
        };

        loop {
            match receiver.recv().await {
                Ok(payload) => {
                    return ChatEvent::from_json(&payload)
                        .map(Some)
                        .map_err(|e| BusError::Malformed(e.to_string()));
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        room_id = %self.room,
                        skipped,
                        "Subscriber lagged behind, events dropped"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => {
                    self.receiver = None;
                    return Ok(None);
                }
            }
        }
    }

    async fn close(&mut self) {
        self.receiver = None;
    }
}
