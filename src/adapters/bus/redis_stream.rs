//! Redis Streams bus with bounded history.
//!
//! Events for a room are appended to the stream `<prefix>:stream:<room_id>`
//! with `XADD MAXLEN`, so the log never exceeds `max_len` entries. History
//! is read newest-first with `XREVRANGE` and reversed. Subscriptions track
//! the last delivered stream id and poll with a blocking `XREAD` on their
//! own connection, so a parked reader never stalls the shared publisher
//! connection.

use std::collections::VecDeque;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::streams::{StreamId, StreamMaxlen, StreamRangeReply, StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;

use crate::domain::chat::ChatEvent;
use crate::domain::foundation::RoomId;
use crate::ports::{BusCapabilities, BusError, BusSubscription, MessageBus};

const PAYLOAD_FIELD: &str = "payload";

/// How long a single XREAD parks on the server before re-polling.
const BLOCK_MILLIS: usize = 1_000;

/// Entries fetched per XREAD.
const READ_BATCH: usize = 32;

/// Id lower than any real entry id.
const STREAM_START: &str = "0-0";

/// Cross-process log bus on Redis Streams.
#[derive(Clone)]
pub struct RedisStreamBus {
    client: redis::Client,
    conn: MultiplexedConnection,
    key_prefix: String,
    max_len: usize,
}

impl RedisStreamBus {
    pub fn new(
        client: redis::Client,
        conn: MultiplexedConnection,
        key_prefix: &str,
        max_len: usize,
    ) -> Self {
        Self {
            client,
            conn,
            key_prefix: key_prefix.to_string(),
            max_len: max_len.max(1),
        }
    }

    fn stream_key(&self, room: &RoomId) -> String {
        stream_key(&self.key_prefix, room)
    }

    /// Newest `count` entries, newest first.
    async fn newest(&self, key: &str, count: usize) -> Result<Vec<StreamId>, BusError> {
        let mut conn = self.conn.clone();
        let reply: StreamRangeReply = conn
            .xrevrange_count(key, "+", "-", count)
            .await
            .map_err(|e: redis::RedisError| BusError::unavailable(e))?;
        Ok(reply.ids)
    }

    async fn open(&self, key: String, cursor: String) -> Result<Box<dyn BusSubscription>, BusError> {
        let conn = self
            .client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(|e: redis::RedisError| BusError::unavailable(e))?;

        Ok(Box::new(StreamSubscription {
            conn: Some(conn),
            key,
            cursor,
            buffered: VecDeque::new(),
        }))
    }
}

fn stream_key(prefix: &str, room: &RoomId) -> String {
    format!("{}:stream:{}", prefix, room)
}

fn decode_entry(entry: &StreamId) -> Result<ChatEvent, BusError> {
    let payload: String = entry.get(PAYLOAD_FIELD).ok_or_else(|| {
        BusError::Malformed(format!("stream entry {} has no {} field", entry.id, PAYLOAD_FIELD))
    })?;
    ChatEvent::from_json(&payload).map_err(|e| BusError::Malformed(e.to_string()))
}

/// Decodes newest-first entries into chronological events.
///
/// Returns the events and the id of the newest entry.
fn chronological(newest_first: Vec<StreamId>) -> (Vec<ChatEvent>, Option<String>) {
    let last_id = newest_first.first().map(|entry| entry.id.clone());
    let events = newest_first
        .iter()
        .rev()
        .filter_map(|entry| match decode_entry(entry) {
            Ok(event) => Some(event),
            Err(e) => {
                tracing::warn!(entry_id = %entry.id, error = %e, "Skipping malformed history entry");
                None
            }
        })
        .collect();
    (events, last_id)
}

#[async_trait]
impl MessageBus for RedisStreamBus {
    fn name(&self) -> &'static str {
        "redis-stream"
    }

    fn capabilities(&self) -> BusCapabilities {
        BusCapabilities {
            history: true,
            ordered: true,
        }
    }

    async fn publish(&self, room: &RoomId, event: &ChatEvent) -> Result<(), BusError> {
        let payload = event.to_json().map_err(|e| BusError::Malformed(e.to_string()))?;

        let mut conn = self.conn.clone();
        conn.xadd_maxlen::<_, _, _, _, String>(
            self.stream_key(room),
            StreamMaxlen::Equals(self.max_len),
            "*",
            &[(PAYLOAD_FIELD, payload)],
        )
        .await
        .map_err(|e: redis::RedisError| BusError::unavailable(e))?;

        Ok(())
    }

    async fn subscribe(&self, room: &RoomId) -> Result<Box<dyn BusSubscription>, BusError> {
        let key = self.stream_key(room);
        let cursor = self
            .newest(&key, 1)
            .await?
            .into_iter()
            .next()
            .map(|entry| entry.id)
            .unwrap_or_else(|| STREAM_START.to_string());
        self.open(key, cursor).await
    }

    async fn history(&self, room: &RoomId, limit: usize) -> Result<Vec<ChatEvent>, BusError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let entries = self.newest(&self.stream_key(room), limit).await?;
        Ok(chronological(entries).0)
    }

    async fn subscribe_with_history(
        &self,
        room: &RoomId,
        limit: usize,
    ) -> Result<(Vec<ChatEvent>, Box<dyn BusSubscription>), BusError> {
        let key = self.stream_key(room);
        let entries = self.newest(&key, limit.max(1)).await?;
        let (mut events, last_id) = chronological(entries);
        if limit == 0 {
            events.clear();
        }

        let cursor = last_id.unwrap_or_else(|| STREAM_START.to_string());
        let subscription = self.open(key, cursor).await?;
        Ok((events, subscription))
    }
}

struct StreamSubscription {
    conn: Option<MultiplexedConnection>,
    key: String,
    cursor: String,
    buffered: VecDeque<StreamId>,
}

#[async_trait]
impl BusSubscription for StreamSubscription {
    async fn next_event(&mut self) -> Result<Option<ChatEvent>, BusError> {
        loop {
            if let Some(entry) = self.buffered.pop_front() {
                self.cursor = entry.id.clone();
                return decode_entry(&entry).map(Some);
            }

            let Some(conn) = self.conn.as_mut() else {
                return Ok(None);
            };

            let options = StreamReadOptions::default()
                .block(BLOCK_MILLIS)
                .count(READ_BATCH);
            let reply: Option<StreamReadReply> = conn
                .xread_options(&[self.key.as_str()], &[self.cursor.as_str()], &options)
                .await
                .map_err(|e: redis::RedisError| BusError::unavailable(e))?;

            if let Some(reply) = reply {
                self.buffered
                    .extend(reply.keys.into_iter().flat_map(|stream| stream.ids));
            }
        }
    }

    async fn close(&mut self) {
        self.conn = None;
        self.buffered.clear();
    }
}
