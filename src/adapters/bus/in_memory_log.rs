//! In-memory bounded log bus.
//!
//! Each room owns a ring buffer of serialized events tagged with a
//! monotonically increasing sequence number. Subscriptions keep the
//! sequence of the next entry they expect, so delivery is gap-free and in
//! publish order as long as the reader stays within `max_len` entries of
//! the head. A reader that falls further behind resumes at the oldest
//! retained entry.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use crate::domain::chat::ChatEvent;
use crate::domain::foundation::RoomId;
use crate::ports::{BusCapabilities, BusError, BusSubscription, MessageBus};

struct RoomLog {
    entries: VecDeque<(u64, String)>,
    next_seq: u64,
    notify: Arc<Notify>,
}

impl RoomLog {
    fn new() -> Self {
        Self {
            entries: VecDeque::new(),
            next_seq: 0,
            notify: Arc::new(Notify::new()),
        }
    }

    fn first_seq(&self) -> u64 {
        self.entries.front().map(|(seq, _)| *seq).unwrap_or(self.next_seq)
    }

    fn recent(&self, limit: usize) -> Vec<String> {
        let mut newest_first: Vec<String> = self
            .entries
            .iter()
            .rev()
            .take(limit)
            .map(|(_, payload)| payload.clone())
            .collect();
        newest_first.reverse();
        newest_first
    }
}

type Logs = Arc<Mutex<HashMap<RoomId, RoomLog>>>;

/// Single-process bounded log bus with history.
#[derive(Clone)]
pub struct InMemoryLogBus {
    logs: Logs,
    max_len: usize,
}

impl InMemoryLogBus {
    pub fn new(max_len: usize) -> Self {
        Self {
            logs: Arc::new(Mutex::new(HashMap::new())),
            max_len: max_len.max(1),
        }
    }

    /// Number of retained entries for a room.
    pub async fn len(&self, room: &RoomId) -> usize {
        self.logs
            .lock()
            .await
            .get(room)
            .map(|log| log.entries.len())
            .unwrap_or(0)
    }

    fn open(&self, room: &RoomId, log: &RoomLog) -> Box<dyn BusSubscription> {
        Box::new(LogSubscription {
            room: room.clone(),
            logs: Arc::clone(&self.logs),
            notify: Arc::clone(&log.notify),
            next_seq: log.next_seq,
            closed: false,
        })
    }
}

fn decode(payloads: Vec<String>) -> Result<Vec<ChatEvent>, BusError> {
    payloads
        .iter()
        .map(|p| ChatEvent::from_json(p).map_err(|e| BusError::Malformed(e.to_string())))
        .collect()
}

#[async_trait]
impl MessageBus for InMemoryLogBus {
    fn name(&self) -> &'static str {
        "in-memory-log"
    }

    fn capabilities(&self) -> BusCapabilities {
        BusCapabilities {
            history: true,
            ordered: true,
        }
    }

    async fn publish(&self, room: &RoomId, event: &ChatEvent) -> Result<(), BusError> {
        let payload = event.to_json().map_err(|e| BusError::Malformed(e.to_string()))?;

        let mut logs = self.logs.lock().await;
        let log = logs.entry(room.clone()).or_insert_with(RoomLog::new);

        log.entries.push_back((log.next_seq, payload));
        log.next_seq += 1;
        while log.entries.len() > self.max_len {
            log.entries.pop_front();
        }
        log.notify.notify_waiters();

        Ok(())
    }

    async fn subscribe(&self, room: &RoomId) -> Result<Box<dyn BusSubscription>, BusError> {
        let mut logs = self.logs.lock().await;
        let log = logs.entry(room.clone()).or_insert_with(RoomLog::new);
        Ok(self.open(room, log))
    }

    async fn history(&self, room: &RoomId, limit: usize) -> Result<Vec<ChatEvent>, BusError> {
        let payloads = self
            .logs
            .lock()
            .await
            .get(room)
            .map(|log| log.recent(limit))
            .unwrap_or_default();
        decode(payloads)
    }

    async fn subscribe_with_history(
        &self,
        room: &RoomId,
        limit: usize,
    ) -> Result<(Vec<ChatEvent>, Box<dyn BusSubscription>), BusError> {
        let (payloads, subscription) = {
            let mut logs = self.logs.lock().await;
            let log = logs.entry(room.clone()).or_insert_with(RoomLog::new);
            (log.recent(limit), self.open(room, log))
        };
        Ok((decode(payloads)?, subscription))
    }
}

struct LogSubscription {
    room: RoomId,
    logs: Logs,
    notify: Arc<Notify>,
    next_seq: u64,
    closed: bool,
}

impl LogSubscription {
    async fn take_next(&mut self) -> Option<String> {
        let logs = self.logs.lock().await;
        let log = logs.get(&self.room)?;

        let first = log.first_seq();
        if self.next_seq < first {
            tracing::warn!(
                room_id = %self.room,
                skipped = first - self.next_seq,
                "Reader fell behind log retention, events dropped"
            );
            self.next_seq = first;
        }

        let index = usize::try_from(self.next_seq - first).ok()?;
        let (_, payload) = log.entries.get(index)?;
        self.next_seq += 1;
        Some(payload.clone())
    }
}

#[async_trait]
impl BusSubscription for LogSubscription {
    async fn next_event(&mut self) -> Result<Option<ChatEvent>, BusError> {
        loop {
            if self.closed {
                return Ok(None);
            }

            let notify = Arc::clone(&self.notify);
            let notified = notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(payload) = self.take_next().await {
                return ChatEvent::from_json(&payload)
                    .map(Some)
                    .map_err(|e| BusError::Malformed(e.to_string()));
            }

            notified.await;
        }
    }

    async fn close(&mut self) {
        self.closed = true;
    }
}
