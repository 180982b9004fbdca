//! MessageBus port - Interface for distributing chat events between connections.
//!
//! This port defines how room sessions publish and receive events without
//! knowing about the underlying transport mechanism. Two delivery models
//! exist behind the same interface:
//!
//! - **Pub/sub** - fire-and-forget broadcast. Events published while nobody
//!   is subscribed are lost, and a lagging subscriber may miss events.
//! - **Bounded log** - append-only log with a retention cap. Subscriptions
//!   carry a cursor so delivery never skips or duplicates, and recent
//!   history can be read back on join.
//!
//! The variant is chosen once at startup; callers branch on
//! [`BusCapabilities`] rather than on concrete types.

use async_trait::async_trait;

use crate::domain::chat::ChatEvent;
use crate::domain::foundation::RoomId;

/// Errors surfaced by message bus adapters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BusError {
    /// The bus could not be reached or rejected the command.
    #[error("Message bus unavailable: {0}")]
    Unavailable(String),

    /// A payload read from the bus is not a valid event.
    #[error("Malformed bus payload: {0}")]
    Malformed(String),

    /// The backend keeps no history.
    #[error("History is not supported by the {0} backend")]
    HistoryUnsupported(&'static str),
}

impl BusError {
    /// Creates an unavailable error from any displayable cause.
    pub fn unavailable(cause: impl std::fmt::Display) -> Self {
        Self::Unavailable(cause.to_string())
    }
}

/// Optional features of a bus backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusCapabilities {
    /// Recent events can be read back with [`MessageBus::history`].
    pub history: bool,
    /// Delivery order per subscription equals publish order.
    pub ordered: bool,
}

/// A live handle to one room's event stream.
///
/// Owned by exactly one outbound pump and never shared.
#[async_trait]
pub trait BusSubscription: Send {
    /// Waits for the next event.
    ///
    /// Returns `Ok(None)` once the subscription is closed or the bus side
    /// went away for good.
    async fn next_event(&mut self) -> Result<Option<ChatEvent>, BusError>;

    /// Releases bus-side resources. Safe to call more than once.
    async fn close(&mut self);
}

/// Port for publishing and subscribing to room events.
///
/// # Contract
///
/// - `publish` reports failures to the caller and never retries internally
/// - `subscribe` returns a handle that only yields events of that room
/// - `history` returns events in chronological order (oldest first)
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Features supported by this backend.
    fn capabilities(&self) -> BusCapabilities;

    /// Serializes `event` and writes it to the room's channel or log.
    async fn publish(&self, room: &RoomId, event: &ChatEvent) -> Result<(), BusError>;

    /// Opens a live subscription to the room.
    ///
    /// For log backends the subscription starts at the current end of the
    /// log.
    async fn subscribe(&self, room: &RoomId) -> Result<Box<dyn BusSubscription>, BusError>;

    /// Reads up to `limit` of the most recent events, oldest first.
    async fn history(&self, _room: &RoomId, _limit: usize) -> Result<Vec<ChatEvent>, BusError> {
        Err(BusError::HistoryUnsupported(self.name()))
    }

    /// Reads recent history and opens a subscription that continues exactly
    /// after the last returned event.
    ///
    /// Backends without history return an empty history and a plain
    /// subscription.
    async fn subscribe_with_history(
        &self,
        room: &RoomId,
        _limit: usize,
    ) -> Result<(Vec<ChatEvent>, Box<dyn BusSubscription>), BusError> {
        let subscription = self.subscribe(room).await?;
        Ok((Vec::new(), subscription))
    }
}
