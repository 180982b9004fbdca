//! RoomRegistry port - Interface for tracking who is connected to which room.
//!
//! The registry is the only cross-connection mutable state in the relay.
//! Every mutation is a single atomic operation against the backing store;
//! callers never read-modify-write.
//!
//! ## Consistency
//!
//! The membership set is the source of truth and the active count is
//! derived from its size, so a torn update between "increment count" and
//! "add member" cannot happen. A user may hold at most one connection per
//! room; a second concurrent join is refused with
//! [`RegistryError::AlreadyJoined`].

use async_trait::async_trait;

use crate::domain::chat::RoomActivity;
use crate::domain::foundation::{RoomId, Username};

/// Errors that can occur in room registry operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The user already holds a connection in this room.
    #[error("{user} is already connected to room {room}")]
    AlreadyJoined { room: RoomId, user: Username },

    /// Backing store communication error.
    #[error("Registry store error: {0}")]
    Store(String),
}

/// Port for active-member accounting per room.
#[async_trait]
pub trait RoomRegistry: Send + Sync {
    /// Adds `user` to the room's membership set.
    ///
    /// Returns the new active count.
    async fn join(&self, room: &RoomId, user: &Username) -> Result<usize, RegistryError>;

    /// Removes `user` from the room's membership set.
    ///
    /// Returns `true` if the user was a member. Removing a non-member is a
    /// no-op, which makes repeated teardown safe.
    async fn leave(&self, room: &RoomId, user: &Username) -> Result<bool, RegistryError>;

    /// Usernames currently connected to the room, sorted.
    async fn members(&self, room: &RoomId) -> Result<Vec<Username>, RegistryError>;

    /// Number of open connections bound to the room.
    async fn active_count(&self, room: &RoomId) -> Result<usize, RegistryError>;

    /// All rooms with at least one open connection.
    async fn list_active(&self) -> Result<Vec<RoomActivity>, RegistryError>;
}
