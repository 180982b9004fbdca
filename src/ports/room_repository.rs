//! RoomRepository port - Interface for persisted room records.
//!
//! The relay core only calls [`RoomRepository::get`] to check that a room
//! exists before a connection joins it; the remaining operations back the
//! room management HTTP routes.

use async_trait::async_trait;

use crate::domain::chat::Room;
use crate::domain::foundation::{RoomId, Username};

/// Errors from room persistence.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    /// A room with the same id already exists.
    #[error("Room {0} already exists")]
    AlreadyExists(RoomId),

    /// No such room.
    #[error("Room {0} not found")]
    NotFound(RoomId),

    /// The requester is not the room's admin.
    #[error("Only the room admin may do this")]
    Forbidden,

    /// Backing store communication error.
    #[error("Room store error: {0}")]
    Store(String),
}

/// Port for room CRUD.
///
/// # Contract
///
/// - Expired rooms behave as if they did not exist
/// - `delete` only succeeds for the room's admin
#[async_trait]
pub trait RoomRepository: Send + Sync {
    /// Persists a new room.
    async fn create(&self, room: Room) -> Result<Room, RoomError>;

    /// Deletes a room if `requester` is its admin.
    async fn delete(&self, id: &RoomId, requester: &Username) -> Result<(), RoomError>;

    /// Finds a room by id.
    async fn get(&self, id: &RoomId) -> Result<Option<Room>, RoomError>;

    /// Lists all live rooms, sorted by id.
    async fn list(&self) -> Result<Vec<Room>, RoomError>;
}
