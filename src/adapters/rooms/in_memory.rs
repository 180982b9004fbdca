//! In-memory room repository.
//!
//! Expired rooms are dropped lazily the next time they are looked at.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::chat::Room;
use crate::domain::foundation::{RoomId, Timestamp, Username};
use crate::ports::{RoomError, RoomRepository};

/// Room records held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryRoomRepository {
    rooms: RwLock<HashMap<RoomId, Room>>,
}

impl InMemoryRoomRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a repository pre-populated with rooms (useful for tests).
    pub fn with_rooms(rooms: impl IntoIterator<Item = Room>) -> Self {
        Self {
            rooms: RwLock::new(rooms.into_iter().map(|r| (r.id.clone(), r)).collect()),
        }
    }
}

#[async_trait]
impl RoomRepository for InMemoryRoomRepository {
    async fn create(&self, room: Room) -> Result<Room, RoomError> {
        let now = Timestamp::now();
        let mut rooms = self.rooms.write().await;

        if rooms.get(&room.id).is_some_and(|existing| !existing.is_expired(&now)) {
            return Err(RoomError::AlreadyExists(room.id));
        }

        rooms.insert(room.id.clone(), room.clone());
        Ok(room)
    }

    async fn delete(&self, id: &RoomId, requester: &Username) -> Result<(), RoomError> {
        let now = Timestamp::now();
        let mut rooms = self.rooms.write().await;

        match rooms.get(id) {
            None => Err(RoomError::NotFound(id.clone())),
            Some(room) if room.is_expired(&now) => {
                rooms.remove(id);
                Err(RoomError::NotFound(id.clone()))
            }
            Some(room) if !room.is_admin(requester) => Err(RoomError::Forbidden),
            Some(_) => {
                rooms.remove(id);
                Ok(())
            }
        }
    }

    async fn get(&self, id: &RoomId) -> Result<Option<Room>, RoomError> {
        let now = Timestamp::now();
        {
            let rooms = self.rooms.read().await;
            match rooms.get(id) {
                None => return Ok(None),
                Some(room) if !room.is_expired(&now) => return Ok(Some(room.clone())),
                Some(_) => {}
            }
        }

        let mut rooms = self.rooms.write().await;
        Ok(take_live(&mut rooms, id, &now))
    }

    async fn list(&self) -> Result<Vec<Room>, RoomError> {
        let now = Timestamp::now();
        let mut rooms = self.rooms.write().await;
        rooms.retain(|_, room| !room.is_expired(&now));

        let mut live: Vec<Room> = rooms.values().cloned().collect();
        live.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(live)
    }
}

/// Returns the room under `id` if it is live, evicting it otherwise.
///
/// Expiry is judged against the entry present now, which may have been
/// re-created since an earlier read saw an expired one.
fn take_live(rooms: &mut HashMap<RoomId, Room>, id: &RoomId, now: &Timestamp) -> Option<Room> {
    match rooms.get(id) {
        Some(room) if !room.is_expired(now) => Some(room.clone()),
        Some(_) => {
            rooms.remove(id);
            None
        }
        None => None,
    }
}
