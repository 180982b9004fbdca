//! Redis-backed room repository.
//!
//! Each room is a hash at `<prefix>:room:metadata:<room_id>` with fields
//! `name`, `admin`, `created_at` and `expires_at` (unix millis). The hash
//! carries a Redis TTL matching the retention window, so expiry needs no
//! sweeper. `<prefix>:rooms` indexes room ids for listing; ids whose hash
//! has expired are pruned from it while listing.

use std::collections::HashMap;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use crate::domain::chat::Room;
use crate::domain::foundation::{RoomId, Timestamp, Username};
use crate::ports::{RoomError, RoomRepository};

fn store_error(e: redis::RedisError) -> RoomError {
    RoomError::Store(e.to_string())
}

/// Room repository backed by Redis hashes with TTL.
#[derive(Clone)]
pub struct RedisRoomRepository {
    conn: MultiplexedConnection,
    key_prefix: String,
}

impl RedisRoomRepository {
    pub fn new(conn: MultiplexedConnection, key_prefix: &str) -> Self {
        Self {
            conn,
            key_prefix: key_prefix.to_string(),
        }
    }

    fn metadata_key(&self, id: &RoomId) -> String {
        format!("{}:room:metadata:{}", self.key_prefix, id)
    }

    fn index_key(&self) -> String {
        format!("{}:rooms", self.key_prefix)
    }

    async fn load(&self, id: &RoomId) -> Result<Option<Room>, RoomError> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = conn
            .hgetall(self.metadata_key(id))
            .await
            .map_err(store_error)?;

        if fields.is_empty() {
            return Ok(None);
        }
        room_from_fields(id, &fields).map(Some)
    }
}

fn room_from_fields(id: &RoomId, fields: &HashMap<String, String>) -> Result<Room, RoomError> {
    let field = |name: &str| {
        fields
            .get(name)
            .ok_or_else(|| RoomError::Store(format!("room {} is missing field {}", id, name)))
    };
    let millis = |name: &str| -> Result<i64, RoomError> {
        field(name)?
            .parse()
            .map_err(|_| RoomError::Store(format!("room {} has a bad {} value", id, name)))
    };

    let admin = Username::new(field("admin")?.as_str())
        .map_err(|e| RoomError::Store(e.to_string()))?;
    let expires_at = match fields.get("expires_at") {
        Some(_) => Some(Timestamp::from_unix_millis(millis("expires_at")?)),
        None => None,
    };

    Ok(Room {
        id: id.clone(),
        name: field("name")?.clone(),
        admin,
        created_at: Timestamp::from_unix_millis(millis("created_at")?),
        expires_at,
    })
}

fn room_to_fields(room: &Room) -> Vec<(&'static str, String)> {
    let mut fields = vec![
        ("name", room.name.clone()),
        ("admin", room.admin.to_string()),
        ("created_at", room.created_at.as_unix_millis().to_string()),
    ];
    if let Some(expires_at) = room.expires_at {
        fields.push(("expires_at", expires_at.as_unix_millis().to_string()));
    }
    fields
}

#[async_trait]
impl RoomRepository for RedisRoomRepository {
    async fn create(&self, room: Room) -> Result<Room, RoomError> {
        let mut conn = self.conn.clone();
        let key = self.metadata_key(&room.id);

        let created: bool = conn
            .hset_nx(&key, "name", room.name.as_str())
            .await
            .map_err(store_error)?;
        if !created {
            return Err(RoomError::AlreadyExists(room.id));
        }

        let fields = room_to_fields(&room);
        let mut pipe = redis::pipe();
        pipe.atomic()
            .hset_multiple(&key, fields.as_slice())
            .ignore()
            .sadd(self.index_key(), room.id.as_str())
            .ignore();
        if let Some(expires_at) = room.expires_at {
            let ttl_ms = (expires_at.as_unix_millis() - room.created_at.as_unix_millis()).max(1);
            pipe.pexpire(&key, ttl_ms).ignore();
        }
        pipe.query_async::<_, ()>(&mut conn)
            .await
            .map_err(store_error)?;

        tracing::info!(room_id = %room.id, admin = %room.admin, "Room created");
        Ok(room)
    }

    async fn delete(&self, id: &RoomId, requester: &Username) -> Result<(), RoomError> {
        let room = self
            .load(id)
            .await?
            .ok_or_else(|| RoomError::NotFound(id.clone()))?;
        if !room.is_admin(requester) {
            return Err(RoomError::Forbidden);
        }

        let mut conn = self.conn.clone();
        redis::pipe()
            .atomic()
            .del(self.metadata_key(id))
            .ignore()
            .srem(self.index_key(), id.as_str())
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(store_error)?;

        tracing::info!(room_id = %id, "Room deleted");
        Ok(())
    }

    async fn get(&self, id: &RoomId) -> Result<Option<Room>, RoomError> {
        self.load(id).await
    }

    async fn list(&self) -> Result<Vec<Room>, RoomError> {
        let mut conn = self.conn.clone();
        let ids: Vec<String> = conn
            .smembers(self.index_key())
            .await
            .map_err(store_error)?;

        let mut rooms = Vec::with_capacity(ids.len());
        for raw in ids {
            let Ok(id) = RoomId::new(raw.as_str()) else {
                continue;
            };
            match self.load(&id).await? {
                Some(room) => rooms.push(room),
                None => {
                    conn.srem::<_, _, ()>(self.index_key(), id.as_str())
                        .await
                        .map_err(store_error)?;
                }
            }
        }

        rooms.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(rooms)
    }
}
