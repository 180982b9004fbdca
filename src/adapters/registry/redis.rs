//! Redis-backed room registry for multi-node deployments.
//!
//! Key layout:
//! - `<prefix>:room:users:<room_id>` - SET of connected usernames
//! - `<prefix>:rooms:active` - SET of room ids with at least one member
//!
//! Counts are always `SCARD` of the member set. Join and leave each run as
//! one server-side step (MULTI/EXEC or a Lua script) so a concurrent leave
//! can never drop a room from the active index while it still has members.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use crate::domain::chat::RoomActivity;
use crate::domain::foundation::{RoomId, Username};
use crate::ports::{RegistryError, RoomRegistry};

const LEAVE_SCRIPT: &str = r"
local removed = redis.call('SREM', KEYS[1], ARGV[1])
if redis.call('SCARD', KEYS[1]) == 0 then
    redis.call('SREM', KEYS[2], ARGV[2])
end
return removed
";

fn store_error(e: redis::RedisError) -> RegistryError {
    RegistryError::Store(e.to_string())
}

/// Room registry backed by Redis sets.
#[derive(Clone)]
pub struct RedisRoomRegistry {
    conn: MultiplexedConnection,
    key_prefix: String,
    leave_script: redis::Script,
}

impl RedisRoomRegistry {
    pub fn new(conn: MultiplexedConnection, key_prefix: &str) -> Self {
        Self {
            conn,
            key_prefix: key_prefix.to_string(),
            leave_script: redis::Script::new(LEAVE_SCRIPT),
        }
    }

    fn members_key(&self, room: &RoomId) -> String {
        format!("{}:room:users:{}", self.key_prefix, room)
    }

    fn active_key(&self) -> String {
        format!("{}:rooms:active", self.key_prefix)
    }
}

#[async_trait]
impl RoomRegistry for RedisRoomRegistry {
    async fn join(&self, room: &RoomId, user: &Username) -> Result<usize, RegistryError> {
        let mut conn = self.conn.clone();
        let members_key = self.members_key(room);

        let (added, _, count): (i64, i64, usize) = redis::pipe()
            .atomic()
            .sadd(&members_key, user.as_str())
            .sadd(self.active_key(), room.as_str())
            .scard(&members_key)
            .query_async(&mut conn)
            .await
            .map_err(store_error)?;

        if added == 0 {
            return Err(RegistryError::AlreadyJoined {
                room: room.clone(),
                user: user.clone(),
            });
        }

        Ok(count)
    }

    async fn leave(&self, room: &RoomId, user: &Username) -> Result<bool, RegistryError> {
        let mut conn = self.conn.clone();

        let removed: i64 = self
            .leave_script
            .key(self.members_key(room))
            .key(self.active_key())
            .arg(user.as_str())
            .arg(room.as_str())
            .invoke_async(&mut conn)
            .await
            .map_err(store_error)?;

        Ok(removed == 1)
    }

    async fn members(&self, room: &RoomId) -> Result<Vec<Username>, RegistryError> {
        let mut conn = self.conn.clone();
        let raw: Vec<String> = conn
            .smembers(self.members_key(room))
            .await
            .map_err(store_error)?;

        let mut members: Vec<Username> = raw
            .into_iter()
            .filter_map(|name| match Username::new(name.as_str()) {
                Ok(user) => Some(user),
                Err(e) => {
                    tracing::warn!(room_id = %room, member = %name, error = %e, "Invalid member in registry");
                    None
                }
            })
            .collect();
        members.sort();
        Ok(members)
    }

    async fn active_count(&self, room: &RoomId) -> Result<usize, RegistryError> {
        let mut conn = self.conn.clone();
        conn.scard(self.members_key(room))
            .await
            .map_err(store_error)
    }

    async fn list_active(&self) -> Result<Vec<RoomActivity>, RegistryError> {
        let mut conn = self.conn.clone();
        let room_ids: Vec<String> = conn
            .smembers(self.active_key())
            .await
            .map_err(store_error)?;

        let mut active = Vec::with_capacity(room_ids.len());
        for raw in room_ids {
            let Ok(room_id) = RoomId::new(raw.as_str()) else {
                continue;
            };
            let active_count = self.active_count(&room_id).await?;
            if active_count > 0 {
                active.push(RoomActivity {
                    room_id,
                    active_count,
                });
            }
        }

        active.sort_by(|a, b| a.room_id.cmp(&b.room_id));
        Ok(active)
    }
}
