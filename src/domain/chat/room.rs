//! Room records and activity snapshots.

use serde::Serialize;

use crate::domain::foundation::{RoomId, Timestamp, Username, ValidationError};

/// Maximum length of a room display name.
pub const MAX_ROOM_NAME_LEN: usize = 64;

/// A persisted chat room.
///
/// Rooms are created by an admin and expire after the configured retention
/// window unless `expires_at` is `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub admin: Username,
    pub created_at: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<Timestamp>,
}

impl Room {
    /// Creates a new room owned by `admin`, deriving the id from `name`.
    pub fn new(
        name: impl Into<String>,
        admin: Username,
        retention_secs: Option<u64>,
    ) -> Result<Self, ValidationError> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(ValidationError::empty_field("room_name"));
        }
        if name.chars().count() > MAX_ROOM_NAME_LEN {
            return Err(ValidationError::invalid_format(
                "room_name",
                format!("must be at most {} characters", MAX_ROOM_NAME_LEN),
            ));
        }

        let id = RoomId::from_name(&name)?;
        let created_at = Timestamp::now();
        let expires_at = retention_secs.map(|secs| created_at.plus_secs(secs));

        Ok(Self {
            id,
            name,
            admin,
            created_at,
            expires_at,
        })
    }

    /// Returns true once the retention window has elapsed.
    pub fn is_expired(&self, now: &Timestamp) -> bool {
        self.expires_at
            .as_ref()
            .map(|expires_at| !now.is_before(expires_at))
            .unwrap_or(false)
    }

    /// Returns true if `user` administers this room.
    pub fn is_admin(&self, user: &Username) -> bool {
        &self.admin == user
    }
}

/// Number of open connections in a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomActivity {
    pub room_id: RoomId,
    pub active_count: usize,
}
