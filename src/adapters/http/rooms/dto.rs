//! Request and response bodies for room endpoints.

use serde::{Deserialize, Serialize};

use crate::domain::chat::Room;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRoomRequest {
    pub room_name: String,
}

/// A room as returned by the API. Timestamps are unix milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoomResponse {
    pub room_id: String,
    pub room_name: String,
    pub admin: String,
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

impl From<&Room> for RoomResponse {
    fn from(room: &Room) -> Self {
        Self {
            room_id: room.id.to_string(),
            room_name: room.name.clone(),
            admin: room.admin.to_string(),
            created_at: room.created_at.as_unix_millis(),
            expires_at: room.expires_at.map(|t| t.as_unix_millis()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoomSummary {
    #[serde(flatten)]
    pub room: RoomResponse,
    pub active_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoomListResponse {
    pub rooms: Vec<RoomSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoomDetailResponse {
    #[serde(flatten)]
    pub room: RoomResponse,
    pub members: Vec<String>,
    pub active_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::Username;

    #[test]
    fn summary_flattens_room_fields() {
        let room = Room::new("Lobby", Username::new("admin").unwrap(), None).unwrap();
        let summary = RoomSummary {
            room: RoomResponse::from(&room),
            active_count: 2,
        };

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["room_id"], "lobby");
        assert_eq!(json["room_name"], "Lobby");
        assert_eq!(json["active_count"], 2);
        assert!(json.get("expires_at").is_none());
    }
}
