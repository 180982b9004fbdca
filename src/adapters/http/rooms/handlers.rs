//! HTTP handlers for room endpoints.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::adapters::http::error::ApiError;
use crate::adapters::http::middleware::RequireAuth;
use crate::application::RelayError;
use crate::domain::chat::Room;
use crate::domain::foundation::RoomId;
use crate::ports::{RoomRegistry, RoomRepository};

use super::dto::{CreateRoomRequest, RoomDetailResponse, RoomListResponse, RoomResponse, RoomSummary};

// ════════════════════════════════════════════════════════════════════════════
// Handler state
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone)]
pub struct RoomHandlers {
    rooms: Arc<dyn RoomRepository>,
    registry: Arc<dyn RoomRegistry>,
    retention_secs: Option<u64>,
}

impl RoomHandlers {
    pub fn new(
        rooms: Arc<dyn RoomRepository>,
        registry: Arc<dyn RoomRegistry>,
        retention_secs: Option<u64>,
    ) -> Self {
        Self {
            rooms,
            registry,
            retention_secs,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// HTTP handlers
// ════════════════════════════════════════════════════════════════════════════

/// POST /rooms - Create a room administered by the caller
pub async fn create_room(
    State(handlers): State<RoomHandlers>,
    RequireAuth(user): RequireAuth,
    Json(req): Json<CreateRoomRequest>,
) -> Result<Response, ApiError> {
    let room = Room::new(req.room_name, user.username, handlers.retention_secs)
        .map_err(RelayError::from)?;
    let room = handlers.rooms.create(room).await?;

    tracing::info!(room_id = %room.id, admin = %room.admin, "Room created");
    Ok((StatusCode::CREATED, Json(RoomResponse::from(&room))).into_response())
}

/// GET /rooms - List rooms with their active connection counts
pub async fn list_rooms(
    State(handlers): State<RoomHandlers>,
    RequireAuth(_user): RequireAuth,
) -> Result<Json<RoomListResponse>, ApiError> {
    let rooms = handlers.rooms.list().await?;
    let counts: HashMap<RoomId, usize> = handlers
        .registry
        .list_active()
        .await
        .map_err(RelayError::from)?
        .into_iter()
        .map(|activity| (activity.room_id, activity.active_count))
        .collect();

    let rooms = rooms
        .iter()
        .map(|room| RoomSummary {
            room: RoomResponse::from(room),
            active_count: counts.get(&room.id).copied().unwrap_or(0),
        })
        .collect();

    Ok(Json(RoomListResponse { rooms }))
}

/// GET /rooms/:room_id - Room with its connected members
pub async fn get_room(
    State(handlers): State<RoomHandlers>,
    RequireAuth(_user): RequireAuth,
    Path(room_id): Path<String>,
) -> Result<Json<RoomDetailResponse>, ApiError> {
    let room_id = RoomId::new(room_id).map_err(RelayError::from)?;
    let room = handlers
        .rooms
        .get(&room_id)
        .await?
        .ok_or_else(|| RelayError::RoomNotFound(room_id.clone()))?;
    let members = handlers
        .registry
        .members(&room_id)
        .await
        .map_err(RelayError::from)?;

    Ok(Json(RoomDetailResponse {
        room: RoomResponse::from(&room),
        active_count: members.len(),
        members: members.into_iter().map(String::from).collect(),
    }))
}

/// DELETE /rooms/:room_id - Delete a room (admin only)
pub async fn delete_room(
    State(handlers): State<RoomHandlers>,
    RequireAuth(user): RequireAuth,
    Path(room_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let room_id = RoomId::new(room_id).map_err(RelayError::from)?;
    handlers.rooms.delete(&room_id, &user.username).await?;

    tracing::info!(room_id = %room_id, admin = %user.username, "Room deleted");
    Ok(StatusCode::NO_CONTENT)
}
