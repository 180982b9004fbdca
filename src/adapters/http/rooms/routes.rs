//! HTTP routes for room endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{create_room, delete_room, get_room, list_rooms, RoomHandlers};

/// Creates the room router. Expects `auth_middleware` to be layered on top.
pub fn room_routes(handlers: RoomHandlers) -> Router {
    Router::new()
        .route("/", post(create_room).get(list_rooms))
        .route("/:room_id", get(get_room).delete(delete_room))
        .with_state(handlers)
}
