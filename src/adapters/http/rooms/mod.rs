//! Room management endpoints.

pub mod dto;
mod handlers;
mod routes;

pub use handlers::RoomHandlers;
pub use routes::room_routes;
