//! HTTP adapters - REST endpoints and shared HTTP plumbing.

pub mod error;
pub mod health;
pub mod middleware;
pub mod rooms;

pub use error::{ApiError, ErrorResponse};
pub use health::health_routes;
pub use rooms::{room_routes, RoomHandlers};
