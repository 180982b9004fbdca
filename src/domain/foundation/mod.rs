//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers and error types that form the
//! vocabulary of the relay domain.

mod auth;
mod errors;
mod ids;
mod state_machine;
mod timestamp;

pub use auth::{AuthError, AuthenticatedUser};
pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{ConnectionId, RoomId, Username, MAX_ROOM_ID_LEN, MAX_USERNAME_LEN};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
