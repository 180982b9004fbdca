//! Application layer - connection lifecycle coordination.
//!
//! - `RoomSession` / `ActiveSession` - one connection's participation in a room
//! - `RelayError` - admission and connection failure taxonomy

mod error;
mod room_session;

pub use error::RelayError;
pub use room_session::{
    ActiveSession, Connection, ConnectionStats, RelayServices, RoomSession,
};
