//! Session module - lifecycle of a connection's participation in a room.

mod status;

pub use status::SessionStatus;
