//! Room Relay - real-time chat rooms over WebSockets.
//!
//! Clients join a room over `GET /ws`, and every event published to the room
//! is relayed to every member. Delivery runs either on fire-and-forget
//! pub/sub or on a bounded per-room log that replays recent history to new
//! members. Both are available in memory or on Redis.

pub mod adapters;
pub mod application;
pub mod bootstrap;
pub mod config;
pub mod domain;
pub mod ports;
