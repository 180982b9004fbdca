//! Adapters - Implementations of port interfaces.
//!
//! - `auth` - Session validators (JWT, mock)
//! - `bus` - Message bus implementations (in-memory and Redis, pub/sub and log)
//! - `registry` - Room membership registries
//! - `rooms` - Room record repositories
//! - `http` - REST endpoints, error envelope, auth middleware
//! - `websocket` - Upgrade handler and connection pumps

pub mod auth;
pub mod bus;
pub mod http;
pub mod registry;
pub mod rooms;
pub mod websocket;
