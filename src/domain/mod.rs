//! Domain layer containing relay types and rules.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (value objects, IDs, errors)
//! - `chat` - Chat events and room records
//! - `session` - Room session lifecycle states

pub mod chat;
pub mod foundation;
pub mod session;
