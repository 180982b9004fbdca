//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the relay core and the outside world. Adapters implement these ports.
//!
//! - `MessageBus` / `BusSubscription` - event distribution (pub/sub or bounded log)
//! - `RoomRegistry` - active members per room
//! - `RoomRepository` - persisted room records
//! - `SessionValidator` - token validation

mod message_bus;
mod room_registry;
mod room_repository;
mod session_validator;

pub use message_bus::{BusCapabilities, BusError, BusSubscription, MessageBus};
pub use room_registry::{RegistryError, RoomRegistry};
pub use room_repository::{RoomError, RoomRepository};
pub use session_validator::SessionValidator;
