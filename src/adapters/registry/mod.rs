//! Room registry adapters.

mod in_memory;
mod redis;

pub use in_memory::InMemoryRoomRegistry;
pub use redis::RedisRoomRegistry;
