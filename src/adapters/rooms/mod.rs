//! Room repository adapters.

mod in_memory;
mod redis;

pub use in_memory::InMemoryRoomRepository;
pub use redis::RedisRoomRepository;
