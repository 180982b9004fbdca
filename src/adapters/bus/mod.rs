//! Message bus adapters.
//!
//! - `InMemoryPubSubBus` - tokio broadcast, single process
//! - `InMemoryLogBus` - bounded ring buffer with history, single process
//! - `RedisPubSubBus` - Redis PUBLISH/SUBSCRIBE
//! - `RedisStreamBus` - Redis Streams with bounded history

mod in_memory_log;
mod in_memory_pubsub;
mod redis_pubsub;
mod redis_stream;

pub use in_memory_log::InMemoryLogBus;
pub use in_memory_pubsub::InMemoryPubSubBus;
pub use redis_pubsub::RedisPubSubBus;
pub use redis_stream::RedisStreamBus;
