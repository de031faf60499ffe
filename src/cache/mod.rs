//! Counter storage for rate limiting: key layout, record model and store backends.

pub mod keys;
pub mod models;
pub mod operations;

pub use keys::RateLimitKey;
pub use models::CounterRecord;
pub use operations::{CounterStore, MemoryCounterStore, RedisCounterStore};
