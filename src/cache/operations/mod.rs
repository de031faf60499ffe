/// Cache operations

pub mod rate_limit;

pub use rate_limit::{CounterStore, MemoryCounterStore, RedisCounterStore};
