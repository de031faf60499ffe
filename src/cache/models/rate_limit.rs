use serde::{Deserialize, Serialize};

/// Persisted request counter for one rate limit window.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct CounterRecord {
    pub count: u32,
}
