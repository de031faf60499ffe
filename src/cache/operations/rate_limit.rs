use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{AsyncCommands, Client as RedisClient, Script};
use tokio::sync::OnceCell;

use crate::cache::models::rate_limit::CounterRecord;
use crate::error::CacheError;

/// Longest expiry the memory store will schedule.
const MAX_MEMORY_TTL: Duration = Duration::from_secs(86_400);

/// Bound on establishing the shared Redis connection.
const REDIS_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Increments KEYS[1] unless it already reached ARGV[1]. Returns the new
/// count, or -1 when the limit was reached. The expiry (ARGV[2]) is set when
/// the counter is created.
const INCREMENT_BELOW_LIMIT: &str = r"
local count = tonumber(redis.call('GET', KEYS[1]) or '0')
if count >= tonumber(ARGV[1]) then
    return -1
end
count = redis.call('INCR', KEYS[1])
if count == 1 then
    redis.call('EXPIRE', KEYS[1], ARGV[2])
end
return count
";

/// Key-value store holding rate limit counters with per-key expiry.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Read the counter for `key`. Expired or missing counters are `None`.
    async fn get(&self, key: &str) -> Result<Option<CounterRecord>, CacheError>;

    /// Atomically add one to the counter for `key` unless it already reached
    /// `limit`. Returns the updated record, or `None` when the limit was
    /// reached and nothing was written. A new counter expires after `ttl_secs`.
    async fn try_increment(
        &self,
        key: &str,
        limit: u32,
        ttl_secs: u64,
    ) -> Result<Option<CounterRecord>, CacheError>;
}

/// Counters stored in Redis as plain integers.
///
/// One managed connection is opened on first use and shared by every call.
#[derive(Clone)]
pub struct RedisCounterStore {
    client: RedisClient,
    conn: Arc<OnceCell<ConnectionManager>>,
    increment: Script,
}

impl RedisCounterStore {
    pub fn new(client: RedisClient) -> Self {
        Self {
            client,
            conn: Arc::new(OnceCell::new()),
            increment: Script::new(INCREMENT_BELOW_LIMIT),
        }
    }

    /// Parse the URL. Does not connect.
    pub fn open(url: &str) -> Result<Self, CacheError> {
        Ok(Self::new(RedisClient::open(url)?))
    }

    async fn connection(&self) -> Result<ConnectionManager, CacheError> {
        let conn = self
            .conn
            .get_or_try_init(|| async {
                let config = ConnectionManagerConfig::new()
                    .set_number_of_retries(1)
                    .set_connection_timeout(REDIS_CONNECT_TIMEOUT);
                ConnectionManager::new_with_config(self.client.clone(), config).await
            })
            .await?;
        Ok(conn.clone())
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn get(&self, key: &str) -> Result<Option<CounterRecord>, CacheError> {
        let mut conn = self.connection().await?;
        let count: Option<u32> = conn.get(key).await?;
        Ok(count.map(|count| CounterRecord { count }))
    }

    async fn try_increment(
        &self,
        key: &str,
        limit: u32,
        ttl_secs: u64,
    ) -> Result<Option<CounterRecord>, CacheError> {
        let mut conn = self.connection().await?;
        let count: i64 = self
            .increment
            .key(key)
            .arg(limit)
            .arg(ttl_secs.max(1))
            .invoke_async(&mut conn)
            .await?;
        Ok(u32::try_from(count).ok().map(|count| CounterRecord { count }))
    }
}

/// Single-process counter store.
#[derive(Debug, Clone, Default)]
pub struct MemoryCounterStore {
    entries: Arc<Mutex<HashMap<String, (CounterRecord, Instant)>>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live counters.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.values().filter(|(_, expires)| *expires > now).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn expires_at(now: Instant, ttl_secs: u64) -> Instant {
    now + Duration::from_secs(ttl_secs).min(MAX_MEMORY_TTL)
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn get(&self, key: &str) -> Result<Option<CounterRecord>, CacheError> {
        let now = Instant::now();
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries
            .get(key)
            .filter(|(_, expires)| *expires > now)
            .map(|(record, _)| *record))
    }

    async fn try_increment(
        &self,
        key: &str,
        limit: u32,
        ttl_secs: u64,
    ) -> Result<Option<CounterRecord>, CacheError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|_, (_, expires)| *expires > now);

        match entries.get_mut(key) {
            Some((record, _)) if record.count >= limit => Ok(None),
            Some((record, _)) => {
                record.count += 1;
                Ok(Some(*record))
            }
            None if limit == 0 => Ok(None),
            None => {
                let record = CounterRecord { count: 1 };
                entries.insert(key.to_string(), (record, expires_at(now, ttl_secs)));
                Ok(Some(record))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_counts_up_to_the_limit() {
        let store = MemoryCounterStore::new();
        assert_eq!(store.get("k").await.unwrap(), None);

        for expected in 1..=3 {
            let record = store.try_increment("k", 3, 60).await.unwrap();
            assert_eq!(record, Some(CounterRecord { count: expected }));
        }
        assert_eq!(store.try_increment("k", 3, 60).await.unwrap(), None);
        assert_eq!(store.get("k").await.unwrap(), Some(CounterRecord { count: 3 }));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn memory_store_expires_records() {
        let store = MemoryCounterStore::new();
        store.try_increment("gone", 5, 0).await.unwrap();
        assert_eq!(store.get("gone").await.unwrap(), None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn memory_store_purges_expired_on_write() {
        let store = MemoryCounterStore::new();
        store.try_increment("old", 5, 0).await.unwrap();
        store.try_increment("new", 5, 60).await.unwrap();
        let entries = store.entries.lock().unwrap();
        assert!(!entries.contains_key("old"));
        assert!(entries.contains_key("new"));
    }

    #[tokio::test]
    async fn memory_store_tolerates_huge_ttls() {
        let store = MemoryCounterStore::new();
        let record = store.try_increment("k", 5, u64::MAX).await.unwrap();
        assert_eq!(record, Some(CounterRecord { count: 1 }));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_increments_never_pass_the_limit() {
        let store = MemoryCounterStore::new();
        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..20 {
            let store = store.clone();
            tasks.spawn(async move { store.try_increment("shared", 5, 60).await.unwrap() });
        }
        let mut admitted = 0;
        while let Some(result) = tasks.join_next().await {
            if result.unwrap().is_some() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 5);
        assert_eq!(store.get("shared").await.unwrap(), Some(CounterRecord { count: 5 }));
    }

    #[test]
    fn redis_store_connects_lazily() {
        assert!(RedisCounterStore::open("redis://127.0.0.1:1/").is_ok());
        assert!(RedisCounterStore::open("not a url").is_err());
    }

    #[tokio::test]
    async fn unreachable_redis_is_an_error_not_a_panic() {
        let store = RedisCounterStore::open("redis://127.0.0.1:1/").unwrap();
        let result = tokio::time::timeout(Duration::from_secs(10), store.get("k")).await;
        if let Ok(result) = result {
            assert!(result.is_err());
        }
    }
}
