//! Fixed-window admission decisions.
//!
//! Windows are aligned to epoch multiples of the policy period, so every
//! request in the same window addresses the same counter key. A request is
//! checked before it is counted: denied requests never increment.
//!
//! The check and the increment are one atomic store operation, so concurrent
//! requests on the same key never admit more than the limit. When the store
//! fails or times out the request is admitted.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::{CounterStore, RateLimitKey};
use crate::error::{CacheError, ConfigError};
use crate::rate_limit::policy::{LimitPolicy, LimitTable, RouteClass, Tier};
use crate::rate_limit::window::{Clock, SystemClock, Window};

/// Extra seconds a counter outlives its window, to absorb clock skew between nodes.
pub const DEFAULT_TTL_BUFFER_SECS: u64 = 10;

/// Default bound on each counter-store call.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(2);

/// Outcome of one admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: i64,
    pub retry_after_secs: u64,
}

impl Verdict {
    fn allowed(policy: LimitPolicy, window: Window, count: u32) -> Self {
        Self {
            allowed: true,
            limit: policy.limit,
            remaining: policy.limit.saturating_sub(count),
            reset_at: window.reset_at(),
            retry_after_secs: 0,
        }
    }

    fn denied(policy: LimitPolicy, window: Window, now: i64) -> Self {
        Self {
            allowed: false,
            limit: policy.limit,
            remaining: 0,
            reset_at: window.reset_at(),
            retry_after_secs: window.retry_after(now),
        }
    }

    fn fail_open(policy: LimitPolicy, window: Window) -> Self {
        Self::allowed(policy, window, 1)
    }
}

/// Tunables for the limiter besides the policy table.
#[derive(Debug, Clone, Copy)]
pub struct LimiterOptions {
    pub ttl_buffer_secs: u64,
    pub store_timeout: Duration,
}

impl Default for LimiterOptions {
    fn default() -> Self {
        Self {
            ttl_buffer_secs: DEFAULT_TTL_BUFFER_SECS,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }
}

/// Decides whether a caller may proceed on a route class.
#[derive(Clone)]
pub struct RateLimiter {
    policies: [LimitPolicy; 4],
    store: Arc<dyn CounterStore>,
    clock: Arc<dyn Clock>,
    options: LimiterOptions,
}

impl RateLimiter {
    /// Build a limiter. Fails unless every route class and tier has a policy.
    pub fn new(
        policies: LimitTable,
        store: Arc<dyn CounterStore>,
        options: LimiterOptions,
    ) -> Result<Self, ConfigError> {
        let mut resolved = [LimitPolicy { limit: 0, period_secs: 0 }; 4];
        for route in RouteClass::ALL {
            for tier in Tier::ALL {
                let policy = policies
                    .get(route, tier)
                    .ok_or(ConfigError::MissingPolicy { route, tier })?;
                resolved[slot(route, tier)] = policy;
            }
        }
        Ok(Self {
            policies: resolved,
            store,
            clock: Arc::new(SystemClock),
            options,
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    /// Policy for a route class and tier.
    pub fn policy(&self, route: RouteClass, tier: Tier) -> LimitPolicy {
        self.policies[slot(route, tier)]
    }

    /// Check and count one request at the current time.
    pub async fn check(&self, identifier: &str, tier: Tier, route: RouteClass) -> Verdict {
        self.check_at(identifier, tier, route, self.now()).await
    }

    /// Check and count one request at `now` (epoch seconds).
    pub async fn check_at(
        &self,
        identifier: &str,
        tier: Tier,
        route: RouteClass,
        now: i64,
    ) -> Verdict {
        let policy = self.policy(route, tier);
        let window = Window::containing(now, policy.period());
        let key = RateLimitKey::new(route, tier, identifier, window.start).to_string();

        let ttl = policy.period_secs.saturating_add(self.options.ttl_buffer_secs);

        match self
            .bounded(self.store.try_increment(&key, policy.limit, ttl))
            .await
        {
            Ok(Some(record)) => Verdict::allowed(policy, window, record.count),
            Ok(None) => {
                debug!(key = %key, limit = policy.limit, "rate limit exceeded");
                Verdict::denied(policy, window, now)
            }
            Err(err) => {
                warn!(error = %err, key = %key, "rate limit update failed, allowing request");
                Verdict::fail_open(policy, window)
            }
        }
    }

    /// Report quota state without counting a request.
    pub async fn status(&self, identifier: &str, tier: Tier, route: RouteClass) -> Verdict {
        self.status_at(identifier, tier, route, self.now()).await
    }

    pub async fn status_at(
        &self,
        identifier: &str,
        tier: Tier,
        route: RouteClass,
        now: i64,
    ) -> Verdict {
        let policy = self.policy(route, tier);
        let window = Window::containing(now, policy.period());
        let key = RateLimitKey::new(route, tier, identifier, window.start).to_string();

        match self.bounded(self.store.get(&key)).await {
            Ok(record) => {
                let count = record.map(|r| r.count).unwrap_or(0);
                if count >= policy.limit {
                    Verdict::denied(policy, window, now)
                } else {
                    Verdict::allowed(policy, window, count)
                }
            }
            Err(err) => {
                warn!(error = %err, key = %key, "rate limit status read failed");
                Verdict::allowed(policy, window, 0)
            }
        }
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, CacheError>>,
    ) -> Result<T, CacheError> {
        let limit = self.options.store_timeout;
        tokio::time::timeout(limit, call)
            .await
            .map_err(|_| CacheError::Timeout(limit))?
    }
}

fn slot(route: RouteClass, tier: Tier) -> usize {
    let route = match route {
        RouteClass::Llm => 0,
        RouteClass::General => 1,
    };
    let tier = match tier {
        Tier::Free => 0,
        Tier::Paid => 1,
    };
    route * 2 + tier
}
