use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::ConfigError;

/// Period applied when a policy string omits one.
pub const DEFAULT_PERIOD_SECS: u64 = 60;

/// Longest window a policy may use: one day.
pub const MAX_PERIOD_SECS: u64 = 86_400;

/// Independently limited group of endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteClass {
    Llm,
    General,
}

impl RouteClass {
    pub const ALL: [RouteClass; 2] = [RouteClass::Llm, RouteClass::General];

    pub fn as_str(&self) -> &'static str {
        match self {
            RouteClass::Llm => "llm",
            RouteClass::General => "general",
        }
    }
}

impl fmt::Display for RouteClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller classification selecting which quota applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Free,
    Paid,
}

impl Tier {
    pub const ALL: [Tier; 2] = [Tier::Free, Tier::Paid];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Paid => "paid",
        }
    }

    /// Read a tier signal. Anything other than `paid` is the free tier.
    pub fn from_signal(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("paid") => Tier::Paid,
            _ => Tier::Free,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requests allowed per period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitPolicy {
    pub limit: u32,
    pub period_secs: u64,
}

impl LimitPolicy {
    pub fn new(limit: u32, period_secs: u64) -> Result<Self, ConfigError> {
        if limit == 0 {
            return Err(ConfigError::Invalid(format!("limit must be positive, got {limit}")));
        }
        if period_secs == 0 {
            return Err(ConfigError::Invalid("period must be positive".to_string()));
        }
        if period_secs > MAX_PERIOD_SECS {
            return Err(ConfigError::Invalid(format!(
                "period must be at most {MAX_PERIOD_SECS}s, got {period_secs}"
            )));
        }
        Ok(Self { limit, period_secs })
    }

    pub fn period(&self) -> i64 {
        self.period_secs as i64
    }
}

impl FromStr for LimitPolicy {
    type Err = ConfigError;

    /// Parses `limit/period_secs`, or a bare `limit` with the default period.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (limit, period) = match s.trim().split_once('/') {
            Some((limit, period)) => (limit.trim(), Some(period.trim())),
            None => (s.trim(), None),
        };
        let limit = limit
            .parse::<u32>()
            .map_err(|e| ConfigError::Invalid(format!("bad limit in {s:?}: {e}")))?;
        let period_secs = match period {
            Some(p) => p
                .parse::<u64>()
                .map_err(|e| ConfigError::Invalid(format!("bad period in {s:?}: {e}")))?,
            None => DEFAULT_PERIOD_SECS,
        };
        LimitPolicy::new(limit, period_secs)
    }
}

/// Policies keyed by route class and tier.
#[derive(Debug, Clone, Default)]
pub struct LimitTable {
    entries: HashMap<(RouteClass, Tier), LimitPolicy>,
}

impl LimitTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, route: RouteClass, tier: Tier, policy: LimitPolicy) -> &mut Self {
        self.entries.insert((route, tier), policy);
        self
    }

    pub fn with(mut self, route: RouteClass, tier: Tier, policy: LimitPolicy) -> Self {
        self.set(route, tier, policy);
        self
    }

    pub fn get(&self, route: RouteClass, tier: Tier) -> Option<LimitPolicy> {
        self.entries.get(&(route, tier)).copied()
    }

    pub fn remove(&mut self, route: RouteClass, tier: Tier) -> Option<LimitPolicy> {
        self.entries.remove(&(route, tier))
    }

    /// Fail unless every route class and tier combination has a policy.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for route in RouteClass::ALL {
            for tier in Tier::ALL {
                if self.get(route, tier).is_none() {
                    return Err(ConfigError::MissingPolicy { route, tier });
                }
            }
        }
        Ok(())
    }
}
