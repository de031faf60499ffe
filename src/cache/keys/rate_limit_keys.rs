use std::fmt;

use crate::rate_limit::policy::{RouteClass, Tier};

/// Counter key prefix
const RATE_LIMIT_PREFIX: &str = "ratelimit";

/// Identifies one counter: a caller, its tier and route class, in one window.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey<'a> {
    pub route: RouteClass,
    pub tier: Tier,
    pub identifier: &'a str,
    pub window_start: i64,
}

impl<'a> RateLimitKey<'a> {
    pub fn new(route: RouteClass, tier: Tier, identifier: &'a str, window_start: i64) -> Self {
        Self {
            route,
            tier,
            identifier,
            window_start,
        }
    }
}

impl fmt::Display for RateLimitKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}:{}",
            RATE_LIMIT_PREFIX, self.route, self.tier, self.identifier, self.window_start
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_embeds_every_component() {
        let key = RateLimitKey::new(RouteClass::Llm, Tier::Paid, "user:42", 1_700_000_040);
        assert_eq!(key.to_string(), "ratelimit:llm:paid:user:42:1700000040");
    }

    #[test]
    fn distinct_components_never_share_a_key() {
        let base = RateLimitKey::new(RouteClass::General, Tier::Free, "ip:1.2.3.4", 0);
        let other_route = RateLimitKey { route: RouteClass::Llm, ..base.clone() };
        let other_tier = RateLimitKey { tier: Tier::Paid, ..base.clone() };
        let other_window = RateLimitKey { window_start: 60, ..base.clone() };
        let other_caller = RateLimitKey { identifier: "ip:1.2.3.5", ..base.clone() };
        for other in [other_route, other_tier, other_window, other_caller] {
            assert_ne!(base.to_string(), other.to_string());
        }
    }
}
