use std::env;
use std::time::Duration;

use crate::error::ConfigError;
use crate::rate_limit::limiter::{DEFAULT_STORE_TIMEOUT, DEFAULT_TTL_BUFFER_SECS, LimiterOptions};
use crate::rate_limit::policy::{LimitPolicy, LimitTable, RouteClass, Tier};

pub const DEFAULT_GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash-latest";

/// Environment variable holding the policy for each route class and tier.
const POLICY_VARS: [(RouteClass, Tier, &str, &str); 4] = [
    (RouteClass::General, Tier::Free, "RATE_LIMIT_GENERAL_FREE", "10/60"),
    (RouteClass::General, Tier::Paid, "RATE_LIMIT_GENERAL_PAID", "100/60"),
    (RouteClass::Llm, Tier::Free, "RATE_LIMIT_LLM_FREE", "3/60"),
    (RouteClass::Llm, Tier::Paid, "RATE_LIMIT_LLM_PAID", "20/60"),
];

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub redis_url: Option<String>,
    pub rate_limits: LimitTable,
    pub rate_limit_ttl_buffer_secs: u64,
    pub excluded_paths: Vec<String>,
    pub api_prefix: String,
    pub llm_prefix: String,
    pub store_timeout: Duration,
    pub identity_timeout: Duration,
    pub trust_proxy_headers: bool,
    pub jwt_secret: Option<String>,
    pub jwt_audience: Option<String>,
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub gemini_api_url: String,
    pub gemini_model: String,
    pub llm_timeout: Duration,
    pub worker_id: String,
}

impl Default for Config {
    fn default() -> Self {
        let mut rate_limits = LimitTable::new();
        for (route, tier, _, default) in POLICY_VARS {
            if let Ok(policy) = default.parse::<LimitPolicy>() {
                rate_limits.set(route, tier, policy);
            }
        }

        Config {
            server_host: "0.0.0.0".to_string(),
            server_port: 8787,
            redis_url: None,
            rate_limits,
            rate_limit_ttl_buffer_secs: DEFAULT_TTL_BUFFER_SECS,
            excluded_paths: vec!["/health".to_string(), "/api/health".to_string()],
            api_prefix: "/api/".to_string(),
            llm_prefix: "/api/llm/".to_string(),
            store_timeout: DEFAULT_STORE_TIMEOUT,
            identity_timeout: Duration::from_secs(3),
            trust_proxy_headers: true,
            jwt_secret: None,
            jwt_audience: None,
            supabase_url: None,
            supabase_anon_key: None,
            gemini_api_key: None,
            gemini_api_url: DEFAULT_GEMINI_API_URL.to_string(),
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            llm_timeout: Duration::from_secs(30),
            worker_id: "dev".to_string(),
        }
    }
}

impl Config {
    /// Load `.env`, then overlay environment variables on the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Config::default();

        if let Some(host) = var("SERVER_HOST") {
            config.server_host = host;
        }
        if let Some(port) = var("SERVER_PORT") {
            config.server_port = parse_env("SERVER_PORT", &port)?;
        }
        config.redis_url = var("REDIS_URL");

        for (route, tier, key, _) in POLICY_VARS {
            if let Some(raw) = var(key) {
                let policy = raw.parse::<LimitPolicy>().map_err(|e| ConfigError::Env {
                    key,
                    reason: e.to_string(),
                })?;
                config.rate_limits.set(route, tier, policy);
            }
        }
        config.rate_limits.validate()?;

        if let Some(buffer) = var("RATE_LIMIT_TTL_BUFFER_SECS") {
            config.rate_limit_ttl_buffer_secs = parse_env("RATE_LIMIT_TTL_BUFFER_SECS", &buffer)?;
        }
        if let Some(paths) = var("RATE_LIMIT_EXCLUDED_PATHS") {
            config.excluded_paths = paths
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(ms) = var("STORE_TIMEOUT_MS") {
            config.store_timeout = Duration::from_millis(parse_env("STORE_TIMEOUT_MS", &ms)?);
        }
        if let Some(ms) = var("IDENTITY_TIMEOUT_MS") {
            config.identity_timeout = Duration::from_millis(parse_env("IDENTITY_TIMEOUT_MS", &ms)?);
        }
        if let Some(ms) = var("LLM_TIMEOUT_MS") {
            config.llm_timeout = Duration::from_millis(parse_env("LLM_TIMEOUT_MS", &ms)?);
        }
        if let Some(trust) = var("TRUST_PROXY_HEADERS") {
            config.trust_proxy_headers = parse_env("TRUST_PROXY_HEADERS", &trust.to_lowercase())?;
        }

        config.jwt_secret = var("SUPABASE_JWT_SECRET");
        config.jwt_audience = var("JWT_AUDIENCE");
        config.supabase_url = var("SUPABASE_URL");
        config.supabase_anon_key = var("SUPABASE_ANON_KEY");
        config.gemini_api_key = var("GEMINI_API_KEY");
        if let Some(url) = var("GEMINI_API_URL") {
            config.gemini_api_url = url;
        }
        if let Some(model) = var("GEMINI_MODEL") {
            config.gemini_model = model;
        }
        if let Some(worker_id) = var("WORKER_ID") {
            config.worker_id = worker_id;
        }

        Ok(config)
    }

    pub fn limiter_options(&self) -> LimiterOptions {
        LimiterOptions {
            ttl_buffer_secs: self.rate_limit_ttl_buffer_secs,
            store_timeout: self.store_timeout,
        }
    }
}

fn parse_env<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e: T::Err| ConfigError::Env {
        key,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_cover_every_policy() {
        let config = load(&[]).unwrap();
        config.rate_limits.validate().unwrap();
        let general_free = config.rate_limits.get(RouteClass::General, Tier::Free).unwrap();
        assert_eq!(general_free, LimitPolicy { limit: 10, period_secs: 60 });
        let llm_paid = config.rate_limits.get(RouteClass::Llm, Tier::Paid).unwrap();
        assert_eq!(llm_paid.limit, 20);
        assert!(config.redis_url.is_none());
    }

    #[test]
    fn overrides_policies_from_environment() {
        let config = load(&[("RATE_LIMIT_LLM_FREE", "4/30"), ("RATE_LIMIT_GENERAL_PAID", "250")]).unwrap();
        assert_eq!(
            config.rate_limits.get(RouteClass::Llm, Tier::Free),
            Some(LimitPolicy { limit: 4, period_secs: 30 })
        );
        assert_eq!(
            config.rate_limits.get(RouteClass::General, Tier::Paid),
            Some(LimitPolicy { limit: 250, period_secs: 60 })
        );
    }

    #[test]
    fn malformed_policy_is_fatal() {
        let err = load(&[("RATE_LIMIT_LLM_PAID", "lots")]).unwrap_err();
        assert!(matches!(err, ConfigError::Env { key: "RATE_LIMIT_LLM_PAID", .. }));
        assert!(load(&[("RATE_LIMIT_GENERAL_FREE", "0/60")]).is_err());
    }

    #[test]
    fn reads_service_settings() {
        let config = load(&[
            ("SERVER_PORT", "9000"),
            ("REDIS_URL", "redis://127.0.0.1/"),
            ("RATE_LIMIT_EXCLUDED_PATHS", "/health, /status ,"),
            ("STORE_TIMEOUT_MS", "250"),
            ("TRUST_PROXY_HEADERS", "FALSE"),
            ("WORKER_ID", "edge-1"),
        ])
        .unwrap();
        assert_eq!(config.server_port, 9000);
        assert_eq!(config.redis_url.as_deref(), Some("redis://127.0.0.1/"));
        assert_eq!(config.excluded_paths, vec!["/health", "/status"]);
        assert_eq!(config.store_timeout, Duration::from_millis(250));
        assert!(!config.trust_proxy_headers);
        assert_eq!(config.worker_id, "edge-1");
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = load(&[("SERVER_PORT", "  "), ("GEMINI_API_KEY", "")]).unwrap();
        assert_eq!(config.server_port, 8787);
        assert!(config.gemini_api_key.is_none());
    }

    #[test]
    fn bad_port_is_reported_with_its_key() {
        let err = load(&[("SERVER_PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().contains("SERVER_PORT"));
    }
}
