/// Cache key builders

pub mod rate_limit_keys;

pub use rate_limit_keys::RateLimitKey;
