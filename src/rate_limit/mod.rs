//! Request rate limiting: window arithmetic, quota policies, caller identity
//! and the admit/deny decision.

pub mod identity;
pub mod limiter;
pub mod policy;
pub mod window;

pub use identity::{AuthType, ClientIdentity, IdentityResolver};
pub use limiter::{LimiterOptions, RateLimiter, Verdict};
pub use policy::{LimitPolicy, LimitTable, RouteClass, Tier};
pub use window::{Clock, ManualClock, SystemClock, Window, window_start};
