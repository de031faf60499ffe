mod auth;
mod error_handler;
pub mod rate_limit;

pub use auth::require_user;
pub use error_handler::log_errors;
pub use rate_limit::{apply_rate_limit_headers, classify, rate_limit, too_many_requests};
