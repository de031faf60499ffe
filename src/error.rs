use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::rate_limit::policy::{RouteClass, Tier};

/// Startup configuration problems. Always fatal.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid rate limit configuration: {0}")]
    Invalid(String),
    #[error("no rate limit policy configured for {route}/{tier}")]
    MissingPolicy { route: RouteClass, tier: Tier },
    #[error("invalid value for {key}: {reason}")]
    Env { key: &'static str, reason: String },
}

/// Counter store failures.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("counter store call timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Identity provider failures.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("invalid token: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("identity provider request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("identity provider rejected token with status {0}")]
    Rejected(u16),
    #[error("identity provider returned no user")]
    NoUser,
    #[error("identity provider timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("no identity provider configured")]
    NotConfigured,
}

/// Upstream LLM failures.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// Transport failure. Built without the request URL.
    #[error("LLM request failed: {0}")]
    Http(reqwest::Error),
    #[error("LLM API request failed with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to parse LLM response: no candidate text found")]
    EmptyResponse,
}

/// Anything that stops the service from starting.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("counter store unavailable: {0}")]
    Cache(#[from] CacheError),
    #[error("identity provider setup failed: {0}")]
    Verify(#[from] VerifyError),
    #[error("LLM client setup failed: {0}")]
    Llm(#[from] LlmError),
}

/// Handler-level errors rendered as JSON responses.
#[derive(Debug)]
pub enum AppError {
    Unauthorized(String),
    BadRequest(&'static str),
    NotConfigured(&'static str),
    Upstream(LlmError),
    InternalServerError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::Unauthorized(reason) => (
                StatusCode::UNAUTHORIZED,
                json!({ "error": "Unauthorized", "reason": reason }),
            ),
            AppError::BadRequest(message) => (StatusCode::BAD_REQUEST, json!({ "error": message })),
            AppError::NotConfigured(message) => {
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": message }))
            }
            AppError::Upstream(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({
                    "error": "Failed to get response from LLM",
                    "details": err.to_string(),
                }),
            ),
            AppError::InternalServerError(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({
                    "status": "error",
                    "message": "Internal Server Error",
                    "error": err,
                }),
            ),
        };

        (status, Json(body)).into_response()
    }
}
