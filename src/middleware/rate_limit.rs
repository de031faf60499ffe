use std::net::SocketAddr;

use axum::{
    Json,
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, HeaderName, HeaderValue, Method, Request, StatusCode, header::RETRY_AFTER},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::info;

use crate::AppState;
use crate::config::Config;
use crate::rate_limit::{RouteClass, Verdict};

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Route class a request is limited under, or `None` when it bypasses limiting.
pub fn classify(config: &Config, method: &Method, path: &str) -> Option<RouteClass> {
    if method == Method::OPTIONS {
        return None;
    }
    if config.excluded_paths.iter().any(|excluded| excluded == path) {
        return None;
    }
    if path.starts_with(&config.llm_prefix) {
        Some(RouteClass::Llm)
    } else if path.starts_with(&config.api_prefix) {
        Some(RouteClass::General)
    } else {
        None
    }
}

/// Write the quota headers for a verdict.
pub fn apply_rate_limit_headers(headers: &mut HeaderMap, verdict: &Verdict) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(verdict.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(verdict.remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(verdict.reset_at));
    if !verdict.allowed {
        headers.insert(RETRY_AFTER, HeaderValue::from(verdict.retry_after_secs));
    }
}

/// 429 response for a denied verdict.
pub fn too_many_requests(route: RouteClass, verdict: &Verdict) -> Response {
    let body = json!({
        "error": "Too Many Requests",
        "message": format!(
            "Rate limit exceeded for {}. Try again in {} seconds.",
            route, verdict.retry_after_secs
        ),
        "limit": verdict.limit,
        "remaining": 0,
        "retryAfter": verdict.retry_after_secs,
        "resetAt": verdict.reset_at,
    });
    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    apply_rate_limit_headers(response.headers_mut(), verdict);
    response
}

/// Admission control in front of the API routes.
///
/// Each request is checked once. Denied requests are answered here with 429;
/// admitted ones carry the caller identity and verdict in their extensions
/// and get quota headers on the way out.
pub async fn rate_limit(State(state): State<AppState>, mut req: Request<Body>, next: Next) -> Response {
    let Some(route) = classify(&state.config, req.method(), req.uri().path()) else {
        return next.run(req).await;
    };

    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip());
    let identity = state.identity.resolve(req.headers(), peer).await;
    let verdict = state
        .limiter
        .check(&identity.identifier, identity.tier, route)
        .await;

    if !verdict.allowed {
        info!(
            identifier = %identity.identifier,
            tier = %identity.tier,
            route = %route,
            retry_after = verdict.retry_after_secs,
            "request rejected by rate limiter"
        );
        return too_many_requests(route, &verdict);
    }

    req.extensions_mut().insert(identity);
    req.extensions_mut().insert(verdict);

    let mut response = next.run(req).await;
    apply_rate_limit_headers(response.headers_mut(), &verdict);
    response
}
