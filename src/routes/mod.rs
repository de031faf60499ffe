//! HTTP handlers for the console API.

pub mod health;
pub mod llm;
pub mod protected;
pub mod rate_limits;
pub mod tier_test;
pub mod user;

use axum::{
    Json, Router,
    http::{StatusCode, Uri},
    middleware,
    routing::{get, post},
};
use serde_json::json;

use crate::AppState;
use crate::middleware::require_user;

/// All console routes, without the cross-cutting layers.
pub fn router(state: AppState) -> Router<AppState> {
    let protected_routes = Router::new()
        .route("/api/protected-data", get(protected::protected_data))
        .route_layer(middleware::from_fn_with_state(state, require_user));

    Router::new()
        .route("/health", get(health::health))
        .route("/api/health", get(health::health))
        .route("/api/users", get(user::list_users))
        .route("/api/test", post(tier_test::tier_test))
        .route("/api/rate-limits", get(rate_limits::rate_limits))
        .route("/api/llm/gemini", post(llm::gemini))
        .merge(protected_routes)
        .fallback(not_found)
}

async fn not_found(uri: Uri) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "status": "error",
            "message": "Not Found",
            "path": uri.path(),
        })),
    )
}
