use axum::{
    Json,
    extract::State,
    http::HeaderMap,
};

use crate::AppState;

use super::model::{UsersResponse, mock_users};

pub async fn list_users(State(state): State<AppState>, headers: HeaderMap) -> Json<UsersResponse> {
    let cf_ray = headers
        .get("cf-ray")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("dev")
        .to_string();

    Json(UsersResponse {
        users: mock_users(),
        cf_ray,
        worker_id: state.config.worker_id.clone(),
    })
}
