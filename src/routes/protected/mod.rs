use axum::{Extension, Json};
use serde_json::{Value, json};

use crate::infrastructure::auth::VerifiedUser;

/// Only reachable through `require_user`.
pub async fn protected_data(Extension(user): Extension<VerifiedUser>) -> Json<Value> {
    Json(json!({
        "message": "This is protected data!",
        "user": { "id": user.user_id },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
