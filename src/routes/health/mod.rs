use axum::Json;
use serde_json::{Value, json};

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "connected",
        "message": "Worker is running",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
