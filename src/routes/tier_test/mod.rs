use axum::{Json, body::Bytes, http::Extensions};
use serde_json::{Value, json};

use crate::rate_limit::{ClientIdentity, Verdict};

/// Echo endpoint for exercising tiered limits from the console.
pub async fn tier_test(extensions: Extensions, body: Bytes) -> Json<Value> {
    let identity = extensions.get::<ClientIdentity>();
    let verdict = extensions.get::<Verdict>();
    let received: Value = serde_json::from_slice(&body).unwrap_or_else(|_| json!({}));

    Json(json!({
        "message": "Request to /api/test successful",
        "received_body": received,
        "tier": identity.map(|i| i.tier),
        "limit_for_tier": verdict.map(|v| v.limit),
        "remaining": verdict.map(|v| v.remaining),
    }))
}
