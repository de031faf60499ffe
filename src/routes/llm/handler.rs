use axum::{Json, body::Bytes, extract::State};
use tracing::error;

use crate::AppState;
use crate::error::AppError;

use super::model::{PromptRequest, PromptResponse};

pub async fn gemini(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<PromptResponse>, AppError> {
    let prompt = serde_json::from_slice::<PromptRequest>(&body)
        .ok()
        .and_then(|req| req.prompt)
        .filter(|p| !p.trim().is_empty())
        .ok_or(AppError::BadRequest("Prompt is required"))?;

    if !state.llm.is_configured() {
        error!("GEMINI_API_KEY not configured");
        return Err(AppError::NotConfigured("LLM service not configured"));
    }

    let response = state.llm.generate(&prompt).await.map_err(|err| {
        error!(error = %err, "Gemini request failed");
        AppError::Upstream(err)
    })?;

    Ok(Json(PromptResponse { response }))
}
