use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, error};

use crate::AppState;
use crate::error::{AppError, VerifyError};
use crate::infrastructure::VerifiedUser;
use crate::rate_limit::ClientIdentity;
use crate::rate_limit::identity::bearer_token;

/// Require a verified bearer token. The verified user is stored in the
/// request extensions for handlers.
///
/// A user already verified by admission control is reused as is.
pub async fn require_user(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let admitted = req
        .extensions()
        .get::<ClientIdentity>()
        .and_then(ClientIdentity::user_id)
        .map(|user_id| VerifiedUser {
            user_id: user_id.to_string(),
        });
    if let Some(user) = admitted {
        req.extensions_mut().insert(user);
        return next.run(req).await;
    }

    let Some(token) = bearer_token(req.headers()) else {
        debug!("protected route called without bearer token");
        return AppError::Unauthorized("Missing or malformed token".into()).into_response();
    };

    match state.identity.verify(&token).await {
        Ok(user) => {
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        Err(VerifyError::NotConfigured) => {
            error!("identity provider not configured, cannot authenticate");
            AppError::NotConfigured("Server not configured for authentication").into_response()
        }
        Err(err) => {
            debug!(error = %err, "bearer token rejected");
            AppError::Unauthorized("Invalid token".into()).into_response()
        }
    }
}
