use axum::{
    body::{Body, to_bytes},
    http::{Request, header::CONTENT_LENGTH},
    middleware::Next,
    response::Response,
};
use tracing::error;

/// Largest slice of a response body copied into the log.
const MAX_LOGGED_BODY: usize = 4096;

/// Log every 5xx response together with the request line and body.
/// The client always receives the full body.
pub async fn log_errors(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let response = next.run(req).await;

    if !response.status().is_server_error() {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(b) => b,
        Err(e) => {
            error!(%method, %path, status = %parts.status, "failed to read error response body: {e}");
            parts.headers.remove(CONTENT_LENGTH);
            return Response::from_parts(parts, Body::empty());
        }
    };

    let logged = &bytes[..bytes.len().min(MAX_LOGGED_BODY)];
    error!(
        %method,
        %path,
        status = %parts.status,
        body = %String::from_utf8_lossy(logged),
        truncated = bytes.len() > MAX_LOGGED_BODY,
        "server error"
    );

    Response::from_parts(parts, Body::from(bytes))
}

#[cfg(test)]
mod tests {
    use axum::{Router, http::StatusCode, middleware, response::IntoResponse, routing::get};
    use tower::ServiceExt;

    use super::*;
    use crate::error::{AppError, LlmError};

    fn app() -> Router {
        Router::new()
            .route(
                "/big",
                get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "x".repeat(5000)) }),
            )
            .route(
                "/upstream",
                get(|| async {
                    AppError::Upstream(LlmError::Status {
                        status: 503,
                        body: "y".repeat(5000),
                    })
                    .into_response()
                }),
            )
            .route("/ok", get(|| async { "fine" }))
            .layer(middleware::from_fn(log_errors))
    }

    async fn send(path: &str) -> (StatusCode, axum::body::Bytes) {
        let req = Request::builder().uri(path).body(Body::empty()).unwrap();
        let res = app().oneshot(req).await.unwrap();
        let status = res.status();
        (status, to_bytes(res.into_body(), usize::MAX).await.unwrap())
    }

    #[tokio::test]
    async fn large_error_bodies_reach_the_client_intact() {
        let (status, body) = send("/big").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.len(), 5000);
    }

    #[tokio::test]
    async fn large_upstream_errors_keep_their_json_shape() {
        let (status, body) = send("/upstream").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Failed to get response from LLM");
        assert!(json["details"].as_str().unwrap().contains("503"));
    }

    #[tokio::test]
    async fn successful_responses_pass_through() {
        let (status, body) = send("/ok").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(&body[..], b"fine");
    }
}
