use std::any::Any;
use std::sync::Arc;

use axum::{
    Router,
    http::{
        HeaderName, Method,
        header::{AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER},
    },
    response::{IntoResponse, Response},
};
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any as AnyOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::cache::{CounterStore, MemoryCounterStore, RedisCounterStore};
use crate::config::Config;
use crate::error::{AppError, StartupError};
use crate::infrastructure::{GeminiClient, JwtVerifier, SupabaseVerifier, TokenVerifier};
use crate::middleware::rate_limit::{X_RATELIMIT_LIMIT, X_RATELIMIT_REMAINING, X_RATELIMIT_RESET};
use crate::rate_limit::identity::TIER_HEADER;
use crate::rate_limit::{Clock, IdentityResolver, RateLimiter};

pub mod cache;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod middleware;
pub mod rate_limit;
pub mod routes;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub limiter: Arc<RateLimiter>,
    pub identity: Arc<IdentityResolver>,
    pub llm: GeminiClient,
}

impl AppState {
    /// Assemble state from explicit collaborators.
    pub fn new(
        config: Config,
        store: Arc<dyn CounterStore>,
        verifier: Option<Arc<dyn TokenVerifier>>,
    ) -> Result<Self, StartupError> {
        let limiter = RateLimiter::new(config.rate_limits.clone(), store, config.limiter_options())?;
        let identity = IdentityResolver::new(verifier, config.trust_proxy_headers)
            .with_timeout(config.identity_timeout);
        let llm = GeminiClient::new(
            &config.gemini_api_url,
            &config.gemini_model,
            config.gemini_api_key.clone(),
            config.llm_timeout,
        )?;

        Ok(Self {
            config: Arc::new(config),
            limiter: Arc::new(limiter),
            identity: Arc::new(identity),
            llm,
        })
    }

    /// Pick the counter store and identity provider the configuration asks for.
    pub fn from_config(config: Config) -> Result<Self, StartupError> {
        let store: Arc<dyn CounterStore> = match &config.redis_url {
            Some(url) => {
                tracing::info!("Using Redis counter store");
                Arc::new(RedisCounterStore::open(url)?)
            }
            None => {
                tracing::warn!("REDIS_URL not set, rate limit counters are kept in process memory");
                Arc::new(MemoryCounterStore::new())
            }
        };

        let verifier: Option<Arc<dyn TokenVerifier>> =
            match (&config.jwt_secret, &config.supabase_url, &config.supabase_anon_key) {
                (Some(secret), _, _) => {
                    Some(Arc::new(JwtVerifier::new(secret, config.jwt_audience.as_deref())))
                }
                (None, Some(url), Some(anon_key)) => Some(Arc::new(SupabaseVerifier::new(
                    url,
                    anon_key,
                    config.identity_timeout,
                )?)),
                _ => {
                    tracing::warn!(
                        "No identity provider configured; bearer tokens are ignored for rate limiting"
                    );
                    None
                }
            };

        Self::new(config, store, verifier)
    }

    /// Replace the limiter's clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.limiter = Arc::new(self.limiter.as_ref().clone().with_clock(clock));
        self
    }
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            HeaderName::from_static(TIER_HEADER),
        ])
        .expose_headers([
            X_RATELIMIT_LIMIT,
            X_RATELIMIT_REMAINING,
            X_RATELIMIT_RESET,
            RETRY_AFTER,
        ])
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!(detail = %detail, "handler panicked");
    AppError::InternalServerError(detail).into_response()
}

/// The full application: routes, admission control and cross-cutting layers.
pub fn app(state: AppState) -> Router {
    routes::router(state.clone())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit,
        ))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CatchPanicLayer::custom(handle_panic))
                .layer(cors_layer())
                .layer(axum::middleware::from_fn(middleware::log_errors)),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn panics_become_json_500s() {
        let response = handle_panic(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = handle_panic(Box::new(String::from("owned boom")));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
