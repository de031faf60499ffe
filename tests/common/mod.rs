#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, Response},
};
use edge_console::{
    AppState, app,
    cache::{CounterRecord, CounterStore, MemoryCounterStore},
    config::Config,
    error::{CacheError, VerifyError},
    infrastructure::{TokenVerifier, VerifiedUser},
    rate_limit::ManualClock,
};

/// Start of a 60 second window.
pub const T0: i64 = 1_699_999_980;

/// Accepts `token-<id>`, rejects everything else.
pub struct StubVerifier;

#[async_trait]
impl TokenVerifier for StubVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedUser, VerifyError> {
        token
            .strip_prefix("token-")
            .map(|id| VerifiedUser {
                user_id: id.to_string(),
            })
            .ok_or(VerifyError::Rejected(401))
    }
}

/// Counts verification calls before delegating to [`StubVerifier`].
#[derive(Default)]
pub struct CountingVerifier {
    pub calls: AtomicUsize,
}

#[async_trait]
impl TokenVerifier for CountingVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedUser, VerifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        StubVerifier.verify(token).await
    }
}

/// Store whose every call fails.
pub struct DownStore;

#[async_trait]
impl CounterStore for DownStore {
    async fn get(&self, _key: &str) -> Result<Option<CounterRecord>, CacheError> {
        Err(CacheError::Timeout(Duration::from_millis(1)))
    }

    async fn try_increment(
        &self,
        _key: &str,
        _limit: u32,
        _ttl: u64,
    ) -> Result<Option<CounterRecord>, CacheError> {
        Err(CacheError::Timeout(Duration::from_millis(1)))
    }
}

pub struct TestApp {
    pub router: Router,
    pub clock: Arc<ManualClock>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with(Arc::new(MemoryCounterStore::new()), Some(Arc::new(StubVerifier)))
    }

    pub fn with(store: Arc<dyn CounterStore>, verifier: Option<Arc<dyn TokenVerifier>>) -> Self {
        Self::with_config(Config::default(), store, verifier)
    }

    pub fn with_config(
        config: Config,
        store: Arc<dyn CounterStore>,
        verifier: Option<Arc<dyn TokenVerifier>>,
    ) -> Self {
        let clock = Arc::new(ManualClock::new(T0));
        let state = AppState::new(config, store, verifier)
            .expect("valid state")
            .with_clock(clock.clone());
        Self {
            router: app(state),
            clock,
        }
    }

    pub async fn send(&self, req: Request<Body>) -> Response<Body> {
        use tower::ServiceExt;
        self.router.clone().oneshot(req).await.expect("infallible")
    }
}

pub fn get(path: &str, ip: &str) -> Request<Body> {
    Request::builder()
        .uri(path)
        .header("x-forwarded-for", ip)
        .body(Body::empty())
        .unwrap()
}

pub fn post_json(path: &str, ip: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header("x-forwarded-for", ip)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn header(res: &Response<Body>, name: &str) -> Option<String> {
    res.headers()
        .get(name)
        .map(|v| v.to_str().unwrap().to_string())
}

pub async fn json_body(res: Response<Body>) -> serde_json::Value {
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
