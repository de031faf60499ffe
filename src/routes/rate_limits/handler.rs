use std::net::SocketAddr;

use axum::{
    Json,
    extract::{ConnectInfo, State},
    http::{Extensions, HeaderMap},
};

use crate::AppState;
use crate::rate_limit::{ClientIdentity, RouteClass};

use super::model::{RateLimitsResponse, TieredQuotaStatus};

/// Current quota for the caller on both route classes. Does not count.
pub async fn rate_limits(
    State(state): State<AppState>,
    extensions: Extensions,
    headers: HeaderMap,
) -> Json<RateLimitsResponse> {
    let identity = match extensions.get::<ClientIdentity>() {
        Some(identity) => identity.clone(),
        None => {
            let peer = extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ci| ci.0.ip());
            state.identity.resolve(&headers, peer).await
        }
    };

    let now = state.limiter.now();
    let worker = state
        .limiter
        .status_at(&identity.identifier, identity.tier, RouteClass::General, now)
        .await;
    let llm = state
        .limiter
        .status_at(&identity.identifier, identity.tier, RouteClass::Llm, now)
        .await;

    Json(RateLimitsResponse {
        worker: worker.into(),
        llm: TieredQuotaStatus {
            status: llm.into(),
            tier: identity.tier,
        },
    })
}
