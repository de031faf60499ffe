use serde::Serialize;

use crate::rate_limit::{Tier, Verdict};

#[derive(Debug, Serialize)]
pub struct QuotaStatus {
    pub limit: u32,
    pub remaining: u32,
    pub reset: i64,
}

impl From<Verdict> for QuotaStatus {
    fn from(verdict: Verdict) -> Self {
        Self {
            limit: verdict.limit,
            remaining: verdict.remaining,
            reset: verdict.reset_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TieredQuotaStatus {
    #[serde(flatten)]
    pub status: QuotaStatus,
    pub tier: Tier,
}

#[derive(Debug, Serialize)]
pub struct RateLimitsResponse {
    pub worker: QuotaStatus,
    pub llm: TieredQuotaStatus,
}
