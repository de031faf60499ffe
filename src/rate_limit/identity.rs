//! Maps request headers to the caller identity used for rate limiting.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderMap;
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::VerifyError;
use crate::infrastructure::auth::{TokenVerifier, VerifiedUser};
use crate::rate_limit::policy::Tier;

/// Header carrying the caller's tier signal. Client supplied, so spoofable.
pub const TIER_HEADER: &str = "x-rate-limit-tier";

/// Default bound on each verification call.
pub const DEFAULT_IDENTITY_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
    User,
    Ip,
}

/// Who a request is counted against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientIdentity {
    pub identifier: String,
    pub tier: Tier,
    pub auth_type: AuthType,
}

impl ClientIdentity {
    pub fn user(user_id: &str, tier: Tier) -> Self {
        Self {
            identifier: format!("user:{user_id}"),
            tier,
            auth_type: AuthType::User,
        }
    }

    /// The verified user id, when the caller was identified by token.
    pub fn user_id(&self) -> Option<&str> {
        match self.auth_type {
            AuthType::User => self.identifier.strip_prefix("user:"),
            AuthType::Ip => None,
        }
    }

    pub fn ip(address: &str) -> Self {
        Self {
            identifier: format!("ip:{address}"),
            tier: Tier::Free,
            auth_type: AuthType::Ip,
        }
    }
}

/// Extract a non-empty bearer token from the `Authorization` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let auth = headers.typed_get::<Authorization<Bearer>>()?;
    let token = auth.token().trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// Best known client address.
///
/// With `trust_proxy` set, proxy headers win over the peer address in this
/// order: `cf-connecting-ip`, first `x-forwarded-for` entry, `x-real-ip`.
pub fn client_ip(headers: &HeaderMap, peer: Option<IpAddr>, trust_proxy: bool) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    let forwarded = if trust_proxy {
        header("cf-connecting-ip")
            .or_else(|| {
                header("x-forwarded-for")
                    .and_then(|s| s.split(',').map(str::trim).find(|ip| !ip.is_empty()))
            })
            .or_else(|| header("x-real-ip"))
    } else {
        None
    };

    forwarded
        .map(str::to_string)
        .or_else(|| peer.map(|ip| ip.to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Resolves `(identifier, tier)` pairs for inbound requests.
#[derive(Clone)]
pub struct IdentityResolver {
    verifier: Option<Arc<dyn TokenVerifier>>,
    trust_proxy: bool,
    timeout: Duration,
}

impl IdentityResolver {
    pub fn new(verifier: Option<Arc<dyn TokenVerifier>>, trust_proxy: bool) -> Self {
        Self {
            verifier,
            trust_proxy,
            timeout: DEFAULT_IDENTITY_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn has_verifier(&self) -> bool {
        self.verifier.is_some()
    }

    /// Verify a bearer token against the identity provider, bounded by the timeout.
    pub async fn verify(&self, token: &str) -> Result<VerifiedUser, VerifyError> {
        let verifier = self.verifier.as_ref().ok_or(VerifyError::NotConfigured)?;
        tokio::time::timeout(self.timeout, verifier.verify(token))
            .await
            .map_err(|_| VerifyError::Timeout(self.timeout))?
    }

    /// Identify the caller. Never fails: anything short of a verified token
    /// falls back to the client address on the free tier.
    pub async fn resolve(&self, headers: &HeaderMap, peer: Option<IpAddr>) -> ClientIdentity {
        if let Some(token) = bearer_token(headers) {
            match self.verify(&token).await {
                Ok(user) => {
                    let tier = Tier::from_signal(
                        headers.get(TIER_HEADER).and_then(|h| h.to_str().ok()),
                    );
                    return ClientIdentity::user(&user.user_id, tier);
                }
                Err(VerifyError::NotConfigured) => {
                    debug!("bearer token ignored, no identity provider configured");
                }
                Err(err) => {
                    warn!(error = %err, "token verification failed, falling back to client address");
                }
            }
        }

        ClientIdentity::ip(&client_ip(headers, peer, self.trust_proxy))
    }
}
