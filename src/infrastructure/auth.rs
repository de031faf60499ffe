use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use crate::error::VerifyError;

/// Identity confirmed by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifiedUser {
    pub user_id: String,
}

/// Exchanges a bearer token for the user it was issued to.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<VerifiedUser, VerifyError>;
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
}

/// Verifies HS256 tokens signed with the provider's shared secret.
#[derive(Clone)]
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str, audience: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        match audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }
}

#[async_trait]
impl TokenVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedUser, VerifyError> {
        let data = decode::<Claims>(token, &self.key, &self.validation)?;
        if data.claims.sub.is_empty() {
            return Err(VerifyError::NoUser);
        }
        Ok(VerifiedUser {
            user_id: data.claims.sub,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RemoteUser {
    id: Option<String>,
}

/// Asks a Supabase-compatible auth server who owns a token.
#[derive(Clone)]
pub struct SupabaseVerifier {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseVerifier {
    pub fn new(base_url: &str, anon_key: &str, timeout: Duration) -> Result<Self, VerifyError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
        })
    }
}

#[async_trait]
impl TokenVerifier for SupabaseVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedUser, VerifyError> {
        let response = self
            .client
            .get(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(VerifyError::Rejected(status.as_u16()));
        }

        let user: RemoteUser = response.json().await?;
        match user.id {
            Some(id) if !id.is_empty() => Ok(VerifiedUser { user_id: id }),
            _ => Err(VerifyError::NoUser),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};

    fn token(secret: &str, sub: &str, exp: i64) -> String {
        let claims = Claims {
            sub: sub.to_string(),
            exp,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn in_one_hour() -> i64 {
        chrono::Utc::now().timestamp() + 3600
    }

    #[tokio::test]
    async fn accepts_token_signed_with_secret() {
        let verifier = JwtVerifier::new("secret", None);
        let user = verifier.verify(&token("secret", "abc-123", in_one_hour())).await.unwrap();
        assert_eq!(user.user_id, "abc-123");
    }

    #[tokio::test]
    async fn rejects_wrong_signature() {
        let verifier = JwtVerifier::new("secret", None);
        let result = verifier.verify(&token("other", "abc-123", in_one_hour())).await;
        assert!(matches!(result, Err(VerifyError::Jwt(_))));
    }

    #[tokio::test]
    async fn rejects_expired_token() {
        let verifier = JwtVerifier::new("secret", None);
        let expired = chrono::Utc::now().timestamp() - 3600;
        let result = verifier.verify(&token("secret", "abc-123", expired)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn rejects_garbage() {
        let verifier = JwtVerifier::new("secret", None);
        assert!(verifier.verify("not-a-jwt").await.is_err());
    }
}
