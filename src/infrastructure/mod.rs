//! Clients for the external services the console depends on.

pub mod auth;
pub mod llm;

pub use auth::{JwtVerifier, SupabaseVerifier, TokenVerifier, VerifiedUser};
pub use llm::GeminiClient;
