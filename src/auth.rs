//! User authentication for the public join route.
//!
//! Users sign in with Supabase Auth; we only verify the access token they
//! send and read the user id from its `sub` claim.

use async_trait::async_trait;
use supabase_jwt::{Claims, JwksCache};
use uuid::Uuid;

#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    #[error("Missing Authorization header")]
    MissingToken,

    #[error("JWT auth failed: {0}")]
    InvalidToken(String),

    #[error("Token issuer mismatch: {0:?}")]
    IssuerMismatch(Option<String>),

    #[error("Token subject is not a user id: {0}")]
    BadSubject(String),

    #[error("User authentication is not configured")]
    Unavailable,
}

/// Turns an `Authorization` header value into a verified user id
#[async_trait]
pub trait UserVerifier: Send + Sync {
    async fn verify_user(&self, auth_header: &str) -> Result<Uuid, AuthError>;
}

/// Strip an optional `Bearer ` prefix
pub fn bearer_token(auth_header: &str) -> &str {
    auth_header.strip_prefix("Bearer ").unwrap_or(auth_header).trim()
}

/// Verifies Supabase access tokens against the project's JWKS
#[derive(Clone)]
pub struct SupabaseAuth {
    jwks_cache: JwksCache,
    project_id: String,
}

impl SupabaseAuth {
    pub fn new(jwks_url: &str, project_id: &str) -> Self {
        Self {
            jwks_cache: JwksCache::new(jwks_url),
            project_id: project_id.to_string(),
        }
    }
}

#[async_trait]
impl UserVerifier for SupabaseAuth {
    async fn verify_user(&self, auth_header: &str) -> Result<Uuid, AuthError> {
        let token = bearer_token(auth_header);
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let claims = Claims::from_bearer_token(token, &self.jwks_cache)
            .await
            .map_err(|e| AuthError::InvalidToken(format!("{:?}", e)))?;

        // Token must come from our project
        let iss = claims.iss.as_deref().unwrap_or("");
        if !iss.contains(&self.project_id) {
            return Err(AuthError::IssuerMismatch(claims.iss.clone()));
        }

        Uuid::parse_str(&claims.sub).map_err(|_| AuthError::BadSubject(claims.sub.clone()))
    }
}

/// Stand-in when no JWKS is configured: every join is refused
pub struct AuthDisabled;

#[async_trait]
impl UserVerifier for AuthDisabled {
    async fn verify_user(&self, _auth_header: &str) -> Result<Uuid, AuthError> {
        Err(AuthError::Unavailable)
    }
}
