//! HS256 bearer token issuance and verification.

use chrono::Utc;
use common::UserId;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, Result};

/// Signing settings for bearer tokens.
#[derive(Clone)]
pub struct TokenConfig {
    secret: String,
    lifetime_secs: u64,
}

impl TokenConfig {
    pub const DEFAULT_LIFETIME_SECS: u64 = 24 * 60 * 60;

    pub fn new(secret: impl Into<String>, lifetime_secs: u64) -> Self {
        Self {
            secret: secret.into(),
            lifetime_secs,
        }
    }

    pub fn lifetime_secs(&self) -> u64 {
        self.lifetime_secs
    }
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &"<redacted>")
            .field("lifetime_secs", &self.lifetime_secs)
            .finish()
    }
}

/// Claims carried by every bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id.
    pub sub: String,
    /// Issued-at (Unix timestamp).
    pub iat: i64,
    /// Expiration (Unix timestamp).
    pub exp: i64,
}

/// Issues a signed token for `user_id`, valid for the configured lifetime.
pub fn issue_token(user_id: UserId, config: &TokenConfig) -> Result<String> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now,
        exp: now.saturating_add(i64::try_from(config.lifetime_secs).unwrap_or(i64::MAX)),
    };
    encode_claims(&claims, config)
}

pub(crate) fn encode_claims(claims: &Claims, config: &TokenConfig) -> Result<String> {
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .map_err(|e| DomainError::Crypto(format!("JWT encode: {e}")))
}

/// Verifies a token's signature and expiry and returns its claims.
pub fn decode_token(token: &str, config: &TokenConfig) -> Result<Claims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.set_required_spec_claims(&["sub", "exp"]);

    jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => DomainError::unauthenticated("Token has expired"),
        _ => DomainError::unauthenticated("Token is invalid"),
    })
}
