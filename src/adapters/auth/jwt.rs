//! HS256 JWT session validation and issuance.
//!
//! Tokens carry the relay username in a `username` claim alongside the
//! standard `exp`/`iat` (and optionally `iss`) claims. Validation and
//! issuance share one secret.

use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{AuthError, AuthenticatedUser, Timestamp, Username};
use crate::ports::SessionValidator;

/// Claims carried by relay access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayClaims {
    pub username: String,
    pub exp: u64,
    pub iat: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

/// Validates HS256 tokens signed with the shared secret.
pub struct JwtSessionValidator {
    key: DecodingKey,
    validation: Validation,
}

impl JwtSessionValidator {
    pub fn new(secret: &SecretString, issuer: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp"]);
        validation.validate_exp = true;
        if let Some(issuer) = issuer {
            validation.set_issuer(&[issuer]);
        }

        Self {
            key: DecodingKey::from_secret(secret.expose_secret().as_bytes()),
            validation,
        }
    }
}

#[async_trait]
impl SessionValidator for JwtSessionValidator {
    async fn validate(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        if token.trim().is_empty() {
            return Err(AuthError::MissingToken);
        }

        let data = decode::<RelayClaims>(token, &self.key, &self.validation).map_err(|e| {
            use jsonwebtoken::errors::ErrorKind;
            match e.kind() {
                ErrorKind::ExpiredSignature => {
                    tracing::debug!("Token expired");
                    AuthError::TokenExpired
                }
                ErrorKind::InvalidIssuer => {
                    tracing::warn!("Invalid issuer in token");
                    AuthError::InvalidToken
                }
                _ => {
                    tracing::debug!("Token validation failed: {}", e);
                    AuthError::InvalidToken
                }
            }
        })?;

        let username = Username::new(data.claims.username).map_err(|e| {
            tracing::warn!("Invalid username claim: {}", e);
            AuthError::InvalidToken
        })?;

        Ok(AuthenticatedUser::new(username))
    }
}

impl std::fmt::Debug for JwtSessionValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtSessionValidator")
            .field("issuer", &self.validation.iss)
            .finish_non_exhaustive()
    }
}

/// Mints HS256 tokens for relay users.
///
/// Used by tests and local tooling; production tokens may come from any
/// issuer that shares the secret.
pub struct JwtTokenIssuer {
    key: EncodingKey,
    ttl: Duration,
    issuer: Option<String>,
}

impl JwtTokenIssuer {
    pub fn new(secret: &SecretString, ttl: Duration, issuer: Option<String>) -> Self {
        Self {
            key: EncodingKey::from_secret(secret.expose_secret().as_bytes()),
            ttl,
            issuer,
        }
    }

    /// Issues a token valid for the configured TTL.
    pub fn issue(&self, user: &Username) -> Result<String, AuthError> {
        let now = Timestamp::now().as_unix_secs();
        self.issue_with_expiry(user, now + self.ttl.as_secs())
    }

    /// Issues a token expiring at `exp` (unix seconds).
    pub fn issue_with_expiry(&self, user: &Username, exp: u64) -> Result<String, AuthError> {
        let claims = RelayClaims {
            username: user.to_string(),
            exp,
            iat: Timestamp::now().as_unix_secs(),
            iss: self.issuer.clone(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.key)
            .map_err(|e| AuthError::service_unavailable(format!("token signing failed: {e}")))
    }
}

impl std::fmt::Debug for JwtTokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtTokenIssuer")
            .field("ttl", &self.ttl)
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}
