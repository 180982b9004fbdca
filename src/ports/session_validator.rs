//! Session validation port for token validation.
//!
//! This port defines the contract for validating access tokens and
//! extracting user identity. It is consumed once per connection, while the
//! connection is still joining, and by the HTTP auth middleware.

use async_trait::async_trait;

use crate::domain::foundation::{AuthError, AuthenticatedUser};

/// Validates access tokens and extracts user identity.
///
/// # Contract
///
/// Implementations must:
/// - Return `AuthError::InvalidToken` for malformed/bad signature tokens
/// - Return `AuthError::TokenExpired` for expired tokens
/// - Return `AuthError::ServiceUnavailable` for transient errors
#[async_trait]
pub trait SessionValidator: Send + Sync {
    /// Validate an access token and return the authenticated user.
    ///
    /// `token` is the raw token without any "Bearer " prefix.
    async fn validate(&self, token: &str) -> Result<AuthenticatedUser, AuthError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::Username;
    use std::collections::HashMap;

    /// Simple mock implementation for testing the trait
    struct TestSessionValidator {
        tokens: HashMap<String, AuthenticatedUser>,
    }

    #[async_trait]
    impl SessionValidator for TestSessionValidator {
        async fn validate(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
            self.tokens
                .get(token)
                .cloned()
                .ok_or(AuthError::InvalidToken)
        }
    }

    #[tokio::test]
    async fn session_validator_maps_known_tokens() {
        let user = AuthenticatedUser::new(Username::new("alice").unwrap());
        let validator = TestSessionValidator {
            tokens: HashMap::from([("t".to_string(), user.clone())]),
        };

        assert_eq!(validator.validate("t").await, Ok(user));
        assert_eq!(
            validator.validate("nope").await,
            Err(AuthError::InvalidToken)
        );
    }

    #[test]
    fn session_validator_trait_is_object_safe_and_send_sync() {
        fn _assert_trait_object(_: &dyn SessionValidator) {}
        fn _assert_arc_send_sync<T: Send + Sync + ?Sized>() {}
        _assert_arc_send_sync::<std::sync::Arc<dyn SessionValidator>>();
    }
}
