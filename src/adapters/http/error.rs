//! JSON error envelope shared by every HTTP endpoint.
//!
//! ```json
//! {"error": "Room lobby not found", "code": "ROOM_NOT_FOUND"}
//! ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::application::RelayError;
use crate::domain::foundation::{AuthError, DomainError, ErrorCode};
use crate::ports::RoomError;

#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
        }
    }

    pub fn bad_request(error: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationFailed.to_string(), error)
    }

    pub fn forbidden(error: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden.to_string(), error)
    }
}

/// HTTP status for a domain error code.
pub fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::ValidationFailed => StatusCode::BAD_REQUEST,
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::Forbidden => StatusCode::FORBIDDEN,
        ErrorCode::RoomNotFound => StatusCode::NOT_FOUND,
        ErrorCode::RoomAlreadyExists | ErrorCode::AlreadyJoined => StatusCode::CONFLICT,
        ErrorCode::BusUnavailable | ErrorCode::ServiceUnavailable | ErrorCode::CacheError => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Response wrapper for any error that converts into a [`DomainError`].
#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(self.0.code);
        if status.is_server_error() {
            tracing::error!(code = %self.0.code, error = %self.0.message, "Request failed");
        }
        (
            status,
            Json(ErrorResponse::new(self.0.code.to_string(), self.0.message)),
        )
            .into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        // Transient auth failures are an upstream outage, not a bad token.
        if let RelayError::Auth(AuthError::ServiceUnavailable(msg)) = &err {
            return Self(DomainError::new(
                ErrorCode::ServiceUnavailable,
                format!("Authentication service unavailable: {}", msg),
            ));
        }
        Self(err.into())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        RelayError::Auth(err).into()
    }
}

impl From<RoomError> for ApiError {
    fn from(err: RoomError) -> Self {
        let message = err.to_string();
        let code = match err {
            RoomError::AlreadyExists(_) => ErrorCode::RoomAlreadyExists,
            RoomError::NotFound(_) => ErrorCode::RoomNotFound,
            RoomError::Forbidden => ErrorCode::Forbidden,
            RoomError::Store(_) => ErrorCode::CacheError,
        };
        Self(DomainError::new(code, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{RoomId, Username};

    fn status_of(err: impl Into<ApiError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn relay_errors_map_to_rejection_statuses() {
        let room = RoomId::new("r1").unwrap();
        let user = Username::new("alice").unwrap();

        assert_eq!(
            status_of(RelayError::Validation(
                crate::domain::foundation::ValidationError::empty_field("room_id")
            )),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(AuthError::InvalidToken), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(AuthError::MissingToken), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status_of(RelayError::RoomNotFound(room.clone())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(RelayError::AlreadyJoined { room, user }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(RelayError::BusUnavailable("down".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn transient_auth_failure_is_service_unavailable() {
        assert_eq!(
            status_of(AuthError::service_unavailable("jwks down")),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn room_errors_map_to_statuses() {
        let room = RoomId::new("r1").unwrap();
        assert_eq!(status_of(RoomError::Forbidden), StatusCode::FORBIDDEN);
        assert_eq!(status_of(RoomError::NotFound(room.clone())), StatusCode::NOT_FOUND);
        assert_eq!(status_of(RoomError::AlreadyExists(room)), StatusCode::CONFLICT);
    }

    #[test]
    fn envelope_has_error_and_code() {
        let body = serde_json::to_value(ErrorResponse::bad_request("nope")).unwrap();
        assert_eq!(body["error"], "nope");
        assert_eq!(body["code"], "VALIDATION_FAILED");
    }
}
