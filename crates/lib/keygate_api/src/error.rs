//! Application error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use keygate_core::auth::AuthError;
use thiserror::Error;
use tracing::error;

use crate::models::ErrorResponse;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Message returned for every rejected credential, whatever the reason.
pub const INVALID_TOKEN_MESSAGE: &str = "Invalid or expired token";

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match &self {
            AppError::Validation(m) => (StatusCode::BAD_REQUEST, "validation_error", m.as_str()),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, "not_found", m.as_str()),
            AppError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, "unauthorized", m.as_str()),
            AppError::Forbidden(m) => (StatusCode::FORBIDDEN, "forbidden", m.as_str()),
            AppError::Conflict(m) => (StatusCode::CONFLICT, "conflict", m.as_str()),
            AppError::Internal(detail) => {
                error!(detail = %detail, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error",
                )
            }
        };
        let body = Json(ErrorResponse {
            error: kind.to_string(),
            message: message.to_string(),
        });
        (status, body).into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::CredentialError => AppError::Unauthorized("Invalid credentials".into()),
            AuthError::MalformedToken
            | AuthError::InvalidSignature
            | AuthError::WrongAlgorithm
            | AuthError::Expired
            | AuthError::Revoked => AppError::Unauthorized(INVALID_TOKEN_MESSAGE.into()),
            AuthError::TokenError(msg) => AppError::Unauthorized(msg),
            AuthError::LimitExceeded { .. } => AppError::Validation(e.to_string()),
            AuthError::AlreadyRevoked => AppError::Conflict(e.to_string()),
            AuthError::CsrfMismatch => AppError::Forbidden(e.to_string()),
            AuthError::ValidationError(msg) => AppError::Validation(msg),
            AuthError::KeyUnavailable(msg) | AuthError::Internal(msg) => AppError::Internal(msg),
            AuthError::DbError(e) => AppError::Internal(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(e: AuthError) -> StatusCode {
        AppError::from(e).into_response().status()
    }

    #[test]
    fn auth_errors_map_to_statuses() {
        assert_eq!(status_of(AuthError::CredentialError), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(AuthError::Expired), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status_of(AuthError::LimitExceeded { limit: 20 }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(AuthError::AlreadyRevoked), StatusCode::CONFLICT);
        assert_eq!(status_of(AuthError::CsrfMismatch), StatusCode::FORBIDDEN);
        assert_eq!(
            status_of(AuthError::ValidationError("bad".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(AuthError::Internal("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn token_failures_share_one_message() {
        for e in [
            AuthError::MalformedToken,
            AuthError::InvalidSignature,
            AuthError::WrongAlgorithm,
            AuthError::Expired,
            AuthError::Revoked,
        ] {
            match AppError::from(e) {
                AppError::Unauthorized(m) => assert_eq!(m, INVALID_TOKEN_MESSAGE),
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn limit_message_names_the_cap() {
        match AppError::from(AuthError::LimitExceeded { limit: 20 }) {
            AppError::Validation(m) => assert_eq!(m, "Maximum of 20 active API keys reached"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
