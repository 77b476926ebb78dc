//! Authentication and credential logic.
//!
//! Session tokens (HS256, cookie-delivered) and personal API keys (RS256,
//! bearer-delivered) share one verification surface, [`resolver::AuthenticationResolver`].
//! Refresh tokens, API-key records and CSRF tokens live alongside.

pub mod api_key_token;
pub mod api_keys;
pub mod csrf;
pub mod jwt;
pub mod keys;
pub mod password;
pub mod refresh_tokens;
pub mod resolver;

use subtle::ConstantTimeEq;
use thiserror::Error;

/// Authentication errors.
///
/// Token failures (`MalformedToken`, `InvalidSignature`, `WrongAlgorithm`,
/// `Expired`, `Revoked`) are only used internally and for logging; public
/// verification paths collapse them into `None`.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    CredentialError,

    #[error("Malformed token")]
    MalformedToken,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Unexpected token algorithm")]
    WrongAlgorithm,

    #[error("Token expired")]
    Expired,

    #[error("Token revoked")]
    Revoked,

    #[error("Signing key unavailable: {0}")]
    KeyUnavailable(String),

    #[error("Maximum of {limit} active API keys reached")]
    LimitExceeded { limit: usize },

    #[error("API key already revoked")]
    AlreadyRevoked,

    #[error("Invalid or missing CSRF token")]
    CsrfMismatch,

    #[error("Token error: {0}")]
    TokenError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DbError(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::Expired,
            ErrorKind::InvalidSignature => AuthError::InvalidSignature,
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                AuthError::WrongAlgorithm
            }
            ErrorKind::InvalidToken
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_)
            | ErrorKind::MissingRequiredClaim(_) => AuthError::MalformedToken,
            _ => AuthError::TokenError(e.to_string()),
        }
    }
}

/// Base64url-decode and deserialize one dot-separated JWT segment, unverified.
pub(crate) fn decode_segment<T: serde::de::DeserializeOwned>(
    token: &str,
    index: usize,
) -> Result<T, AuthError> {
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(AuthError::MalformedToken);
    }
    let bytes = URL_SAFE_NO_PAD
        .decode(parts[index])
        .map_err(|_| AuthError::MalformedToken)?;
    serde_json::from_slice(&bytes).map_err(|_| AuthError::MalformedToken)
}

/// Equality whose running time does not depend on where the inputs differ.
///
/// Lengths are not secret: inputs of different length compare unequal.
pub(crate) fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
