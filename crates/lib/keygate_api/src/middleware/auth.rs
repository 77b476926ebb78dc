//! Authentication middleware: Bearer header or session cookie, verified by the resolver.

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;

use crate::AppState;
use crate::error::{AppError, INVALID_TOKEN_MESSAGE};
use crate::services::cookies::ACCESS_COOKIE;

/// Resolved caller, stored in request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    /// Email address carried in the token's `sub` claim.
    pub subject: String,
    /// True when the caller presented a personal API key.
    pub is_api_key: bool,
}

/// `Authorization: Bearer <token>` first, then the `access_token` cookie.
fn extract_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }
    CookieJar::from_headers(headers)
        .get(ACCESS_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty())
}

/// Axum middleware: resolves the caller's token and injects [`AuthenticatedUser`].
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_token(request.headers())
        .ok_or_else(|| AppError::Unauthorized("Missing authentication token".into()))?;

    let resolution = state.resolver.resolve(&token).await;
    let Some(subject) = resolution.subject else {
        return Err(AppError::Unauthorized(INVALID_TOKEN_MESSAGE.into()));
    };

    request.extensions_mut().insert(AuthenticatedUser {
        subject,
        is_api_key: resolution.is_api_key,
    });
    Ok(next.run(request).await)
}
