//! CSRF middleware: the `X-CSRF-Token` header must match the `csrf_token` cookie.

use axum::{extract::Request, middleware::Next, response::Response};
use axum_extra::extract::cookie::CookieJar;
use keygate_core::auth::AuthError;
use keygate_core::auth::csrf::CsrfGuard;
use tracing::debug;

use crate::error::AppError;
use crate::services::cookies::{CSRF_COOKIE, CSRF_HEADER};

/// Axum middleware applied to every route.
pub async fn verify_csrf(request: Request, next: Next) -> Result<Response, AppError> {
    let allowed = {
        let headers = request.headers();
        let jar = CookieJar::from_headers(headers);
        let cookie = jar.get(CSRF_COOKIE).map(|c| c.value());
        let header = headers.get(CSRF_HEADER).and_then(|v| v.to_str().ok());
        CsrfGuard::validate(request.method(), header, cookie)
    };
    if !allowed {
        debug!(method = %request.method(), path = %request.uri().path(), "CSRF check failed");
        return Err(AuthError::CsrfMismatch.into());
    }
    Ok(next.run(request).await)
}
