//! Authentication request handlers.

use axum::Json;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::CookieJar;
use tracing::{debug, warn};

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{LoginRequest, LogoutResponse, MeResponse, RegisterRequest, SessionResponse};
use crate::services::auth::{self, IssuedSession};
use crate::services::cookies::REFRESH_COOKIE;

fn session_reply(
    state: &AppState,
    jar: CookieJar,
    session: IssuedSession,
) -> (CookieJar, Json<SessionResponse>) {
    let jar = state.cookies.set_all(
        jar,
        &session.access_token,
        &session.refresh_token,
        &session.csrf_token,
    );
    let body = SessionResponse {
        user: session.user.into(),
        expires_in: state.config.session_ttl_secs,
    };
    (jar, Json(body))
}

/// `POST /auth/register` — create an account and start a session.
pub async fn register_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<RegisterRequest>,
) -> AppResult<(CookieJar, Json<SessionResponse>)> {
    let session = auth::register(&state, &body.email, &body.password).await?;
    Ok(session_reply(&state, jar, session))
}

/// `POST /auth/login` — authenticate with email + password.
pub async fn login_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<LoginRequest>,
) -> AppResult<(CookieJar, Json<SessionResponse>)> {
    let session = auth::login(&state, &body.email, &body.password).await?;
    Ok(session_reply(&state, jar, session))
}

/// `POST /auth/refresh` — rotate the refresh cookie and reissue the session.
///
/// Any failure clears all auth cookies.
pub async fn refresh_handler(State(state): State<AppState>, jar: CookieJar) -> Response {
    let token = jar.get(REFRESH_COOKIE).map(|c| c.value().to_string());
    let result = match token.as_deref() {
        Some(token) if !token.is_empty() => auth::refresh(&state, token).await,
        _ => Err(AppError::Unauthorized("Missing refresh token".into())),
    };
    match result {
        Ok(session) => session_reply(&state, jar, session).into_response(),
        Err(e) => {
            debug!(error = %e, "refresh rejected");
            let jar = state.cookies.clear_all(jar);
            (jar, AppError::Unauthorized("Invalid refresh token".into())).into_response()
        }
    }
}

/// `POST /auth/logout` — revoke the refresh token and clear cookies. Always succeeds.
pub async fn logout_handler(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Json<LogoutResponse>) {
    let token = jar.get(REFRESH_COOKIE).map(|c| c.value().to_string());
    if let Err(e) = auth::logout(&state, token.as_deref()).await {
        warn!(error = %e, "refresh token revocation failed during logout");
    }
    (state.cookies.clear_all(jar), Json(LogoutResponse { success: true }))
}

/// `GET /auth/me` — the authenticated caller.
pub async fn me_handler(
    State(state): State<AppState>,
    axum::Extension(caller): axum::Extension<AuthenticatedUser>,
) -> AppResult<Json<MeResponse>> {
    let role = state
        .store
        .find_user_by_email(&caller.subject)
        .await?
        .map(|found| found.user.role);
    Ok(Json(MeResponse {
        subject: caller.subject,
        role,
        is_api_key: caller.is_api_key,
    }))
}
