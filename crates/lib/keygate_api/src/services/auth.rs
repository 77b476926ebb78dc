//! Authentication service: register, login, refresh and logout flows over the core engine.

use chrono::Duration;
use keygate_core::auth::AuthError;
use keygate_core::auth::csrf::CsrfGuard;
use keygate_core::auth::password::{hash_password, validate_password, verify_password};
use keygate_core::models::auth::{ADMIN_ROLE, DEFAULT_ROLE, User};
use tracing::{debug, info};

use crate::AppState;
use crate::error::{AppError, AppResult};

/// Everything handed back to the browser after a successful sign-in or refresh.
#[derive(Debug)]
pub struct IssuedSession {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
    pub csrf_token: String,
}

/// Trim and lowercase an email, rejecting obviously invalid input.
fn normalize_email(email: &str) -> AppResult<String> {
    let email = email.trim().to_ascii_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(AppError::Validation("Invalid email address".into())),
    }
}

/// Mint a session token and CSRF token for `user` alongside `refresh_token`.
fn issue_session(state: &AppState, user: User, refresh_token: String) -> AppResult<IssuedSession> {
    let access_token = state
        .sessions
        .encode(&user.email, Duration::seconds(state.config.session_ttl_secs))?;
    Ok(IssuedSession {
        user,
        access_token,
        refresh_token,
        csrf_token: CsrfGuard::create_csrf_token(),
    })
}

/// Create an account and sign it in. The first account becomes an admin.
pub async fn register(state: &AppState, email: &str, password: &str) -> AppResult<IssuedSession> {
    let email = normalize_email(email)?;
    validate_password(password)?;

    let role = if state.store.user_count().await? == 0 {
        ADMIN_ROLE
    } else {
        DEFAULT_ROLE
    };
    let password_hash = hash_password(password)?;
    let user = state.store.create_user(&email, &password_hash, role).await?;
    info!(user_id = user.id, role, "user registered");

    let refresh_token = state.refresh_tokens.issue(&user).await?;
    issue_session(state, user, refresh_token)
}

/// Authenticate with email and password.
///
/// Unknown email and wrong password produce the same error.
pub async fn login(state: &AppState, email: &str, password: &str) -> AppResult<IssuedSession> {
    let email = email.trim().to_ascii_lowercase();
    let found = state.store.find_user_by_email(&email).await?;

    let Some(found) = found else {
        debug!("login for unknown email");
        return Err(AuthError::CredentialError.into());
    };
    let verified = found
        .password_hash
        .as_deref()
        .is_some_and(|hash| verify_password(password, hash));
    if !verified {
        debug!(user_id = found.user.id, "login with wrong password");
        return Err(AuthError::CredentialError.into());
    }

    let user = found.user;
    info!(user_id = user.id, "user logged in");
    let refresh_token = state.refresh_tokens.issue(&user).await?;
    issue_session(state, user, refresh_token)
}

/// Exchange a refresh token for a new session, rotating the refresh token.
pub async fn refresh(state: &AppState, refresh_token: &str) -> AppResult<IssuedSession> {
    let invalid = || AppError::Unauthorized("Invalid refresh token".into());

    let record = state
        .refresh_tokens
        .lookup(refresh_token)
        .await?
        .ok_or_else(invalid)?;
    let user = state
        .store
        .find_user_by_id(record.user_id)
        .await?
        .ok_or_else(invalid)?;

    let rotated = match state.refresh_tokens.rotate(refresh_token, &user).await {
        Ok(Some(token)) => token,
        Ok(None) | Err(AuthError::Revoked) => return Err(invalid()),
        Err(e) => return Err(e.into()),
    };
    issue_session(state, user, rotated)
}

/// Revoke the refresh token, if any.
pub async fn logout(state: &AppState, refresh_token: Option<&str>) -> AppResult<()> {
    if let Some(token) = refresh_token {
        state.refresh_tokens.revoke(token).await?;
    }
    Ok(())
}
