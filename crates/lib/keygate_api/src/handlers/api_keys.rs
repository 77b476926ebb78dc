//! Personal API key management handlers.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::Utc;
use keygate_core::models::auth::User;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{
    ApiKeyInfo, ApiKeyListResponse, CreateApiKeyRequest, CreateApiKeyResponse,
    RevokeApiKeyResponse,
};

/// The user behind an authenticated subject.
async fn current_user(state: &AppState, caller: &AuthenticatedUser) -> AppResult<User> {
    state
        .store
        .find_user_by_email(&caller.subject)
        .await?
        .map(|found| found.user)
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))
}

/// `POST /auth/api-keys` — issue a key. The raw token appears only in this response.
pub async fn create_api_key_handler(
    State(state): State<AppState>,
    axum::Extension(caller): axum::Extension<AuthenticatedUser>,
    Json(body): Json<CreateApiKeyRequest>,
) -> AppResult<(StatusCode, Json<CreateApiKeyResponse>)> {
    let user = current_user(&state, &caller).await?;
    let label = body.label.as_deref().map(str::trim).filter(|l| !l.is_empty());
    let (record, token) = state.api_keys.issue(&user, label, body.ttl_days).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreateApiKeyResponse {
            token,
            key: ApiKeyInfo::from_record(record, Utc::now()),
        }),
    ))
}

/// `GET /auth/api-keys` — the caller's keys, newest first.
pub async fn list_api_keys_handler(
    State(state): State<AppState>,
    axum::Extension(caller): axum::Extension<AuthenticatedUser>,
) -> AppResult<Json<ApiKeyListResponse>> {
    let user = current_user(&state, &caller).await?;
    let now = Utc::now();
    let keys = state
        .api_keys
        .list(&user)
        .await?
        .into_iter()
        .map(|record| ApiKeyInfo::from_record(record, now))
        .collect();
    Ok(Json(ApiKeyListResponse { keys }))
}

/// `DELETE /auth/api-keys/{id}` — revoke one of the caller's keys.
///
/// Keys owned by someone else are reported as not found.
pub async fn revoke_api_key_handler(
    State(state): State<AppState>,
    axum::Extension(caller): axum::Extension<AuthenticatedUser>,
    Path(key_id): Path<i64>,
) -> AppResult<Json<RevokeApiKeyResponse>> {
    let user = current_user(&state, &caller).await?;
    if !state.api_keys.revoke(&user, key_id).await? {
        return Err(AppError::NotFound("API key not found".into()));
    }
    Ok(Json(RevokeApiKeyResponse { success: true }))
}
