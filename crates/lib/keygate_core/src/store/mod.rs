//! Persistence interface consumed by the credential engine.
//!
//! Every read returns `None`/empty on a miss. Mutations that guard a security
//! transition (revocation, usage touch, rotation) are conditional writes and
//! report whether a row actually changed.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::auth::AuthError;
use crate::models::auth::{
    ApiKeyRecord, NewApiKey, RefreshTokenRecord, User, UserWithPassword,
};

/// Storage for users, refresh tokens and API keys.
#[async_trait]
pub trait AuthStore: Send + Sync {
    /// Fetch a user (with password hash) by email.
    async fn find_user_by_email(&self, email: &str)
    -> Result<Option<UserWithPassword>, AuthError>;

    /// Fetch a user by ID.
    async fn find_user_by_id(&self, user_id: i64) -> Result<Option<User>, AuthError>;

    /// Create a user. Fails with `ValidationError` if the email is taken.
    async fn create_user(
        &self,
        email: &str,
        password_hash: &str,
        role: &str,
    ) -> Result<User, AuthError>;

    /// Count registered users.
    async fn user_count(&self) -> Result<i64, AuthError>;

    /// Delete a user, cascading to their refresh tokens and API keys.
    async fn delete_user(&self, user_id: i64) -> Result<bool, AuthError>;

    /// Persist a new refresh token.
    async fn create_refresh_token(&self, record: &RefreshTokenRecord) -> Result<(), AuthError>;

    /// Look up a refresh token by the hash of its opaque value.
    async fn find_refresh_token(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, AuthError>;

    /// Set `revoked_at` if the token exists and is not yet revoked.
    async fn revoke_refresh_token(
        &self,
        token_hash: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, AuthError>;

    /// Atomically revoke `old_hash` and insert `replacement`.
    ///
    /// Returns `false` (and inserts nothing) when `old_hash` is missing or
    /// already revoked, so only one of several concurrent rotations succeeds.
    async fn rotate_refresh_token(
        &self,
        old_hash: &str,
        at: DateTime<Utc>,
        replacement: &RefreshTokenRecord,
    ) -> Result<bool, AuthError>;

    /// Revoke every unrevoked refresh token owned by `user_id`.
    async fn revoke_user_refresh_tokens(
        &self,
        user_id: i64,
        at: DateTime<Utc>,
    ) -> Result<u64, AuthError>;

    /// Insert a new API key, returning the stored record.
    async fn create_api_key(&self, new_key: NewApiKey) -> Result<ApiKeyRecord, AuthError>;

    /// Insert a new API key unless its owner already holds `max_active` active
    /// keys as of `new_key.created_at`.
    ///
    /// The count and the insert are one step: concurrent callers for the same
    /// user never push the active count past `max_active`. Returns `None` when
    /// the cap is reached.
    async fn create_api_key_capped(
        &self,
        new_key: NewApiKey,
        max_active: usize,
    ) -> Result<Option<ApiKeyRecord>, AuthError>;

    /// Look up an API key by its numeric ID.
    async fn find_api_key(&self, key_id: i64) -> Result<Option<ApiKeyRecord>, AuthError>;

    /// Look up an API key by its token ID.
    async fn find_api_key_by_jti(&self, jti: &str) -> Result<Option<ApiKeyRecord>, AuthError>;

    /// List all API keys owned by `user_id`, newest first.
    async fn list_api_keys(&self, user_id: i64) -> Result<Vec<ApiKeyRecord>, AuthError>;

    /// Set `last_used_at = at` only when it is null or older than `stale_before`.
    ///
    /// Never touches `revoked_at`.
    async fn touch_api_key(
        &self,
        key_id: i64,
        at: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> Result<bool, AuthError>;

    /// Set `revoked_at` if the key is not yet revoked.
    async fn revoke_api_key(&self, key_id: i64, at: DateTime<Utc>) -> Result<bool, AuthError>;
}
