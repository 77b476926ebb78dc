//! Refresh token lifecycle: issue, validate, rotate, revoke.
//!
//! ```text
//! Active --rotate--> Revoked   (replacement issued in the same transaction)
//! Active --revoke--> Revoked
//! Active --time----> Expired   (computed, never written)
//! ```

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use rand::{RngCore, rng};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use super::AuthError;
use crate::models::auth::{RefreshTokenRecord, RefreshTokenStatus, User};
use crate::store::AuthStore;

/// Refresh token lifetime: 30 days.
pub const REFRESH_TOKEN_EXPIRY_DAYS: i64 = 30;

/// Random bytes per token (256 bits).
const REFRESH_TOKEN_BYTES: usize = 32;

/// Generate a cryptographically random, URL-safe refresh token.
fn generate_refresh_token() -> String {
    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// SHA-256 hash a refresh token for storage.
fn hash_refresh_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Issues and rotates opaque refresh tokens backed by an [`AuthStore`].
#[derive(Clone)]
pub struct RefreshTokenLifecycle {
    store: Arc<dyn AuthStore>,
    ttl: Duration,
}

impl std::fmt::Debug for RefreshTokenLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshTokenLifecycle")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl RefreshTokenLifecycle {
    pub fn new(store: Arc<dyn AuthStore>) -> Self {
        Self {
            store,
            ttl: Duration::days(REFRESH_TOKEN_EXPIRY_DAYS),
        }
    }

    fn new_record(&self, user_id: i64) -> (String, RefreshTokenRecord) {
        let token = generate_refresh_token();
        let now = Utc::now();
        let record = RefreshTokenRecord {
            token_hash: hash_refresh_token(&token),
            user_id,
            issued_at: now,
            expires_at: now + self.ttl,
            revoked_at: None,
        };
        (token, record)
    }

    /// Issue and persist a new refresh token for `user`, returning the raw value.
    pub async fn issue(&self, user: &User) -> Result<String, AuthError> {
        let (token, record) = self.new_record(user.id);
        self.store.create_refresh_token(&record).await?;
        debug!(user_id = user.id, "issued refresh token");
        Ok(token)
    }

    /// Fetch the stored record for `token`, whatever its state.
    pub async fn lookup(&self, token: &str) -> Result<Option<RefreshTokenRecord>, AuthError> {
        self.store.find_refresh_token(&hash_refresh_token(token)).await
    }

    /// Return the record if `token` is currently usable.
    pub async fn validate(&self, token: &str) -> Result<RefreshTokenRecord, AuthError> {
        let record = self
            .lookup(token)
            .await?
            .ok_or_else(|| AuthError::TokenError("Invalid refresh token".into()))?;
        match record.status(Utc::now()) {
            RefreshTokenStatus::Active => Ok(record),
            RefreshTokenStatus::Revoked => Err(AuthError::Revoked),
            RefreshTokenStatus::Expired => Err(AuthError::Expired),
        }
    }

    /// Revoke `old_token` and issue its replacement for `user` atomically.
    ///
    /// Returns `None` without touching storage when `old_token` is unknown,
    /// owned by someone else, or expired. A token that is already revoked
    /// (including by a concurrent rotation) fails with `Revoked`.
    pub async fn rotate(&self, old_token: &str, user: &User) -> Result<Option<String>, AuthError> {
        let Some(old) = self.lookup(old_token).await? else {
            return Ok(None);
        };
        if old.user_id != user.id {
            return Ok(None);
        }
        match old.status(Utc::now()) {
            RefreshTokenStatus::Active => {}
            RefreshTokenStatus::Revoked => return Err(AuthError::Revoked),
            RefreshTokenStatus::Expired => return Ok(None),
        }

        let (token, replacement) = self.new_record(user.id);
        let rotated = self
            .store
            .rotate_refresh_token(&old.token_hash, replacement.issued_at, &replacement)
            .await?;
        if !rotated {
            info!(user_id = user.id, "concurrent refresh token rotation rejected");
            return Err(AuthError::Revoked);
        }
        debug!(user_id = user.id, "rotated refresh token");
        Ok(Some(token))
    }

    /// Revoke `token` if it exists and is not yet revoked. Idempotent.
    pub async fn revoke(&self, token: &str) -> Result<(), AuthError> {
        self.store
            .revoke_refresh_token(&hash_refresh_token(token), Utc::now())
            .await?;
        Ok(())
    }

    /// Revoke every refresh token held by `user` (logout everywhere).
    pub async fn revoke_all(&self, user: &User) -> Result<u64, AuthError> {
        let revoked = self
            .store
            .revoke_user_refresh_tokens(user.id, Utc::now())
            .await?;
        info!(user_id = user.id, revoked, "revoked all refresh tokens");
        Ok(revoked)
    }
}
