//! In-memory `AuthStore` for tests and database-less development runs.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::AuthStore;
use crate::auth::AuthError;
use crate::models::auth::{
    ApiKeyRecord, NewApiKey, RefreshTokenRecord, User, UserWithPassword,
};

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<i64, UserWithPassword>,
    last_user_id: i64,
    refresh_tokens: HashMap<String, RefreshTokenRecord>,
    api_keys: BTreeMap<i64, ApiKeyRecord>,
    last_api_key_id: i64,
}

/// `AuthStore` backed by process memory. All data is lost on drop.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    api_key_touches: AtomicU64,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `last_used_at` writes that actually landed.
    pub fn api_key_touches(&self) -> u64 {
        self.api_key_touches.load(Ordering::SeqCst)
    }
}

fn insert_api_key(tables: &mut Tables, new_key: NewApiKey) -> Result<ApiKeyRecord, AuthError> {
    if tables
        .api_keys
        .values()
        .any(|k| k.jti == new_key.jti || k.token_hash == new_key.token_hash)
    {
        return Err(AuthError::Internal("duplicate API key".into()));
    }
    tables.last_api_key_id += 1;
    let record = ApiKeyRecord {
        id: tables.last_api_key_id,
        user_id: new_key.user_id,
        jti: new_key.jti,
        token_hash: new_key.token_hash,
        label: new_key.label,
        scopes: new_key.scopes,
        created_at: new_key.created_at,
        expires_at: new_key.expires_at,
        last_used_at: None,
        revoked_at: None,
    };
    tables.api_keys.insert(record.id, record.clone());
    Ok(record)
}

#[async_trait]
impl AuthStore for InMemoryStore {
    async fn find_user_by_email(
        &self,
        email: &str,
    ) -> Result<Option<UserWithPassword>, AuthError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.user.email == email)
            .cloned())
    }

    async fn find_user_by_id(&self, user_id: i64) -> Result<Option<User>, AuthError> {
        let tables = self.tables.read().await;
        Ok(tables.users.get(&user_id).map(|u| u.user.clone()))
    }

    async fn create_user(
        &self,
        email: &str,
        password_hash: &str,
        role: &str,
    ) -> Result<User, AuthError> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.user.email == email) {
            return Err(AuthError::ValidationError("Email already registered".into()));
        }
        tables.last_user_id += 1;
        let user = User {
            id: tables.last_user_id,
            email: email.to_string(),
            role: role.to_string(),
        };
        tables.users.insert(
            user.id,
            UserWithPassword {
                user: user.clone(),
                password_hash: Some(password_hash.to_string()),
            },
        );
        Ok(user)
    }

    async fn user_count(&self) -> Result<i64, AuthError> {
        Ok(self.tables.read().await.users.len() as i64)
    }

    async fn delete_user(&self, user_id: i64) -> Result<bool, AuthError> {
        let mut tables = self.tables.write().await;
        if tables.users.remove(&user_id).is_none() {
            return Ok(false);
        }
        tables.refresh_tokens.retain(|_, t| t.user_id != user_id);
        tables.api_keys.retain(|_, k| k.user_id != user_id);
        Ok(true)
    }

    async fn create_refresh_token(&self, record: &RefreshTokenRecord) -> Result<(), AuthError> {
        let mut tables = self.tables.write().await;
        if tables.refresh_tokens.contains_key(&record.token_hash) {
            return Err(AuthError::Internal("duplicate refresh token".into()));
        }
        tables
            .refresh_tokens
            .insert(record.token_hash.clone(), record.clone());
        Ok(())
    }

    async fn find_refresh_token(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, AuthError> {
        Ok(self.tables.read().await.refresh_tokens.get(token_hash).cloned())
    }

    async fn revoke_refresh_token(
        &self,
        token_hash: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, AuthError> {
        let mut tables = self.tables.write().await;
        match tables.refresh_tokens.get_mut(token_hash) {
            Some(record) if record.revoked_at.is_none() => {
                record.revoked_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn rotate_refresh_token(
        &self,
        old_hash: &str,
        at: DateTime<Utc>,
        replacement: &RefreshTokenRecord,
    ) -> Result<bool, AuthError> {
        // One write guard covers both steps.
        let mut tables = self.tables.write().await;
        if tables.refresh_tokens.contains_key(&replacement.token_hash) {
            return Err(AuthError::Internal("duplicate refresh token".into()));
        }
        match tables.refresh_tokens.get_mut(old_hash) {
            Some(old) if old.revoked_at.is_none() => old.revoked_at = Some(at),
            _ => return Ok(false),
        }
        tables
            .refresh_tokens
            .insert(replacement.token_hash.clone(), replacement.clone());
        Ok(true)
    }

    async fn revoke_user_refresh_tokens(
        &self,
        user_id: i64,
        at: DateTime<Utc>,
    ) -> Result<u64, AuthError> {
        let mut tables = self.tables.write().await;
        let mut revoked = 0;
        for record in tables.refresh_tokens.values_mut() {
            if record.user_id == user_id && record.revoked_at.is_none() {
                record.revoked_at = Some(at);
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn create_api_key(&self, new_key: NewApiKey) -> Result<ApiKeyRecord, AuthError> {
        let mut tables = self.tables.write().await;
        insert_api_key(&mut tables, new_key)
    }

    async fn create_api_key_capped(
        &self,
        new_key: NewApiKey,
        max_active: usize,
    ) -> Result<Option<ApiKeyRecord>, AuthError> {
        // Count and insert under one write guard.
        let mut tables = self.tables.write().await;
        let active = tables
            .api_keys
            .values()
            .filter(|k| k.user_id == new_key.user_id && k.is_active(new_key.created_at))
            .count();
        if active >= max_active {
            return Ok(None);
        }
        insert_api_key(&mut tables, new_key).map(Some)
    }

    async fn find_api_key(&self, key_id: i64) -> Result<Option<ApiKeyRecord>, AuthError> {
        Ok(self.tables.read().await.api_keys.get(&key_id).cloned())
    }

    async fn find_api_key_by_jti(&self, jti: &str) -> Result<Option<ApiKeyRecord>, AuthError> {
        let tables = self.tables.read().await;
        Ok(tables.api_keys.values().find(|k| k.jti == jti).cloned())
    }

    async fn list_api_keys(&self, user_id: i64) -> Result<Vec<ApiKeyRecord>, AuthError> {
        let tables = self.tables.read().await;
        let mut keys: Vec<ApiKeyRecord> = tables
            .api_keys
            .values()
            .filter(|k| k.user_id == user_id)
            .cloned()
            .collect();
        keys.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(keys)
    }

    async fn touch_api_key(
        &self,
        key_id: i64,
        at: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> Result<bool, AuthError> {
        let mut tables = self.tables.write().await;
        let Some(record) = tables.api_keys.get_mut(&key_id) else {
            return Ok(false);
        };
        if record.last_used_at.is_some_and(|last| last >= stale_before) {
            return Ok(false);
        }
        record.last_used_at = Some(at);
        self.api_key_touches.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    async fn revoke_api_key(&self, key_id: i64, at: DateTime<Utc>) -> Result<bool, AuthError> {
        let mut tables = self.tables.write().await;
        match tables.api_keys.get_mut(&key_id) {
            Some(record) if record.revoked_at.is_none() => {
                record.revoked_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
