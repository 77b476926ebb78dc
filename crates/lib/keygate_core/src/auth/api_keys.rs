//! Personal API key management.
//!
//! Long-lived bearer tokens for programmatic access. Only the token's SHA-256
//! hash and `jti` are stored; the raw token is returned once, at issuance.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use super::api_key_token::ApiKeyTokenCodec;
use super::{AuthError, constant_time_eq};
use crate::models::auth::{ApiKeyRecord, NewApiKey, User, WILDCARD_SCOPE};
use crate::store::AuthStore;

/// Maximum number of concurrently active keys per user.
pub const MAX_ACTIVE_API_KEYS: usize = 20;

/// Longest lifetime a caller may request for a key.
pub const MAX_API_KEY_TTL_DAYS: i64 = 3650;

/// Minimum interval between persisted `last_used_at` updates.
pub const USAGE_THROTTLE_SECS: i64 = 10 * 60;

/// Issues, verifies and revokes personal API keys.
#[derive(Clone)]
pub struct ApiKeyStore {
    store: Arc<dyn AuthStore>,
    codec: ApiKeyTokenCodec,
    max_active: usize,
    usage_throttle: Duration,
}

impl std::fmt::Debug for ApiKeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyStore")
            .field("max_active", &self.max_active)
            .field("usage_throttle", &self.usage_throttle)
            .finish_non_exhaustive()
    }
}

impl ApiKeyStore {
    pub fn new(store: Arc<dyn AuthStore>, codec: ApiKeyTokenCodec) -> Self {
        Self {
            store,
            codec,
            max_active: MAX_ACTIVE_API_KEYS,
            usage_throttle: Duration::seconds(USAGE_THROTTLE_SECS),
        }
    }

    pub fn with_usage_throttle(mut self, throttle: Duration) -> Self {
        self.usage_throttle = throttle;
        self
    }

    pub fn codec(&self) -> &ApiKeyTokenCodec {
        &self.codec
    }

    /// Issue a new key for `user`. Returns the stored record and the raw token.
    ///
    /// `ttl_days`, when given, must be between 1 and [`MAX_API_KEY_TTL_DAYS`];
    /// without it the key never expires.
    pub async fn issue(
        &self,
        user: &User,
        label: Option<&str>,
        ttl_days: Option<i64>,
    ) -> Result<(ApiKeyRecord, String), AuthError> {
        let now = Utc::now();
        let expires_at = ttl_days.map(|days| expiry_after(now, days)).transpose()?;

        let jti = Uuid::new_v4().to_string();
        let scopes = vec![WILDCARD_SCOPE.to_string()];
        let token = self
            .codec
            .encode_at(&user.email, &jti, &scopes, now, expires_at)?;

        let record = self
            .store
            .create_api_key_capped(
                NewApiKey {
                    user_id: user.id,
                    jti,
                    token_hash: ApiKeyTokenCodec::hash(&token),
                    label: label.map(str::to_string),
                    scopes,
                    created_at: now,
                    expires_at,
                },
                self.max_active,
            )
            .await?
            .ok_or(AuthError::LimitExceeded {
                limit: self.max_active,
            })?;

        info!(user_id = user.id, key_id = record.id, "issued API key");
        Ok((record, token))
    }

    /// Look up by `jti` and return the record only if it is active and its
    /// stored hash equals `token_hash`.
    pub async fn verify_by_hash(
        &self,
        token_hash: &str,
        jti: &str,
    ) -> Result<Option<ApiKeyRecord>, AuthError> {
        let Some(record) = self.store.find_api_key_by_jti(jti).await? else {
            return Ok(None);
        };
        if !record.is_active(Utc::now()) {
            return Ok(None);
        }
        if !constant_time_eq(&record.token_hash, token_hash) {
            return Ok(None);
        }
        Ok(Some(record))
    }

    /// Revoke a key owned by `user`.
    ///
    /// Returns `false` when the key does not exist or belongs to someone else;
    /// the two cases are indistinguishable to the caller.
    pub async fn revoke(&self, user: &User, key_id: i64) -> Result<bool, AuthError> {
        let Some(record) = self.store.find_api_key(key_id).await? else {
            return Ok(false);
        };
        if record.user_id != user.id {
            return Ok(false);
        }
        if record.revoked_at.is_some() {
            return Err(AuthError::AlreadyRevoked);
        }
        if !self.store.revoke_api_key(key_id, Utc::now()).await? {
            // Lost a race with a concurrent revocation.
            return Err(AuthError::AlreadyRevoked);
        }
        info!(user_id = user.id, key_id, "revoked API key");
        Ok(true)
    }

    /// List keys owned by `user`, newest first.
    pub async fn list(&self, user: &User) -> Result<Vec<ApiKeyRecord>, AuthError> {
        self.store.list_api_keys(user.id).await
    }

    /// Record that `record` was just used, at most once per throttle window.
    ///
    /// Failures are logged and swallowed. Returns whether a write landed.
    pub async fn record_usage(&self, record: &ApiKeyRecord) -> bool {
        self.record_usage_at(record, Utc::now()).await
    }

    async fn record_usage_at(&self, record: &ApiKeyRecord, now: DateTime<Utc>) -> bool {
        if record
            .last_used_at
            .is_some_and(|last| now - last <= self.usage_throttle)
        {
            return false;
        }
        match self
            .store
            .touch_api_key(record.id, now, now - self.usage_throttle)
            .await
        {
            Ok(written) => written,
            Err(e) => {
                warn!(key_id = record.id, error = %e, "failed to record API key usage");
                false
            }
        }
    }
}

/// Expiry `days` after `now`, rejecting lifetimes outside the accepted range.
fn expiry_after(now: DateTime<Utc>, days: i64) -> Result<DateTime<Utc>, AuthError> {
    if !(1..=MAX_API_KEY_TTL_DAYS).contains(&days) {
        return Err(AuthError::ValidationError(format!(
            "ttl_days must be between 1 and {MAX_API_KEY_TTL_DAYS}"
        )));
    }
    Duration::try_days(days)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(|| AuthError::ValidationError("ttl_days is out of range".into()))
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::models::auth::{RefreshTokenRecord, UserWithPassword};
    use crate::store::memory::InMemoryStore;
    use crate::test_support::{create_user, test_keys};

    fn api_keys(store: Arc<InMemoryStore>) -> ApiKeyStore {
        ApiKeyStore::new(store, ApiKeyTokenCodec::new(test_keys()))
    }

    #[tokio::test]
    async fn issue_returns_token_matching_record() {
        let store = Arc::new(InMemoryStore::new());
        let user = create_user(store.as_ref(), "a@x.com").await;
        let keys = api_keys(store);

        let (record, token) = keys.issue(&user, Some("ci"), Some(30)).await.unwrap();
        assert_eq!(record.label.as_deref(), Some("ci"));
        assert_eq!(record.scopes, vec!["*".to_string()]);
        assert_eq!(record.token_hash, ApiKeyTokenCodec::hash(&token));
        assert!(record.expires_at.unwrap() > record.created_at);

        let claims = keys.codec().verify(&token).unwrap();
        assert_eq!(claims.jti, record.jti);
        assert_eq!(claims.exp, record.expires_at.map(|t| t.timestamp()));
    }

    #[tokio::test]
    async fn out_of_range_ttl_is_rejected() {
        let store = Arc::new(InMemoryStore::new());
        let user = create_user(store.as_ref(), "a@x.com").await;
        let keys = api_keys(store.clone());
        for days in [0, -1, i64::MIN, MAX_API_KEY_TTL_DAYS + 1, 100_000_000, i64::MAX] {
            let err = keys.issue(&user, None, Some(days)).await.unwrap_err();
            assert!(matches!(err, AuthError::ValidationError(_)), "days={days}");
        }
        assert!(store.list_api_keys(user.id).await.unwrap().is_empty());

        let (record, _) = keys
            .issue(&user, None, Some(MAX_API_KEY_TTL_DAYS))
            .await
            .unwrap();
        assert!(record.expires_at.is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_issuance_respects_cap() {
        let store = Arc::new(InMemoryStore::new());
        let user = create_user(store.as_ref(), "a@x.com").await;
        let keys = api_keys(store.clone());

        let handles: Vec<_> = (0..30)
            .map(|_| {
                let keys = keys.clone();
                let user = user.clone();
                tokio::spawn(async move { keys.issue(&user, None, None).await })
            })
            .collect();

        let mut issued = 0;
        let mut refused = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => issued += 1,
                Err(AuthError::LimitExceeded { limit: 20 }) => refused += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(issued, MAX_ACTIVE_API_KEYS);
        assert_eq!(refused, 10);

        let now = Utc::now();
        let active = store
            .list_api_keys(user.id)
            .await
            .unwrap()
            .iter()
            .filter(|k| k.is_active(now))
            .count();
        assert_eq!(active, MAX_ACTIVE_API_KEYS);
    }

    #[tokio::test]
    async fn active_key_cap_is_enforced() {
        let store = Arc::new(InMemoryStore::new());
        let user = create_user(store.as_ref(), "a@x.com").await;
        let keys = api_keys(store);

        let mut issued = Vec::new();
        for _ in 0..MAX_ACTIVE_API_KEYS {
            issued.push(keys.issue(&user, None, None).await.unwrap().0);
        }
        let err = keys.issue(&user, None, None).await.unwrap_err();
        assert!(matches!(err, AuthError::LimitExceeded { limit: 20 }));

        assert!(keys.revoke(&user, issued[0].id).await.unwrap());
        assert!(keys.issue(&user, None, None).await.is_ok());
    }

    #[tokio::test]
    async fn cap_is_per_user() {
        let store = Arc::new(InMemoryStore::new());
        let alice = create_user(store.as_ref(), "a@x.com").await;
        let bob = create_user(store.as_ref(), "b@x.com").await;
        let keys = api_keys(store);
        for _ in 0..MAX_ACTIVE_API_KEYS {
            keys.issue(&alice, None, None).await.unwrap();
        }
        assert!(keys.issue(&bob, None, None).await.is_ok());
    }

    #[tokio::test]
    async fn verify_by_hash_requires_exact_hash() {
        let store = Arc::new(InMemoryStore::new());
        let user = create_user(store.as_ref(), "a@x.com").await;
        let keys = api_keys(store);
        let (record, token) = keys.issue(&user, None, None).await.unwrap();
        let hash = ApiKeyTokenCodec::hash(&token);

        assert_eq!(
            keys.verify_by_hash(&hash, &record.jti).await.unwrap(),
            Some(record.clone())
        );
        let wrong = ApiKeyTokenCodec::hash("something else");
        assert!(keys.verify_by_hash(&wrong, &record.jti).await.unwrap().is_none());
        assert!(keys.verify_by_hash(&hash, "other-jti").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn verify_by_hash_rejects_revoked_key() {
        let store = Arc::new(InMemoryStore::new());
        let user = create_user(store.as_ref(), "a@x.com").await;
        let keys = api_keys(store);
        let (record, token) = keys.issue(&user, None, None).await.unwrap();
        keys.revoke(&user, record.id).await.unwrap();

        let hash = ApiKeyTokenCodec::hash(&token);
        assert!(keys.verify_by_hash(&hash, &record.jti).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn verify_by_hash_rejects_expired_record() {
        let store = Arc::new(InMemoryStore::new());
        let user = create_user(store.as_ref(), "a@x.com").await;
        let keys = api_keys(store.clone());
        let created_at = Utc::now() - Duration::days(10);
        let record = store
            .create_api_key(NewApiKey {
                user_id: user.id,
                jti: "expired-jti".into(),
                token_hash: ApiKeyTokenCodec::hash("tok"),
                label: None,
                scopes: vec!["*".into()],
                created_at,
                expires_at: Some(created_at + Duration::days(1)),
            })
            .await
            .unwrap();

        let hash = ApiKeyTokenCodec::hash("tok");
        assert!(keys.verify_by_hash(&hash, &record.jti).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn revoke_hides_keys_of_other_users() {
        let store = Arc::new(InMemoryStore::new());
        let alice = create_user(store.as_ref(), "a@x.com").await;
        let mallory = create_user(store.as_ref(), "m@x.com").await;
        let keys = api_keys(store.clone());
        let (record, _) = keys.issue(&alice, None, None).await.unwrap();

        assert!(!keys.revoke(&mallory, record.id).await.unwrap());
        assert!(!keys.revoke(&mallory, 9999).await.unwrap());
        let stored = store.find_api_key(record.id).await.unwrap().unwrap();
        assert!(stored.revoked_at.is_none());
    }

    #[tokio::test]
    async fn revoke_twice_is_already_revoked() {
        let store = Arc::new(InMemoryStore::new());
        let user = create_user(store.as_ref(), "a@x.com").await;
        let keys = api_keys(store);
        let (record, _) = keys.issue(&user, None, None).await.unwrap();

        assert!(keys.revoke(&user, record.id).await.unwrap());
        let err = keys.revoke(&user, record.id).await.unwrap_err();
        assert!(matches!(err, AuthError::AlreadyRevoked));
    }

    #[tokio::test]
    async fn usage_is_throttled() {
        let store = Arc::new(InMemoryStore::new());
        let user = create_user(store.as_ref(), "a@x.com").await;
        let keys = api_keys(store.clone());
        let (record, _) = keys.issue(&user, None, None).await.unwrap();

        let t0 = Utc::now();
        assert!(keys.record_usage_at(&record, t0).await);
        let fresh = store.find_api_key(record.id).await.unwrap().unwrap();
        assert!(!keys.record_usage_at(&fresh, t0 + Duration::minutes(5)).await);
        // A stale in-memory copy still cannot slip a second write through.
        assert!(!keys.record_usage_at(&record, t0 + Duration::minutes(5)).await);
        assert_eq!(store.api_key_touches(), 1);

        assert!(keys.record_usage_at(&fresh, t0 + Duration::minutes(11)).await);
        assert_eq!(store.api_key_touches(), 2);
    }

    #[tokio::test]
    async fn usage_never_reactivates_revoked_key() {
        let store = Arc::new(InMemoryStore::new());
        let user = create_user(store.as_ref(), "a@x.com").await;
        let keys = api_keys(store.clone());
        let (record, _) = keys.issue(&user, None, None).await.unwrap();
        keys.revoke(&user, record.id).await.unwrap();

        // `record` is a pre-revocation snapshot.
        keys.record_usage(&record).await;
        let stored = store.find_api_key(record.id).await.unwrap().unwrap();
        assert!(stored.revoked_at.is_some());
        assert!(!stored.is_active(Utc::now()));
    }

    /// Store whose API-key touch always fails.
    struct FailingTouch(InMemoryStore);

    #[async_trait]
    impl AuthStore for FailingTouch {
        async fn find_user_by_email(&self, e: &str) -> Result<Option<UserWithPassword>, AuthError> {
            self.0.find_user_by_email(e).await
        }
        async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, AuthError> {
            self.0.find_user_by_id(id).await
        }
        async fn create_user(&self, e: &str, h: &str, r: &str) -> Result<User, AuthError> {
            self.0.create_user(e, h, r).await
        }
        async fn user_count(&self) -> Result<i64, AuthError> {
            self.0.user_count().await
        }
        async fn delete_user(&self, id: i64) -> Result<bool, AuthError> {
            self.0.delete_user(id).await
        }
        async fn create_refresh_token(&self, r: &RefreshTokenRecord) -> Result<(), AuthError> {
            self.0.create_refresh_token(r).await
        }
        async fn find_refresh_token(&self, h: &str) -> Result<Option<RefreshTokenRecord>, AuthError> {
            self.0.find_refresh_token(h).await
        }
        async fn revoke_refresh_token(&self, h: &str, at: DateTime<Utc>) -> Result<bool, AuthError> {
            self.0.revoke_refresh_token(h, at).await
        }
        async fn rotate_refresh_token(
            &self,
            h: &str,
            at: DateTime<Utc>,
            r: &RefreshTokenRecord,
        ) -> Result<bool, AuthError> {
            self.0.rotate_refresh_token(h, at, r).await
        }
        async fn revoke_user_refresh_tokens(&self, id: i64, at: DateTime<Utc>) -> Result<u64, AuthError> {
            self.0.revoke_user_refresh_tokens(id, at).await
        }
        async fn create_api_key(&self, k: NewApiKey) -> Result<ApiKeyRecord, AuthError> {
            self.0.create_api_key(k).await
        }
        async fn create_api_key_capped(
            &self,
            k: NewApiKey,
            max: usize,
        ) -> Result<Option<ApiKeyRecord>, AuthError> {
            self.0.create_api_key_capped(k, max).await
        }
        async fn find_api_key(&self, id: i64) -> Result<Option<ApiKeyRecord>, AuthError> {
            self.0.find_api_key(id).await
        }
        async fn find_api_key_by_jti(&self, j: &str) -> Result<Option<ApiKeyRecord>, AuthError> {
            self.0.find_api_key_by_jti(j).await
        }
        async fn list_api_keys(&self, id: i64) -> Result<Vec<ApiKeyRecord>, AuthError> {
            self.0.list_api_keys(id).await
        }
        async fn touch_api_key(&self, _: i64, _: DateTime<Utc>, _: DateTime<Utc>) -> Result<bool, AuthError> {
            Err(AuthError::Internal("disk on fire".into()))
        }
        async fn revoke_api_key(&self, id: i64, at: DateTime<Utc>) -> Result<bool, AuthError> {
            self.0.revoke_api_key(id, at).await
        }
    }

    #[tokio::test]
    async fn usage_failure_is_swallowed() {
        let store = Arc::new(FailingTouch(InMemoryStore::new()));
        let user = create_user(store.as_ref(), "a@x.com").await;
        let keys = ApiKeyStore::new(store, ApiKeyTokenCodec::new(test_keys()));
        let (record, _) = keys.issue(&user, None, None).await.unwrap();
        assert!(!keys.record_usage(&record).await);
    }
}
