//! Authentication domain models.
//!
//! These are internal domain models, distinct from the API request/response
//! types (which use `#[serde(rename_all = "camelCase")]`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default role granted to newly registered users.
pub const DEFAULT_ROLE: &str = "user";

/// Role granted to the first registered user.
pub const ADMIN_ROLE: &str = "admin";

/// Scope list given to API keys issued without explicit scopes.
pub const WILDCARD_SCOPE: &str = "*";

/// Domain user. The email address is the subject carried in tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub role: String,
}

/// User with password hash (for internal auth flows).
#[derive(Debug, Clone)]
pub struct UserWithPassword {
    pub user: User,
    pub password_hash: Option<String>,
}

/// Computed lifecycle state of a refresh token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTokenStatus {
    Active,
    Revoked,
    Expired,
}

/// Refresh token record stored in the database.
///
/// Only the SHA-256 hash of the opaque value is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    pub token_hash: String,
    pub user_id: i64,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl RefreshTokenRecord {
    /// Status at `now`. Revocation takes precedence over expiry.
    pub fn status(&self, now: DateTime<Utc>) -> RefreshTokenStatus {
        if self.revoked_at.is_some() {
            RefreshTokenStatus::Revoked
        } else if now >= self.expires_at {
            RefreshTokenStatus::Expired
        } else {
            RefreshTokenStatus::Active
        }
    }
}

/// Personal API key record stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiKeyRecord {
    pub id: i64,
    pub user_id: i64,
    pub jti: String,
    #[serde(skip_serializing)]
    pub token_hash: String,
    pub label: Option<String>,
    pub scopes: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl ApiKeyRecord {
    /// Not revoked and not past `expires_at` (if any).
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.expires_at.is_none_or(|exp| now < exp)
    }
}

/// Fields required to insert a new API key; the store assigns `id`.
#[derive(Debug, Clone)]
pub struct NewApiKey {
    pub user_id: i64,
    pub jti: String,
    pub token_hash: String,
    pub label: Option<String>,
    pub scopes: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// JWT claims embedded in session tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject — user email.
    pub sub: String,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Expiry (unix timestamp).
    pub exp: i64,
}

/// JWT claims embedded in personal API key tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeyClaims {
    pub sub: String,
    pub jti: String,
    #[serde(rename = "type")]
    pub token_type: String,
    pub iat: i64,
    pub scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn key(expires_at: Option<DateTime<Utc>>, revoked_at: Option<DateTime<Utc>>) -> ApiKeyRecord {
        let now = Utc::now();
        ApiKeyRecord {
            id: 1,
            user_id: 1,
            jti: "jti".into(),
            token_hash: "hash".into(),
            label: None,
            scopes: vec![WILDCARD_SCOPE.into()],
            created_at: now - Duration::days(1),
            expires_at,
            last_used_at: None,
            revoked_at,
        }
    }

    #[test]
    fn api_key_without_expiry_is_active() {
        assert!(key(None, None).is_active(Utc::now()));
    }

    #[test]
    fn api_key_past_expiry_is_inactive() {
        let now = Utc::now();
        assert!(!key(Some(now - Duration::seconds(1)), None).is_active(now));
        assert!(!key(Some(now), None).is_active(now));
    }

    #[test]
    fn revoked_api_key_is_inactive() {
        let now = Utc::now();
        assert!(!key(Some(now + Duration::days(1)), Some(now)).is_active(now));
    }

    #[test]
    fn refresh_status_prefers_revoked_over_expired() {
        let now = Utc::now();
        let record = RefreshTokenRecord {
            token_hash: "h".into(),
            user_id: 1,
            issued_at: now - Duration::days(40),
            expires_at: now - Duration::days(10),
            revoked_at: Some(now - Duration::days(20)),
        };
        assert_eq!(record.status(now), RefreshTokenStatus::Revoked);

        let expired = RefreshTokenRecord {
            revoked_at: None,
            ..record
        };
        assert_eq!(expired.status(now), RefreshTokenStatus::Expired);
    }

    #[test]
    fn api_key_claims_omit_missing_exp() {
        let claims = ApiKeyClaims {
            sub: "a@x.com".into(),
            jti: "j".into(),
            token_type: "api_key".into(),
            iat: 1,
            scopes: vec!["*".into()],
            exp: None,
        };
        let json = serde_json::to_value(&claims).unwrap();
        assert!(json.get("exp").is_none());
        assert_eq!(json["type"], "api_key");
    }
}
