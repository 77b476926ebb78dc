//! PostgreSQL `AuthStore`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use super::AuthStore;
use crate::auth::AuthError;
use crate::models::auth::{
    ApiKeyRecord, NewApiKey, RefreshTokenRecord, User, UserWithPassword,
};

const API_KEY_COLUMNS: &str = "id, user_id, jti, token_hash, label, scopes, \
     created_at, expires_at, last_used_at, revoked_at";

#[derive(sqlx::FromRow)]
struct ApiKeyRow {
    id: i64,
    user_id: i64,
    jti: String,
    token_hash: String,
    label: Option<String>,
    scopes: Vec<String>,
    created_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    last_used_at: Option<DateTime<Utc>>,
    revoked_at: Option<DateTime<Utc>>,
}

impl From<ApiKeyRow> for ApiKeyRecord {
    fn from(row: ApiKeyRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            jti: row.jti,
            token_hash: row.token_hash,
            label: row.label,
            scopes: row.scopes,
            created_at: row.created_at,
            expires_at: row.expires_at,
            last_used_at: row.last_used_at,
            revoked_at: row.revoked_at,
        }
    }
}

type RefreshRow = (
    String,
    i64,
    DateTime<Utc>,
    DateTime<Utc>,
    Option<DateTime<Utc>>,
);

fn refresh_from_row(
    (token_hash, user_id, issued_at, expires_at, revoked_at): RefreshRow,
) -> RefreshTokenRecord {
    RefreshTokenRecord {
        token_hash,
        user_id,
        issued_at,
        expires_at,
        revoked_at,
    }
}

async fn insert_api_key(
    conn: &mut PgConnection,
    new_key: &NewApiKey,
) -> Result<ApiKeyRecord, AuthError> {
    let row = sqlx::query_as::<_, ApiKeyRow>(&format!(
        "INSERT INTO api_keys (user_id, jti, token_hash, label, scopes, created_at, expires_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         RETURNING {API_KEY_COLUMNS}"
    ))
    .bind(new_key.user_id)
    .bind(&new_key.jti)
    .bind(&new_key.token_hash)
    .bind(&new_key.label)
    .bind(&new_key.scopes)
    .bind(new_key.created_at)
    .bind(new_key.expires_at)
    .fetch_one(conn)
    .await?;
    Ok(row.into())
}

/// `AuthStore` backed by a PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl AuthStore for PgStore {
    async fn find_user_by_email(
        &self,
        email: &str,
    ) -> Result<Option<UserWithPassword>, AuthError> {
        let row = sqlx::query_as::<_, (i64, String, String, Option<String>)>(
            "SELECT id, email, role, password_hash FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(id, email, role, password_hash)| UserWithPassword {
            user: User { id, email, role },
            password_hash,
        }))
    }

    async fn find_user_by_id(&self, user_id: i64) -> Result<Option<User>, AuthError> {
        let row = sqlx::query_as::<_, (i64, String, String)>(
            "SELECT id, email, role FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(id, email, role)| User { id, email, role }))
    }

    async fn create_user(
        &self,
        email: &str,
        password_hash: &str,
        role: &str,
    ) -> Result<User, AuthError> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO users (email, password_hash, role) VALUES ($1, $2, $3) \
             ON CONFLICT (email) DO NOTHING RETURNING id",
        )
        .bind(email)
        .bind(password_hash)
        .bind(role)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AuthError::ValidationError("Email already registered".into()))?;
        Ok(User {
            id,
            email: email.to_string(),
            role: role.to_string(),
        })
    }

    async fn user_count(&self) -> Result<i64, AuthError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn delete_user(&self, user_id: i64) -> Result<bool, AuthError> {
        // refresh_tokens and api_keys cascade via foreign keys.
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_refresh_token(&self, record: &RefreshTokenRecord) -> Result<(), AuthError> {
        sqlx::query(
            "INSERT INTO refresh_tokens (token_hash, user_id, issued_at, expires_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(&record.token_hash)
        .bind(record.user_id)
        .bind(record.issued_at)
        .bind(record.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_refresh_token(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, AuthError> {
        let row = sqlx::query_as::<_, RefreshRow>(
            "SELECT token_hash, user_id, issued_at, expires_at, revoked_at \
             FROM refresh_tokens WHERE token_hash = $1",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(refresh_from_row))
    }

    async fn revoke_refresh_token(
        &self,
        token_hash: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, AuthError> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = $2 \
             WHERE token_hash = $1 AND revoked_at IS NULL",
        )
        .bind(token_hash)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn rotate_refresh_token(
        &self,
        old_hash: &str,
        at: DateTime<Utc>,
        replacement: &RefreshTokenRecord,
    ) -> Result<bool, AuthError> {
        let mut tx = self.pool.begin().await?;

        let revoked = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = $2 \
             WHERE token_hash = $1 AND revoked_at IS NULL",
        )
        .bind(old_hash)
        .bind(at)
        .execute(&mut *tx)
        .await?;

        if revoked.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO refresh_tokens (token_hash, user_id, issued_at, expires_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(&replacement.token_hash)
        .bind(replacement.user_id)
        .bind(replacement.issued_at)
        .bind(replacement.expires_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn revoke_user_refresh_tokens(
        &self,
        user_id: i64,
        at: DateTime<Utc>,
    ) -> Result<u64, AuthError> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = $2 \
             WHERE user_id = $1 AND revoked_at IS NULL",
        )
        .bind(user_id)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn create_api_key(&self, new_key: NewApiKey) -> Result<ApiKeyRecord, AuthError> {
        let mut conn = self.pool.acquire().await?;
        insert_api_key(&mut *conn, &new_key).await
    }

    async fn create_api_key_capped(
        &self,
        new_key: NewApiKey,
        max_active: usize,
    ) -> Result<Option<ApiKeyRecord>, AuthError> {
        let mut tx = self.pool.begin().await?;

        // Serialises issuance per user until commit.
        sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(new_key.user_id)
            .fetch_optional(&mut *tx)
            .await?;

        let active = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM api_keys \
             WHERE user_id = $1 AND revoked_at IS NULL \
             AND (expires_at IS NULL OR expires_at > $2)",
        )
        .bind(new_key.user_id)
        .bind(new_key.created_at)
        .fetch_one(&mut *tx)
        .await?;

        if usize::try_from(active).unwrap_or(usize::MAX) >= max_active {
            tx.rollback().await?;
            return Ok(None);
        }

        let record = insert_api_key(&mut *tx, &new_key).await?;
        tx.commit().await?;
        Ok(Some(record))
    }

    async fn find_api_key(&self, key_id: i64) -> Result<Option<ApiKeyRecord>, AuthError> {
        let row = sqlx::query_as::<_, ApiKeyRow>(&format!(
            "SELECT {API_KEY_COLUMNS} FROM api_keys WHERE id = $1"
        ))
        .bind(key_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn find_api_key_by_jti(&self, jti: &str) -> Result<Option<ApiKeyRecord>, AuthError> {
        let row = sqlx::query_as::<_, ApiKeyRow>(&format!(
            "SELECT {API_KEY_COLUMNS} FROM api_keys WHERE jti = $1"
        ))
        .bind(jti)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn list_api_keys(&self, user_id: i64) -> Result<Vec<ApiKeyRecord>, AuthError> {
        let rows = sqlx::query_as::<_, ApiKeyRow>(&format!(
            "SELECT {API_KEY_COLUMNS} FROM api_keys \
             WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn touch_api_key(
        &self,
        key_id: i64,
        at: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> Result<bool, AuthError> {
        let result = sqlx::query(
            "UPDATE api_keys SET last_used_at = $2 \
             WHERE id = $1 AND (last_used_at IS NULL OR last_used_at < $3)",
        )
        .bind(key_id)
        .bind(at)
        .bind(stale_before)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn revoke_api_key(&self, key_id: i64, at: DateTime<Utc>) -> Result<bool, AuthError> {
        let result = sqlx::query(
            "UPDATE api_keys SET revoked_at = $2 WHERE id = $1 AND revoked_at IS NULL",
        )
        .bind(key_id)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
