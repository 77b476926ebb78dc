//! API server configuration.

use keygate_core::auth::jwt::{DEFAULT_SESSION_TTL_SECS, resolve_jwt_secret};
use keygate_core::auth::keys::{Environment, KeySource};

/// Configuration for the API server.
#[derive(Clone)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3100").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// HMAC secret for session tokens.
    pub jwt_secret: String,
    /// Deployment environment; controls cookie `Secure` and ephemeral keys.
    pub environment: Environment,
    /// Where the API-key signing key is loaded from.
    pub key_source: KeySource,
    /// Session token and CSRF cookie lifetime in seconds.
    pub session_ttl_secs: i64,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("bind_addr", &self.bind_addr)
            .field("environment", &self.environment)
            .field("key_source", &self.key_source)
            .field("session_ttl_secs", &self.session_ttl_secs)
            .finish_non_exhaustive()
    }
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable                       | Default                                 |
    /// |--------------------------------|-----------------------------------------|
    /// | `BIND_ADDR`                    | `127.0.0.1:3100`                        |
    /// | `DATABASE_URL`                 | `postgres://localhost:5432/keygate`     |
    /// | `JWT_SECRET` / `AUTH_SECRET`   | generated & persisted to file           |
    /// | `APP_ENV`                      | `development`                           |
    /// | `PAK_PRIVATE_KEY` / `_PATH`    | none                                    |
    /// | `SESSION_TTL_SECS`             | `900`                                   |
    pub fn from_env() -> Self {
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3100".into()),
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost:5432/keygate".into()),
            jwt_secret: resolve_jwt_secret(),
            environment: Environment::from_env(),
            key_source: KeySource::from_env(),
            session_ttl_secs: parse_ttl(std::env::var("SESSION_TTL_SECS").ok().as_deref()),
        }
    }
}

/// Positive integer seconds, falling back to the default otherwise.
fn parse_ttl(value: Option<&str>) -> i64 {
    value
        .and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|secs| *secs > 0)
        .unwrap_or(DEFAULT_SESSION_TTL_SECS)
}
