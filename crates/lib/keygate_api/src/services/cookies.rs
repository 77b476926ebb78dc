//! Auth cookies: session token, refresh token and CSRF token, set and cleared as a unit.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use keygate_core::auth::keys::Environment;
use keygate_core::auth::refresh_tokens::REFRESH_TOKEN_EXPIRY_DAYS;
use time::Duration;

/// Cookie name for the session token.
pub const ACCESS_COOKIE: &str = "access_token";
/// Cookie name for the refresh token.
pub const REFRESH_COOKIE: &str = "refresh_token";
/// Cookie name for the CSRF token. Readable by client script.
pub const CSRF_COOKIE: &str = "csrf_token";
/// Header that must echo the CSRF cookie on unsafe requests.
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Builds the three auth cookies with consistent attributes.
#[derive(Debug, Clone, Copy)]
pub struct CookieManager {
    secure: bool,
    session_ttl: Duration,
}

impl CookieManager {
    /// `Secure` is set everywhere except development.
    pub fn new(environment: Environment, session_ttl_secs: i64) -> Self {
        Self {
            secure: !environment.is_development(),
            session_ttl: Duration::seconds(session_ttl_secs),
        }
    }

    fn build(
        &self,
        name: &'static str,
        value: String,
        http_only: bool,
        max_age: Duration,
    ) -> Cookie<'static> {
        Cookie::build((name, value))
            .http_only(http_only)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .path("/")
            .max_age(max_age)
            .build()
    }

    pub fn access_cookie(&self, token: &str) -> Cookie<'static> {
        self.build(ACCESS_COOKIE, token.to_string(), true, self.session_ttl)
    }

    pub fn refresh_cookie(&self, token: &str) -> Cookie<'static> {
        self.build(
            REFRESH_COOKIE,
            token.to_string(),
            true,
            Duration::days(REFRESH_TOKEN_EXPIRY_DAYS),
        )
    }

    pub fn csrf_cookie(&self, token: &str) -> Cookie<'static> {
        self.build(CSRF_COOKIE, token.to_string(), false, self.session_ttl)
    }

    /// Add all three cookies to `jar`.
    pub fn set_all(&self, jar: CookieJar, access: &str, refresh: &str, csrf: &str) -> CookieJar {
        jar.add(self.access_cookie(access))
            .add(self.refresh_cookie(refresh))
            .add(self.csrf_cookie(csrf))
    }

    /// Expire all three cookies. Attributes match the originals so browsers drop them.
    pub fn clear_all(&self, jar: CookieJar) -> CookieJar {
        jar.add(self.build(ACCESS_COOKIE, String::new(), true, Duration::ZERO))
            .add(self.build(REFRESH_COOKIE, String::new(), true, Duration::ZERO))
            .add(self.build(CSRF_COOKIE, String::new(), false, Duration::ZERO))
    }
}
