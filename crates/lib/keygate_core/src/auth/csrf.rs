//! CSRF double-submit validation.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use http::Method;
use rand::{RngCore, rng};

use super::constant_time_eq;

/// Random bytes per CSRF token.
const CSRF_TOKEN_BYTES: usize = 32;

/// Compares the `X-CSRF-Token` header with the `csrf_token` cookie.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsrfGuard;

impl CsrfGuard {
    /// A fresh random token, unrelated to any JWT.
    pub fn create_csrf_token() -> String {
        let mut bytes = [0u8; CSRF_TOKEN_BYTES];
        rng().fill_bytes(&mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }

    /// GET, HEAD and OPTIONS never need a CSRF token.
    pub fn is_safe_method(method: &Method) -> bool {
        matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
    }

    /// Whether a request may proceed.
    ///
    /// Safe methods always pass. Without a CSRF cookie there is nothing to
    /// compare against yet (pre-authentication), so the request passes too.
    /// Otherwise the header must be present and equal to the cookie.
    pub fn validate(method: &Method, header: Option<&str>, cookie: Option<&str>) -> bool {
        if Self::is_safe_method(method) {
            return true;
        }
        let Some(cookie) = cookie else {
            return true;
        };
        match header {
            Some(header) => constant_time_eq(header, cookie),
            None => false,
        }
    }
}
