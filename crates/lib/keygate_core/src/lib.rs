//! # keygate_core
//!
//! Credential engine for Keygate: signing keys, session and API-key tokens,
//! refresh-token rotation, API-key revocation and CSRF double-submit checks.

pub mod auth;
pub mod migrate;
pub mod models;
pub mod store;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
pub(crate) mod test_support;
