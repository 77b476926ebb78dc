//! Domain models shared by the credential engine and its callers.

pub mod auth;
