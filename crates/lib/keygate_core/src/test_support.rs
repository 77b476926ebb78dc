//! Shared fixtures for unit tests.

use std::sync::{Arc, LazyLock};

use crate::auth::keys::KeyManager;
use crate::models::auth::User;
use crate::store::AuthStore;

pub(crate) const TEST_KEY_PEM: &str = include_str!("../tests/fixtures/pak_test_key.pem");
pub(crate) const OTHER_KEY_PEM: &str = include_str!("../tests/fixtures/pak_other_key.pem");

pub(crate) const SESSION_SECRET: &[u8] = b"test-session-secret-0123456789abcdef";

static TEST_KEYS: LazyLock<Arc<KeyManager>> = LazyLock::new(|| {
    Arc::new(KeyManager::from_pem(TEST_KEY_PEM).expect("test key fixture parses"))
});

pub(crate) fn test_keys() -> Arc<KeyManager> {
    Arc::clone(&TEST_KEYS)
}

pub(crate) async fn create_user(store: &dyn AuthStore, email: &str) -> User {
    store
        .create_user(email, "not-a-real-hash", "user")
        .await
        .expect("create test user")
}
