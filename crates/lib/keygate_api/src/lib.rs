//! # keygate_api
//!
//! HTTP API library for Keygate: session cookies, refresh rotation, personal
//! API key management and JWKS discovery over `keygate_core`.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post};
use keygate_core::auth::api_key_token::ApiKeyTokenCodec;
use keygate_core::auth::api_keys::ApiKeyStore;
use keygate_core::auth::jwt::SessionTokenCodec;
use keygate_core::auth::keys::KeyManager;
use keygate_core::auth::refresh_tokens::RefreshTokenLifecycle;
use keygate_core::auth::resolver::AuthenticationResolver;
use keygate_core::store::AuthStore;
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::handlers::{api_keys, auth, jwks};
use crate::services::cookies::CookieManager;

/// Route paths.
pub mod routes {
    pub const POST_AUTH_REGISTER: &str = "/auth/register";
    pub const POST_AUTH_LOGIN: &str = "/auth/login";
    pub const POST_AUTH_REFRESH: &str = "/auth/refresh";
    pub const POST_AUTH_LOGOUT: &str = "/auth/logout";
    pub const GET_AUTH_ME: &str = "/auth/me";
    pub const AUTH_API_KEYS: &str = "/auth/api-keys";
    pub const DELETE_AUTH_API_KEYS_ID: &str = "/auth/api-keys/{id}";
    pub const GET_JWKS: &str = "/.well-known/jwks.json";
}

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn AuthStore>,
    pub keys: Arc<KeyManager>,
    pub sessions: SessionTokenCodec,
    pub api_keys: ApiKeyStore,
    pub refresh_tokens: RefreshTokenLifecycle,
    pub resolver: AuthenticationResolver,
    pub cookies: CookieManager,
    pub config: ApiConfig,
}

impl AppState {
    /// Wire the credential engine from a store, loaded keys and configuration.
    pub fn new(store: Arc<dyn AuthStore>, keys: Arc<KeyManager>, config: ApiConfig) -> Self {
        let sessions = SessionTokenCodec::new(config.jwt_secret.as_bytes());
        let api_keys = ApiKeyStore::new(store.clone(), ApiKeyTokenCodec::new(keys.clone()));
        let refresh_tokens = RefreshTokenLifecycle::new(store.clone());
        let resolver = AuthenticationResolver::new(sessions.clone(), api_keys.clone());
        let cookies = CookieManager::new(config.environment, config.session_ttl_secs);
        Self {
            store,
            keys,
            sessions,
            api_keys,
            refresh_tokens,
            resolver,
            cookies,
            config,
        }
    }
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    // Public routes (no auth required)
    let public = Router::new()
        .route(routes::POST_AUTH_REGISTER, post(auth::register_handler))
        .route(routes::POST_AUTH_LOGIN, post(auth::login_handler))
        .route(routes::POST_AUTH_REFRESH, post(auth::refresh_handler))
        .route(routes::POST_AUTH_LOGOUT, post(auth::logout_handler))
        .route(routes::GET_JWKS, get(jwks::jwks_handler));

    // Protected routes (require auth)
    let protected = Router::new()
        .route(routes::GET_AUTH_ME, get(auth::me_handler))
        .route(
            routes::AUTH_API_KEYS,
            get(api_keys::list_api_keys_handler).post(api_keys::create_api_key_handler),
        )
        .route(
            routes::DELETE_AUTH_API_KEYS_ID,
            delete(api_keys::revoke_api_key_handler),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(axum::middleware::from_fn(middleware::csrf::verify_csrf))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
