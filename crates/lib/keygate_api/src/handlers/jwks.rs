//! JWKS discovery.

use axum::Json;
use axum::extract::State;
use axum::http::header::CACHE_CONTROL;
use axum::response::IntoResponse;

use crate::AppState;

/// `GET /.well-known/jwks.json` — public key for verifying API-key tokens.
pub async fn jwks_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(CACHE_CONTROL, "public, max-age=300")],
        Json(state.keys.export_jwks()),
    )
}
