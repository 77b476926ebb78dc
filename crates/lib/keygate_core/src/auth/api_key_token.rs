//! Personal API key tokens (RS256, `kid`-tagged).

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Header, Validation, decode, encode};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use super::keys::{API_KEY_ALGORITHM, Jwks, KeyManager};
use super::{AuthError, decode_segment};
use crate::models::auth::ApiKeyClaims;

/// Value of the `type` claim on API-key tokens.
pub const API_KEY_TOKEN_TYPE: &str = "api_key";

/// Claims as they arrive, before the structural checks.
#[derive(Debug, Deserialize)]
struct RawApiKeyClaims {
    sub: Option<String>,
    jti: Option<String>,
    #[serde(rename = "type")]
    token_type: Option<String>,
    #[serde(default)]
    iat: i64,
    #[serde(default)]
    scopes: Vec<String>,
    exp: Option<i64>,
}

impl RawApiKeyClaims {
    fn into_claims(self) -> Result<ApiKeyClaims, AuthError> {
        if self.token_type.as_deref() != Some(API_KEY_TOKEN_TYPE) {
            return Err(AuthError::TokenError("not an API key token".into()));
        }
        let sub = self.sub.filter(|s| !s.is_empty());
        let jti = self.jti.filter(|s| !s.is_empty());
        let (Some(sub), Some(jti)) = (sub, jti) else {
            return Err(AuthError::MalformedToken);
        };
        Ok(ApiKeyClaims {
            sub,
            jti,
            token_type: API_KEY_TOKEN_TYPE.to_string(),
            iat: self.iat,
            scopes: self.scopes,
            exp: self.exp,
        })
    }
}

/// Encodes and verifies API-key tokens with the RSA keypair.
#[derive(Debug, Clone)]
pub struct ApiKeyTokenCodec {
    keys: Arc<KeyManager>,
}

impl ApiKeyTokenCodec {
    pub fn new(keys: Arc<KeyManager>) -> Self {
        Self { keys }
    }

    /// Sign an API-key token issued now, expiring `ttl` from now when given.
    pub fn encode(
        &self,
        subject: &str,
        jti: &str,
        scopes: &[String],
        ttl: Option<Duration>,
    ) -> Result<String, AuthError> {
        let now = Utc::now();
        self.encode_at(subject, jti, scopes, now, ttl.map(|ttl| now + ttl))
    }

    /// Sign an API-key token with explicit issue and expiry instants.
    pub fn encode_at(
        &self,
        subject: &str,
        jti: &str,
        scopes: &[String],
        issued_at: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<String, AuthError> {
        let claims = ApiKeyClaims {
            sub: subject.to_string(),
            jti: jti.to_string(),
            token_type: API_KEY_TOKEN_TYPE.to_string(),
            iat: issued_at.timestamp(),
            scopes: scopes.to_vec(),
            exp: expires_at.map(|t| t.timestamp()),
        };
        let mut header = Header::new(API_KEY_ALGORITHM);
        header.kid = Some(self.keys.kid().to_string());
        encode(&header, &claims, self.keys.get_signing_key())
            .map_err(|e| AuthError::TokenError(format!("jwt encode: {e}")))
    }

    /// Verify signature, expiry and structure.
    ///
    /// Malformed input, a foreign algorithm, a bad signature, expiry and
    /// missing claims all produce the same `None`.
    pub fn verify(&self, token: &str) -> Option<ApiKeyClaims> {
        match self.try_verify(token) {
            Ok(claims) => Some(claims),
            Err(e) => {
                debug!(error = %e, "API key token rejected");
                None
            }
        }
    }

    fn try_verify(&self, token: &str) -> Result<ApiKeyClaims, AuthError> {
        let mut validation = Validation::new(API_KEY_ALGORITHM);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["sub"]);
        let data = decode::<RawApiKeyClaims>(token, self.keys.get_verification_key(), &validation)?;
        data.claims.into_claims()
    }

    /// Decode claims without checking the signature.
    ///
    /// For diagnostics only; never use the result to authenticate anyone.
    pub fn decode_unsafe(&self, token: &str) -> Option<ApiKeyClaims> {
        decode_segment::<RawApiKeyClaims>(token, 1)
            .and_then(RawApiKeyClaims::into_claims)
            .ok()
    }

    /// SHA-256 hex digest of the full token, used for storage and lookup.
    pub fn hash(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn export_jwks(&self) -> Jwks {
        self.keys.export_jwks()
    }
}
