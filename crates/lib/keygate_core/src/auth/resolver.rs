//! Routes inbound tokens to the codec matching their declared algorithm.
//!
//! The `alg` header is untrusted input. It is parsed into the closed
//! [`TokenAlgorithm`] enum and matched exhaustively; anything that is not
//! exactly the session algorithm or the API-key algorithm is rejected, so a
//! token can never be checked against the other family's key.

use serde::Deserialize;
use tracing::debug;

use super::api_key_token::ApiKeyTokenCodec;
use super::api_keys::ApiKeyStore;
use super::decode_segment;
use super::jwt::SessionTokenCodec;

/// Algorithm family declared by a token header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenAlgorithm {
    /// HS256 session token.
    Session,
    /// RS256 personal API key.
    ApiKey,
    /// Missing, `none`, or any other value.
    Unknown,
}

#[derive(Deserialize)]
struct UnverifiedHeader {
    alg: Option<String>,
}

impl TokenAlgorithm {
    /// Classify a token by its unverified header. Never fails.
    pub fn from_token(token: &str) -> Self {
        match decode_segment::<UnverifiedHeader>(token, 0) {
            Ok(UnverifiedHeader { alg: Some(alg) }) => Self::from_alg(&alg),
            _ => TokenAlgorithm::Unknown,
        }
    }

    /// Exact, case-sensitive match on the JOSE algorithm name.
    pub fn from_alg(alg: &str) -> Self {
        match alg {
            "HS256" => TokenAlgorithm::Session,
            "RS256" => TokenAlgorithm::ApiKey,
            _ => TokenAlgorithm::Unknown,
        }
    }
}

/// Outcome of resolving a token.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Resolution {
    pub subject: Option<String>,
    pub is_api_key: bool,
}

impl Resolution {
    fn rejected() -> Self {
        Self::default()
    }

    pub fn is_authenticated(&self) -> bool {
        self.subject.is_some()
    }
}

/// Single verification surface for session tokens and API keys.
#[derive(Debug, Clone)]
pub struct AuthenticationResolver {
    sessions: SessionTokenCodec,
    api_keys: ApiKeyStore,
}

impl AuthenticationResolver {
    pub fn new(sessions: SessionTokenCodec, api_keys: ApiKeyStore) -> Self {
        Self { sessions, api_keys }
    }

    /// Resolve any byte string to an authenticated subject or a rejection.
    ///
    /// Rejections carry no reason. For API keys the persisted record is
    /// re-checked (revocation, expiry, hash) and usage is recorded on a
    /// best-effort basis.
    pub async fn resolve(&self, token: &str) -> Resolution {
        match TokenAlgorithm::from_token(token) {
            TokenAlgorithm::Session => Resolution {
                subject: self.sessions.decode(token),
                is_api_key: false,
            },
            TokenAlgorithm::ApiKey => self.resolve_api_key(token).await,
            TokenAlgorithm::Unknown => {
                debug!("token with unsupported algorithm rejected");
                Resolution::rejected()
            }
        }
    }

    async fn resolve_api_key(&self, token: &str) -> Resolution {
        let Some(claims) = self.api_keys.codec().verify(token) else {
            return Resolution::rejected();
        };
        let token_hash = ApiKeyTokenCodec::hash(token);
        let record = match self.api_keys.verify_by_hash(&token_hash, &claims.jti).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!(jti = %claims.jti, "API key not active or hash mismatch");
                return Resolution::rejected();
            }
            Err(e) => {
                debug!(error = %e, "API key lookup failed");
                return Resolution::rejected();
            }
        };
        self.api_keys.record_usage(&record).await;
        Resolution {
            subject: Some(claims.sub),
            is_api_key: true,
        }
    }
}
