//! Signing key management for personal API keys.
//!
//! A single RSA keypair, addressed by a static key ID, is loaded once at
//! process start and shared by handle. Only [`Environment::Test`] may fall
//! back to a throwaway in-memory keypair.

use std::path::PathBuf;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, LineEnding};
use rsa::rand_core::OsRng;
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::AuthError;

/// Key ID carried in the header of every API-key token.
pub const API_KEY_KID: &str = "pak-key-1";

/// Signing algorithm for API-key tokens.
pub const API_KEY_ALGORITHM: Algorithm = Algorithm::RS256;

/// Modulus size for generated keys.
const GENERATED_KEY_BITS: usize = 2048;

/// Deployment environment, read from `APP_ENV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Test,
    Production,
}

impl Environment {
    /// Parse an environment name. Unknown values map to `Production`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" | "local" => Environment::Development,
            "test" | "testing" => Environment::Test,
            _ => Environment::Production,
        }
    }

    /// Read `APP_ENV`, defaulting to `Development` when unset.
    pub fn from_env() -> Self {
        std::env::var("APP_ENV")
            .map(|v| Self::parse(&v))
            .unwrap_or_default()
    }

    pub fn is_development(self) -> bool {
        self == Environment::Development
    }
}

/// Where the API-key signing key comes from.
#[derive(Clone, PartialEq, Eq)]
pub enum KeySource {
    /// Inline PEM (PKCS#8 or PKCS#1).
    Pem(String),
    /// Path to a PEM file.
    File(PathBuf),
    /// No key material configured.
    Missing,
}

impl std::fmt::Debug for KeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeySource::Pem(_) => f.write_str("Pem(<redacted>)"),
            KeySource::File(path) => f.debug_tuple("File").field(path).finish(),
            KeySource::Missing => f.write_str("Missing"),
        }
    }
}

impl KeySource {
    /// Resolve `PAK_PRIVATE_KEY` (inline PEM) → `PAK_PRIVATE_KEY_PATH` → `Missing`.
    pub fn from_env() -> Self {
        if let Ok(pem) = std::env::var("PAK_PRIVATE_KEY")
            && !pem.trim().is_empty()
        {
            return KeySource::Pem(pem);
        }
        if let Ok(path) = std::env::var("PAK_PRIVATE_KEY_PATH")
            && !path.trim().is_empty()
        {
            return KeySource::File(PathBuf::from(path));
        }
        KeySource::Missing
    }
}

/// A single-key JSON Web Key Set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

/// RSA public key in JWK form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    pub kid: String,
    #[serde(rename = "use")]
    pub key_use: String,
    pub alg: String,
    pub n: String,
    pub e: String,
}

/// RSA keypair for signing and verifying API-key tokens.
pub struct KeyManager {
    kid: String,
    public_key: RsaPublicKey,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ephemeral: bool,
}

impl std::fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyManager")
            .field("kid", &self.kid)
            .field("ephemeral", &self.ephemeral)
            .finish_non_exhaustive()
    }
}

impl KeyManager {
    /// Load key material from `source`.
    ///
    /// Fails with `KeyUnavailable` when nothing is configured, unless running
    /// under `Environment::Test`, which gets a generated keypair instead.
    pub fn load(source: &KeySource, environment: Environment) -> Result<Self, AuthError> {
        match source {
            KeySource::Pem(pem) => Self::from_pem(pem),
            KeySource::File(path) => {
                let pem = std::fs::read_to_string(path).map_err(|e| {
                    AuthError::KeyUnavailable(format!("read {}: {e}", path.display()))
                })?;
                let manager = Self::from_pem(&pem)?;
                info!(path = %path.display(), kid = %manager.kid, "loaded API key signing key");
                Ok(manager)
            }
            KeySource::Missing if environment == Environment::Test => {
                warn!("no API key signing key configured; generating an ephemeral keypair");
                Self::ephemeral()
            }
            KeySource::Missing => Err(AuthError::KeyUnavailable(
                "set PAK_PRIVATE_KEY or PAK_PRIVATE_KEY_PATH".into(),
            )),
        }
    }

    /// Build from a PEM-encoded RSA private key (PKCS#8 or PKCS#1).
    pub fn from_pem(pem: &str) -> Result<Self, AuthError> {
        let private_key = decode_private_key(pem)?;
        Self::from_private_key(&private_key, false)
    }

    /// Generate a throwaway keypair held only in memory.
    pub fn ephemeral() -> Result<Self, AuthError> {
        Self::from_private_key(&generate_private_key()?, true)
    }

    fn from_private_key(private_key: &RsaPrivateKey, ephemeral: bool) -> Result<Self, AuthError> {
        let public_key = RsaPublicKey::from(private_key);
        let der = private_key
            .to_pkcs1_der()
            .map_err(|e| AuthError::KeyUnavailable(format!("encode private key: {e}")))?;
        let encoding_key = EncodingKey::from_rsa_der(der.as_bytes());
        let (n, e) = public_components(&public_key);
        let decoding_key = DecodingKey::from_rsa_components(&n, &e)
            .map_err(|e| AuthError::KeyUnavailable(format!("decoding key: {e}")))?;
        Ok(Self {
            kid: API_KEY_KID.to_string(),
            public_key,
            encoding_key,
            decoding_key,
            ephemeral,
        })
    }

    /// Key used to sign API-key tokens.
    pub fn get_signing_key(&self) -> &EncodingKey {
        &self.encoding_key
    }

    /// Key used to verify API-key tokens.
    pub fn get_verification_key(&self) -> &DecodingKey {
        &self.decoding_key
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    pub fn is_ephemeral(&self) -> bool {
        self.ephemeral
    }

    /// Public key as a one-entry JWKS, for the discovery endpoint.
    pub fn export_jwks(&self) -> Jwks {
        let (n, e) = public_components(&self.public_key);
        Jwks {
            keys: vec![Jwk {
                kty: "RSA".to_string(),
                kid: self.kid.clone(),
                key_use: "sig".to_string(),
                alg: "RS256".to_string(),
                n,
                e,
            }],
        }
    }
}

/// Generate a fresh RSA private key and return it as PKCS#8 PEM.
pub fn generate_private_key_pem() -> Result<String, AuthError> {
    let key = generate_private_key()?;
    let pem = key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| AuthError::Internal(format!("encode private key: {e}")))?;
    Ok(pem.as_str().to_owned())
}

fn generate_private_key() -> Result<RsaPrivateKey, AuthError> {
    RsaPrivateKey::new(&mut OsRng, GENERATED_KEY_BITS)
        .map_err(|e| AuthError::Internal(format!("generate RSA key: {e}")))
}

fn decode_private_key(pem: &str) -> Result<RsaPrivateKey, AuthError> {
    let pem = pem.trim();
    if let Ok(k) = RsaPrivateKey::from_pkcs8_pem(pem) {
        return Ok(k);
    }
    if let Ok(k) = RsaPrivateKey::from_pkcs1_pem(pem) {
        return Ok(k);
    }
    Err(AuthError::KeyUnavailable(
        "private key is not a PKCS#8 or PKCS#1 RSA PEM".into(),
    ))
}

/// Base64url (unpadded) modulus and exponent.
fn public_components(public_key: &RsaPublicKey) -> (String, String) {
    (
        URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be()),
        URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be()),
    )
}
