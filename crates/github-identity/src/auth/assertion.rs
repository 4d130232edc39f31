//! App assertion (JWT) generation for GitHub App authentication.
//!
//! # GitHub Requirements
//!
//! - JWTs must use RS256 algorithm (RSA Signature with SHA-256)
//! - Maximum expiration time is 10 minutes from issuance
//! - Claims must include `iss` (app ID), `iat` (issued at), and `exp` (expiration)

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use rsa::pkcs8::DecodePrivateKey;
use rsa::RsaPrivateKey;
use tracing::debug;

use super::{AppCredentials, AssertionClaims, SignedAssertion};
use crate::error::ConfigError;

/// Longest assertion lifetime GitHub accepts, in minutes.
pub const MAX_ASSERTION_LIFETIME_MINUTES: i64 = 10;

/// Builds RS256 App assertions from `AppCredentials`.
///
/// Building is a pure function of the credentials and the supplied `now`:
/// RS256 (PKCS#1 v1.5) signatures are deterministic, so identical inputs give
/// byte-identical assertions.
///
/// # Examples
///
/// ```no_run
/// # use github_identity::auth::{AppCredentials, AppId, CredentialAssertionBuilder, InstallationId};
/// # let pem = std::fs::read("app.pem").unwrap();
/// let credentials = AppCredentials::new(
///     AppId::new("123456").unwrap(),
///     InstallationId::new("987").unwrap(),
///     pem,
/// ).unwrap();
///
/// let assertion = CredentialAssertionBuilder::new()
///     .build(&credentials, chrono::Utc::now())
///     .unwrap();
/// assert_eq!(assertion.issuer(), "123456");
/// ```
#[derive(Debug, Clone, Copy)]
pub struct CredentialAssertionBuilder {
    lifetime: Duration,
}

impl CredentialAssertionBuilder {
    /// Create a builder using GitHub's maximum lifetime of 10 minutes.
    pub fn new() -> Self {
        Self {
            lifetime: Duration::minutes(MAX_ASSERTION_LIFETIME_MINUTES),
        }
    }

    /// Create a builder with a custom assertion lifetime.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidAssertionLifetime` if `lifetime` is not
    /// positive or exceeds 10 minutes.
    pub fn with_lifetime(lifetime: Duration) -> Result<Self, ConfigError> {
        if lifetime <= Duration::zero()
            || lifetime > Duration::minutes(MAX_ASSERTION_LIFETIME_MINUTES)
        {
            return Err(ConfigError::InvalidAssertionLifetime {
                seconds: lifetime.num_seconds(),
            });
        }

        Ok(Self { lifetime })
    }

    /// Get the lifetime applied to every assertion.
    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Sign an assertion for `credentials`, issued at `now`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidKey` if the private key is not valid PEM,
    /// is not an RSA key, or cannot be used for signing.
    pub fn build(
        &self,
        credentials: &AppCredentials,
        now: DateTime<Utc>,
    ) -> Result<SignedAssertion, ConfigError> {
        let encoding_key = encoding_key_from_pem(credentials.private_key_pem())?;

        let expires_at = now + self.lifetime;
        let claims = AssertionClaims {
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            iss: credentials.app_id().as_str().to_string(),
        };

        let token = encode(&Header::new(Algorithm::RS256), &claims, &encoding_key).map_err(
            |e| ConfigError::InvalidKey {
                message: format!("Failed to sign assertion: {}", e),
            },
        )?;

        debug!(
            app_id = %credentials.app_id(),
            expires_at = %expires_at,
            "Signed GitHub App assertion"
        );

        Ok(SignedAssertion::new(token, claims.iss, now, expires_at))
    }
}

impl Default for CredentialAssertionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a PKCS#1 or PKCS#8 RSA private key into a signing key.
fn encoding_key_from_pem(pem: &[u8]) -> Result<EncodingKey, ConfigError> {
    let pem = std::str::from_utf8(pem)
        .map_err(|_| invalid_key("PEM data is not valid UTF-8"))?
        .trim();

    if pem.is_empty() {
        return Err(invalid_key("PEM data cannot be empty"));
    }

    if !pem.contains("-----BEGIN") || !pem.contains("-----END") {
        return Err(invalid_key("Invalid PEM format: missing BEGIN/END markers"));
    }

    let private_key = RsaPrivateKey::from_pkcs1_pem(pem)
        .or_else(|pkcs1_error| {
            RsaPrivateKey::from_pkcs8_pem(pem).map_err(|pkcs8_error| {
                invalid_key(&format!(
                    "Failed to parse RSA private key (PKCS#1: {}; PKCS#8: {})",
                    pkcs1_error, pkcs8_error
                ))
            })
        })?;

    let der = private_key
        .to_pkcs1_der()
        .map_err(|e| invalid_key(&format!("Failed to encode RSA private key: {}", e)))?;

    Ok(EncodingKey::from_rsa_der(der.as_bytes()))
}

fn invalid_key(message: &str) -> ConfigError {
    ConfigError::InvalidKey {
        message: message.to_string(),
    }
}

#[cfg(test)]
#[path = "assertion_tests.rs"]
mod tests;
