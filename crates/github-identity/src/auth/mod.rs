//! GitHub App authentication types.
//!
//! This module provides the credential and token types used to authenticate
//! as a GitHub App installation:
//! - ID types (`AppId`, `InstallationId`)
//! - `AppCredentials`, the validated App ID, installation ID and private key
//! - `SignedAssertion`, the short-lived RS256 JWT presented to GitHub
//! - `InstallationToken`, the bearer token GitHub returns for an installation
//!
//! The assertion is built by [`CredentialAssertionBuilder`] and exchanged by a
//! [`TokenExchanger`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::ConfigError;

pub mod assertion;
pub mod exchange;

pub use assertion::{CredentialAssertionBuilder, MAX_ASSERTION_LIFETIME_MINUTES};
pub use exchange::{GitHubTokenExchanger, TokenExchanger};

// ============================================================================
// Core ID Types
// ============================================================================

/// GitHub App identifier assigned during app registration.
///
/// Kept as the string the operator configured; GitHub accepts it verbatim as
/// the `iss` claim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AppId(String);

impl AppId {
    /// Create a new App ID, rejecting empty values.
    pub fn new(id: impl Into<String>) -> Result<Self, ConfigError> {
        non_empty(id.into(), "app_auth.id").map(Self)
    }

    /// Get the raw value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AppId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// GitHub App installation identifier.
///
/// Addresses the account the App is installed on and scopes the exchanged
/// token to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstallationId(String);

impl InstallationId {
    /// Create a new installation ID, rejecting empty values.
    pub fn new(id: impl Into<String>) -> Result<Self, ConfigError> {
        non_empty(id.into(), "app_auth.installation_id").map(Self)
    }

    /// Get the raw value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for InstallationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn non_empty(value: String, field: &str) -> Result<String, ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::MissingField {
            field: field.to_string(),
        });
    }
    Ok(value)
}

// ============================================================================
// Credentials
// ============================================================================

/// Everything needed to sign an App assertion.
///
/// Transient: built for a single exchange and dropped afterwards. The key
/// bytes are zeroed on drop and never appear in Debug output.
#[derive(Clone)]
pub struct AppCredentials {
    app_id: AppId,
    installation_id: InstallationId,
    private_key_pem: Zeroizing<Vec<u8>>,
}

impl AppCredentials {
    /// Create App credentials.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingField` naming `app_auth.pem_file` when the
    /// key material is empty.
    pub fn new(
        app_id: AppId,
        installation_id: InstallationId,
        private_key_pem: impl Into<Zeroizing<Vec<u8>>>,
    ) -> Result<Self, ConfigError> {
        let private_key_pem = private_key_pem.into();
        if private_key_pem.is_empty() {
            return Err(ConfigError::MissingField {
                field: "app_auth.pem_file".to_string(),
            });
        }

        Ok(Self {
            app_id,
            installation_id,
            private_key_pem,
        })
    }

    /// Get the App ID.
    pub fn app_id(&self) -> &AppId {
        &self.app_id
    }

    /// Get the installation ID.
    pub fn installation_id(&self) -> &InstallationId {
        &self.installation_id
    }

    /// Get the PEM-encoded private key bytes.
    pub fn private_key_pem(&self) -> &[u8] {
        &self.private_key_pem
    }
}

// Security: Don't expose key data in debug output
impl std::fmt::Debug for AppCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppCredentials")
            .field("app_id", &self.app_id)
            .field("installation_id", &self.installation_id)
            .field("private_key_pem", &"<REDACTED>")
            .finish()
    }
}

// ============================================================================
// Token Types
// ============================================================================

/// JWT claims for GitHub App authentication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionClaims {
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
    /// Issuer (GitHub App ID)
    pub iss: String,
}

/// Signed, time-bounded App assertion (an RS256 JWT).
///
/// Presented once as a bearer credential to the token endpoint. Never
/// persisted; the encoded string is redacted from Debug output.
#[derive(Clone, PartialEq, Eq)]
pub struct SignedAssertion {
    token: String,
    issuer: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl SignedAssertion {
    pub(crate) fn new(
        token: String,
        issuer: String,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            token,
            issuer,
            issued_at,
            expires_at,
        }
    }

    /// Get the encoded JWT for the `Authorization: Bearer` header.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Get the `iss` claim (the App ID).
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Get when this assertion was issued.
    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Get when this assertion expires.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Check if the assertion is expired at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

// Security: Don't expose token in debug output
impl std::fmt::Debug for SignedAssertion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignedAssertion")
            .field("issuer", &self.issuer)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .field("token", &"<REDACTED>")
            .finish()
    }
}

/// Installation-scoped access token returned by GitHub.
///
/// Held in memory for the lifetime of the provider instance and never
/// refreshed; after `expires_at` the provider has to be reconfigured.
#[derive(Clone, PartialEq, Eq)]
pub struct InstallationToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl InstallationToken {
    /// Create a new installation token.
    pub fn new(value: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            expires_at,
        }
    }

    /// Get the token string for use in API requests.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Get when this token expires.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Check if the token is currently expired.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Consume the token, returning the string value.
    pub fn into_value(self) -> String {
        self.value
    }
}

// Security: Redact token in debug output
impl std::fmt::Debug for InstallationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstallationToken")
            .field("expires_at", &self.expires_at)
            .field("value", &"<REDACTED>")
            .finish()
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
