//! Error types for identity resolution.
//!
//! Configuration problems (`ConfigError`) are detected before any network
//! activity. Failures of the installation token exchange are reported as
//! `AuthError`. `configure` returns `IdentityError`, which wraps both so the
//! host can render a single configuration diagnostic.

use thiserror::Error;

/// Invalid or inconsistent provider configuration.
///
/// These errors are never retryable: the operator has to fix the input.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required GitHub App credential field is empty or absent.
    #[error("{field} must be set and contain a non-empty value")]
    MissingField { field: String },

    /// The App private key cannot be parsed or is not an RSA key.
    #[error("Invalid GitHub App private key: {message}")]
    InvalidKey { message: String },

    /// The App private key file could not be read.
    #[error("Unable to read GitHub App private key file {path}: {source}")]
    KeyFileUnreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Both a static token and GitHub App credentials were supplied.
    #[error("`token` conflicts with `app_auth`; configure only one of them")]
    ConflictingCredentials,

    /// The requested assertion lifetime is outside what GitHub accepts.
    #[error("Assertion lifetime must be positive and cannot exceed 10 minutes, got {seconds}s")]
    InvalidAssertionLifetime { seconds: i64 },

    /// GitHub App credentials were supplied but no installation token was
    /// exchanged for them.
    #[error("GitHub App credentials require an installation token exchange before resolution")]
    AppTokenRequired,
}

impl ConfigError {
    /// Short name of the missing field (`id`, `installation_id`, `pem_file`).
    ///
    /// Returns `None` for every variant other than `MissingField`.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::MissingField { field } => {
                Some(field.strip_prefix("app_auth.").unwrap_or(field))
            }
            _ => None,
        }
    }
}

/// Reasons an installation token exchange did not produce a token.
#[derive(Debug, Error)]
pub enum ExchangeFailure {
    /// Network connectivity, TLS or request construction failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// GitHub answered with a non-success status code.
    #[error("GitHub API returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body could not be interpreted as an installation token.
    #[error("malformed token response: {message}")]
    MalformedResponse { message: String },
}

/// Failures while authenticating as a GitHub App installation.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The assertion could not be exchanged for an installation token.
    #[error("Failed to create installation token from GitHub App: {0}")]
    ExchangeFailed(#[from] ExchangeFailure),

    /// The cancellation signal fired before the exchange completed.
    #[error("Installation token exchange was cancelled")]
    Cancelled,
}

impl AuthError {
    /// Check if this error represents a transient condition.
    ///
    /// Nothing in this crate retries; the classification lets a host decide
    /// whether re-running configuration is worthwhile.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ExchangeFailed(ExchangeFailure::Transport(_)) => true,
            Self::ExchangeFailed(ExchangeFailure::Status { status, .. }) => {
                *status >= 500 || *status == 429
            }
            Self::ExchangeFailed(ExchangeFailure::MalformedResponse { .. }) => false,
            Self::Cancelled => false,
        }
    }
}

/// Any error produced while configuring an identity.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Errors raised while loading provider settings from files and environment.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings sources could not be read or deserialized.
    #[error("Failed to load provider settings: {0}")]
    Load(#[from] config::ConfigError),

    /// `base_url` is not an absolute URL.
    #[error("Invalid base_url '{url}': {message}")]
    InvalidBaseUrl { url: String, message: String },

    /// The settings violate an identity rule.
    #[error(transparent)]
    Identity(#[from] ConfigError),
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
