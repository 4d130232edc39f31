//! Provider configuration entry point.
//!
//! `ConfigFactory::configure` turns a `RawConfigInput` into a
//! `ProviderContext`:
//!
//! 1. With `app_auth`: validate the block, read the private key, sign an
//!    assertion, exchange it for an installation token, and resolve with that
//!    token.
//! 2. Otherwise: resolve with the static token (or anonymously).
//!
//! The first error stops configuration; no partial identity is returned.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::auth::exchange::DEFAULT_USER_AGENT;
use crate::auth::{
    AppCredentials, CredentialAssertionBuilder, GitHubTokenExchanger, InstallationToken,
    TokenExchanger,
};
use crate::error::{AuthError, ConfigError, IdentityError};
use crate::resolver::{IdentityResolver, RawConfigInput, ResolvedIdentity, ValidatedAppAuth};

// ============================================================================
// Private key source
// ============================================================================

/// Interface for loading the App private key named by `app_auth.pem_file`.
pub trait PrivateKeySource: Send + Sync {
    /// Read the PEM-encoded key at `path`.
    fn read_private_key(&self, path: &str) -> Result<Zeroizing<Vec<u8>>, ConfigError>;
}

/// Reads private keys from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilePrivateKeySource;

impl PrivateKeySource for FilePrivateKeySource {
    fn read_private_key(&self, path: &str) -> Result<Zeroizing<Vec<u8>>, ConfigError> {
        std::fs::read(path)
            .map(Zeroizing::new)
            .map_err(|source| ConfigError::KeyFileUnreadable {
                path: path.to_string(),
                source,
            })
    }
}

// ============================================================================
// Provider context
// ============================================================================

/// Identity and cancellation signal handed to every downstream operation.
///
/// Cloning is cheap: the identity is shared and clones of the cancellation
/// token observe the same signal.
#[derive(Debug, Clone)]
pub struct ProviderContext {
    identity: Arc<ResolvedIdentity>,
    cancellation: CancellationToken,
    token_expires_at: Option<DateTime<Utc>>,
}

impl ProviderContext {
    /// Get the resolved identity.
    pub fn identity(&self) -> &ResolvedIdentity {
        &self.identity
    }

    /// Get a shared handle to the resolved identity.
    pub fn shared_identity(&self) -> Arc<ResolvedIdentity> {
        Arc::clone(&self.identity)
    }

    /// Get the provider-wide cancellation signal.
    ///
    /// Pass it (or a child) into every API operation; once cancelled it stays
    /// cancelled.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Create a signal that fires when the provider is cancelled, and that
    /// can additionally be cancelled on its own for a single operation.
    pub fn child_cancellation(&self) -> CancellationToken {
        self.cancellation.child_token()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// When the installation token expires, for App authentication.
    ///
    /// The token is never refreshed; after this instant the provider must be
    /// configured again.
    pub fn token_expires_at(&self) -> Option<DateTime<Utc>> {
        self.token_expires_at
    }

    /// Build an HTTP client for API calls under this identity.
    ///
    /// Certificate verification is disabled when the identity is insecure.
    /// Authenticate individual requests with [`ProviderContext::authorize`].
    pub fn http_client(&self) -> reqwest::Result<reqwest::Client> {
        reqwest::Client::builder()
            .user_agent(DEFAULT_USER_AGENT)
            .danger_accept_invalid_certs(self.identity.is_insecure())
            .build()
    }

    /// Attach the bearer token to `request` unless the identity is anonymous.
    pub fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.identity.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

// ============================================================================
// Factory
// ============================================================================

/// Assembles a `ProviderContext` from raw configuration.
pub struct ConfigFactory {
    resolver: IdentityResolver,
    assertion_builder: CredentialAssertionBuilder,
    exchanger: Arc<dyn TokenExchanger>,
    key_source: Arc<dyn PrivateKeySource>,
}

impl ConfigFactory {
    /// Create a factory that reads keys from disk and talks to GitHub.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::ExchangeFailed` if the HTTP client cannot be built.
    pub fn new() -> Result<Self, AuthError> {
        Ok(Self::with_components(
            GitHubTokenExchanger::new()?,
            FilePrivateKeySource,
        ))
    }

    /// Create a factory from explicit collaborators.
    pub fn with_components(
        exchanger: impl TokenExchanger + 'static,
        key_source: impl PrivateKeySource + 'static,
    ) -> Self {
        Self {
            resolver: IdentityResolver::new(),
            assertion_builder: CredentialAssertionBuilder::new(),
            exchanger: Arc::new(exchanger),
            key_source: Arc::new(key_source),
        }
    }

    /// Replace the assertion builder (for example to shorten the lifetime).
    pub fn with_assertion_builder(mut self, assertion_builder: CredentialAssertionBuilder) -> Self {
        self.assertion_builder = assertion_builder;
        self
    }

    /// Configure the provider identity.
    ///
    /// `cancellation` is attached to the returned context. While the token
    /// exchange is in flight it is also observed here: if it fires (or has
    /// already fired) the exchange is abandoned with `AuthError::Cancelled`.
    ///
    /// # Errors
    ///
    /// - `IdentityError::Config` for missing App fields, unreadable or invalid
    ///   keys, and conflicting credentials. These are detected before any
    ///   network call.
    /// - `IdentityError::Auth` if the exchange fails or is cancelled.
    pub async fn configure(
        &self,
        input: RawConfigInput,
        cancellation: CancellationToken,
    ) -> Result<ProviderContext, IdentityError> {
        let installation_token = match &input.app_auth {
            Some(app_auth) => {
                if input.static_token().is_some() {
                    return Err(ConfigError::ConflictingCredentials.into());
                }
                let validated = self.resolver.validate_app_auth(app_auth)?;
                Some(
                    self.installation_token(&input.base_url, validated, &cancellation)
                        .await?,
                )
            }
            None => None,
        };

        let token_expires_at = installation_token.as_ref().map(|t| t.expires_at());
        let token_override = installation_token.map(InstallationToken::into_value);

        let identity = self.resolver.resolve(&input, token_override.as_deref())?;

        info!(
            owner = %identity.owner(),
            individual = identity.is_individual(),
            anonymous = identity.is_anonymous(),
            app_auth = input.has_app_auth(),
            base_url = %identity.base_url(),
            "GitHub identity configured"
        );

        Ok(ProviderContext {
            identity: Arc::new(identity),
            cancellation,
            token_expires_at,
        })
    }

    async fn installation_token(
        &self,
        base_url: &str,
        app_auth: ValidatedAppAuth,
        cancellation: &CancellationToken,
    ) -> Result<InstallationToken, IdentityError> {
        let private_key = self.key_source.read_private_key(&app_auth.pem_file)?;
        let credentials =
            AppCredentials::new(app_auth.app_id, app_auth.installation_id, private_key)?;

        let assertion = self.assertion_builder.build(&credentials, Utc::now())?;

        info!(
            app_id = %credentials.app_id(),
            installation_id = %credentials.installation_id(),
            "Exchanging GitHub App assertion for installation token"
        );

        tokio::select! {
            biased;
            _ = cancellation.cancelled() => {
                warn!(
                    installation_id = %credentials.installation_id(),
                    "Installation token exchange cancelled"
                );
                Err(AuthError::Cancelled.into())
            }
            result = self.exchanger.exchange(base_url, credentials.installation_id(), &assertion) => {
                Ok(result?)
            }
        }
    }
}

impl std::fmt::Debug for ConfigFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigFactory")
            .field("assertion_builder", &self.assertion_builder)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "factory_tests.rs"]
mod tests;
