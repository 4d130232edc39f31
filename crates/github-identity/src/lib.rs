//! # GitHub Identity
//!
//! Credential and identity resolution for clients of the GitHub API.
//!
//! A provider is configured either with a static personal access token, with
//! GitHub App credentials (App ID, installation ID and private key), or with
//! nothing at all (anonymous, read-only access to public data). This crate
//! turns that configuration into one immutable [`ResolvedIdentity`]:
//!
//! - [`IdentityResolver`] reconciles token, owner and organization inputs
//! - [`CredentialAssertionBuilder`] signs the short-lived RS256 App JWT
//! - [`GitHubTokenExchanger`] trades the JWT for an installation token
//! - [`ConfigFactory`] runs the above and attaches a cancellation signal,
//!   producing a [`ProviderContext`]
//!
//! # Examples
//!
//! ```rust,no_run
//! use github_identity::{ConfigFactory, ProviderSettings};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let input = ProviderSettings::load(None)?.into_raw_input()?;
//!
//! let factory = ConfigFactory::new()?;
//! let context = factory.configure(input, CancellationToken::new()).await?;
//!
//! let client = context.http_client()?;
//! let response = context
//!     .authorize(client.get(format!("{}user", context.identity().rest_api_url())))
//!     .send()
//!     .await?;
//! # let _ = response;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod endpoints;
pub mod error;
pub mod factory;
pub mod resolver;
pub mod settings;

pub use auth::{
    AppCredentials, AppId, CredentialAssertionBuilder, GitHubTokenExchanger, InstallationId,
    InstallationToken, SignedAssertion, TokenExchanger,
};
pub use error::{AuthError, ConfigError, ExchangeFailure, IdentityError, SettingsError};
pub use factory::{ConfigFactory, FilePrivateKeySource, PrivateKeySource, ProviderContext};
pub use resolver::{
    AppAuthInput, IdentityResolver, RawConfigInput, ResolvedIdentity, DEFAULT_BASE_URL,
};
pub use settings::{AppAuthSettings, ProviderSettings};
