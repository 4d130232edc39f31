//! Identity resolution.
//!
//! Reconciles the raw provider inputs (static token, GitHub App credentials,
//! owner and organization) into a single `ResolvedIdentity`. Resolution is
//! pure: no I/O, no retries, and identical inputs always give identical
//! output.
//!
//! Rules:
//! - `token` and `app_auth` are mutually exclusive.
//! - When `app_auth` is present every sub-field must be non-empty, and the
//!   token obtained from the App exchange is the effective token.
//! - No token at all is anonymous mode, which is valid (public, read-only
//!   scope).
//! - A non-empty `organization` wins over `owner`.

use tracing::debug;

use crate::auth::{AppId, InstallationId};
use crate::endpoints;
use crate::error::ConfigError;

/// Default GitHub API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.github.com/";

/// Raw `app_auth` block as supplied by the operator.
///
/// Fields may be empty here; `IdentityResolver::validate_app_auth` rejects
/// that.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppAuthInput {
    pub id: String,
    pub installation_id: String,
    pub pem_file: String,
}

/// Snapshot of user-supplied provider configuration.
///
/// Produced by the settings loader after environment defaults have been
/// applied.
#[derive(Clone, PartialEq, Eq)]
pub struct RawConfigInput {
    pub token: Option<String>,
    pub app_auth: Option<AppAuthInput>,
    pub owner: Option<String>,
    pub organization: Option<String>,
    pub base_url: String,
    pub insecure: bool,
}

impl Default for RawConfigInput {
    fn default() -> Self {
        Self {
            token: None,
            app_auth: None,
            owner: None,
            organization: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            insecure: false,
        }
    }
}

impl RawConfigInput {
    /// The static token, if one was configured with a non-empty value.
    pub fn static_token(&self) -> Option<&str> {
        non_empty(self.token.as_deref())
    }

    /// Check whether GitHub App credentials were configured.
    pub fn has_app_auth(&self) -> bool {
        self.app_auth.is_some()
    }
}

// Security: Don't expose token in debug output
impl std::fmt::Debug for RawConfigInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawConfigInput")
            .field("token", &self.token.as_ref().map(|_| "<REDACTED>"))
            .field("app_auth", &self.app_auth)
            .field("owner", &self.owner)
            .field("organization", &self.organization)
            .field("base_url", &self.base_url)
            .field("insecure", &self.insecure)
            .finish()
    }
}

/// `app_auth` block after every field was checked to be non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedAppAuth {
    pub app_id: AppId,
    pub installation_id: InstallationId,
    pub pem_file: String,
}

/// The single identity every downstream API operation works with.
///
/// Immutable once constructed and safe to share across threads.
///
/// Invariants:
/// - `is_anonymous() == effective_token().is_empty()`
/// - `is_individual()` is true exactly when no organization was configured
/// - `owner()` is the organization when one was configured, otherwise the
///   owner (possibly empty, in which case each operation must name its owner)
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ResolvedIdentity {
    token: String,
    owner: String,
    individual: bool,
    anonymous: bool,
    insecure: bool,
    base_url: String,
}

impl ResolvedIdentity {
    /// The bearer token, or `None` in anonymous mode.
    pub fn token(&self) -> Option<&str> {
        non_empty(Some(self.token.as_str()))
    }

    /// The bearer token; empty in anonymous mode.
    pub fn effective_token(&self) -> &str {
        &self.token
    }

    /// The account resources are managed under.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn is_individual(&self) -> bool {
        self.individual
    }

    pub fn is_anonymous(&self) -> bool {
        self.anonymous
    }

    /// Whether TLS certificate verification is disabled for API calls.
    pub fn is_insecure(&self) -> bool {
        self.insecure
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// REST API root for this base URL.
    pub fn rest_api_url(&self) -> String {
        endpoints::rest_api_url(&self.base_url)
    }

    /// GraphQL endpoint for this base URL.
    pub fn graphql_api_url(&self) -> String {
        endpoints::graphql_api_url(&self.base_url)
    }
}

// Security: Redact token in debug output
impl std::fmt::Debug for ResolvedIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedIdentity")
            .field("owner", &self.owner)
            .field("individual", &self.individual)
            .field("anonymous", &self.anonymous)
            .field("insecure", &self.insecure)
            .field("base_url", &self.base_url)
            .field("token", &"<REDACTED>")
            .finish()
    }
}

/// Reconciles `RawConfigInput` into a `ResolvedIdentity`.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityResolver;

impl IdentityResolver {
    pub fn new() -> Self {
        Self
    }

    /// Check that every `app_auth` field is non-empty.
    ///
    /// Fields are checked in declaration order (`id`, `installation_id`,
    /// `pem_file`) and the first empty one is reported.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingField` naming the empty field.
    pub fn validate_app_auth(
        &self,
        app_auth: &AppAuthInput,
    ) -> Result<ValidatedAppAuth, ConfigError> {
        let app_id = AppId::new(app_auth.id.as_str())?;
        let installation_id = InstallationId::new(app_auth.installation_id.as_str())?;

        if app_auth.pem_file.is_empty() {
            return Err(ConfigError::MissingField {
                field: "app_auth.pem_file".to_string(),
            });
        }

        Ok(ValidatedAppAuth {
            app_id,
            installation_id,
            pem_file: app_auth.pem_file.clone(),
        })
    }

    /// Resolve `input` into an identity.
    ///
    /// `token_override` carries the installation token obtained from the App
    /// exchange; it replaces the static token.
    ///
    /// # Errors
    ///
    /// - `ConfigError::ConflictingCredentials` if both a static token and
    ///   `app_auth` are set
    /// - `ConfigError::MissingField` if an `app_auth` field is empty
    /// - `ConfigError::AppTokenRequired` if `app_auth` is set but no exchanged
    ///   token was supplied
    pub fn resolve(
        &self,
        input: &RawConfigInput,
        token_override: Option<&str>,
    ) -> Result<ResolvedIdentity, ConfigError> {
        let token_override = non_empty(token_override);

        let token = match &input.app_auth {
            Some(app_auth) => {
                if input.static_token().is_some() {
                    return Err(ConfigError::ConflictingCredentials);
                }
                self.validate_app_auth(app_auth)?;
                token_override.ok_or(ConfigError::AppTokenRequired)?
            }
            None => token_override.or(input.static_token()).unwrap_or_default(),
        };

        let (owner, individual) = match non_empty(input.organization.as_deref()) {
            Some(organization) => (organization, false),
            None => (input.owner.as_deref().unwrap_or_default(), true),
        };

        let identity = ResolvedIdentity {
            token: token.to_string(),
            owner: owner.to_string(),
            individual,
            anonymous: token.is_empty(),
            insecure: input.insecure,
            base_url: input.base_url.clone(),
        };

        debug!(
            owner = %identity.owner,
            individual = identity.individual,
            anonymous = identity.anonymous,
            base_url = %identity.base_url,
            "Resolved GitHub identity"
        );

        Ok(identity)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;
