//! Provider settings loading.
//!
//! Settings come from an optional file (TOML, YAML or JSON, picked by
//! extension) with environment variables as defaults. An environment
//! variable only fills a value the file leaves unset; an explicitly empty
//! value in the file is kept and later rejected by identity resolution.
//!
//! | Setting                    | Environment default          |
//! |----------------------------|------------------------------|
//! | `token`                    | `GITHUB_TOKEN`               |
//! | `owner`                    | `GITHUB_OWNER`               |
//! | `organization`             | `GITHUB_ORGANIZATION`        |
//! | `base_url`                 | `GITHUB_BASE_URL`, then `https://api.github.com/` |
//! | `app_auth.id`              | `GITHUB_APP_ID`              |
//! | `app_auth.installation_id` | `GITHUB_APP_INSTALLATION_ID` |
//! | `app_auth.pem_file`        | `GITHUB_APP_PEM_FILE`        |
//!
//! The `app_auth` defaults apply only when the file declares an `app_auth`
//! block. `GITHUB_TOKEN` applies only when it does not, so only a token set
//! in the file conflicts with App credentials.

use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{ConfigError, SettingsError};
use crate::resolver::{AppAuthInput, RawConfigInput, DEFAULT_BASE_URL};

const TOP_LEVEL_ENV_DEFAULTS: [(&str, &str); 3] = [
    ("owner", "GITHUB_OWNER"),
    ("organization", "GITHUB_ORGANIZATION"),
    ("base_url", "GITHUB_BASE_URL"),
];

/// The `app_auth` block of the provider settings.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppAuthSettings {
    /// GitHub App ID.
    pub id: Option<String>,

    /// Installation ID of the App within the target account.
    pub installation_id: Option<String>,

    /// Path to the App's PEM-encoded private key.
    pub pem_file: Option<String>,
}

impl AppAuthSettings {
    fn apply_env_defaults(&mut self, env: &impl Fn(&str) -> Option<String>) {
        fill_from_env(&mut self.id, env, "GITHUB_APP_ID");
        fill_from_env(&mut self.installation_id, env, "GITHUB_APP_INSTALLATION_ID");
        fill_from_env(&mut self.pem_file, env, "GITHUB_APP_PEM_FILE");
    }
}

/// Provider settings as read from file and environment.
#[derive(Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProviderSettings {
    /// Static personal access token. Conflicts with `app_auth`.
    pub token: Option<String>,

    /// Target individual account.
    pub owner: Option<String>,

    /// Target organization. Takes precedence over `owner`.
    pub organization: Option<String>,

    /// GitHub API base URL.
    pub base_url: String,

    /// Disable TLS certificate verification for API calls.
    pub insecure: bool,

    /// GitHub App credentials. Conflicts with `token`.
    pub app_auth: Option<AppAuthSettings>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            token: None,
            owner: None,
            organization: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            insecure: false,
            app_auth: None,
        }
    }
}

impl ProviderSettings {
    /// Load settings from `path` (if any) with process environment defaults.
    ///
    /// # Errors
    ///
    /// See [`ProviderSettings::load_with_env`].
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        Self::load_with_env(path, |name| std::env::var(name).ok())
    }

    /// Load settings from `path` (if any), taking defaults from `env`.
    ///
    /// `env` maps an environment variable name to its value. Empty values are
    /// treated as unset.
    ///
    /// # Errors
    ///
    /// - `SettingsError::Load` if the file is missing, unreadable or has the
    ///   wrong shape
    /// - `SettingsError::InvalidBaseUrl` if `base_url` is not an absolute
    ///   http(s) URL
    pub fn load_with_env(
        path: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, SettingsError> {
        let mut builder = config::Config::builder().set_default("base_url", DEFAULT_BASE_URL)?;

        for (key, variable) in TOP_LEVEL_ENV_DEFAULTS {
            if let Some(value) = non_empty_env(&env, variable) {
                debug!(setting = key, variable, "Applying environment default");
                builder = builder.set_default(key, value)?;
            }
        }

        if let Some(path) = path {
            info!(path = %path.display(), "Loading provider settings");
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let mut settings: ProviderSettings = builder.build()?.try_deserialize()?;

        match settings.app_auth.as_mut() {
            Some(app_auth) => app_auth.apply_env_defaults(&env),
            None => fill_from_env(&mut settings.token, &env, "GITHUB_TOKEN"),
        }

        settings.validate()?;

        Ok(settings)
    }

    /// Check the settings-level rules.
    ///
    /// # Errors
    ///
    /// - `SettingsError::InvalidBaseUrl` if `base_url` is not an absolute
    ///   http(s) URL
    /// - `SettingsError::Identity(ConfigError::ConflictingCredentials)` if both
    ///   a non-empty `token` and `app_auth` are set
    pub fn validate(&self) -> Result<(), SettingsError> {
        let url = url::Url::parse(&self.base_url).map_err(|e| SettingsError::InvalidBaseUrl {
            url: self.base_url.clone(),
            message: e.to_string(),
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(SettingsError::InvalidBaseUrl {
                url: self.base_url.clone(),
                message: format!("unsupported scheme '{}'", url.scheme()),
            });
        }

        let has_token = self.token.as_deref().is_some_and(|t| !t.is_empty());
        if has_token && self.app_auth.is_some() {
            return Err(ConfigError::ConflictingCredentials.into());
        }

        Ok(())
    }

    /// Convert into the resolver's input.
    ///
    /// Unset `app_auth` fields become empty strings so resolution reports
    /// them as missing.
    ///
    /// # Errors
    ///
    /// Same as [`ProviderSettings::validate`].
    pub fn into_raw_input(self) -> Result<RawConfigInput, SettingsError> {
        self.validate()?;

        Ok(RawConfigInput {
            token: self.token,
            app_auth: self.app_auth.map(|app_auth| AppAuthInput {
                id: app_auth.id.unwrap_or_default(),
                installation_id: app_auth.installation_id.unwrap_or_default(),
                pem_file: app_auth.pem_file.unwrap_or_default(),
            }),
            owner: self.owner,
            organization: self.organization,
            base_url: self.base_url,
            insecure: self.insecure,
        })
    }
}

// Security: Don't expose token in debug output
impl std::fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("token", &self.token.as_ref().map(|_| "<REDACTED>"))
            .field("owner", &self.owner)
            .field("organization", &self.organization)
            .field("base_url", &self.base_url)
            .field("insecure", &self.insecure)
            .field("app_auth", &self.app_auth)
            .finish()
    }
}

fn non_empty_env(env: &impl Fn(&str) -> Option<String>, variable: &str) -> Option<String> {
    env(variable).filter(|value| !value.is_empty())
}

fn fill_from_env(
    slot: &mut Option<String>,
    env: &impl Fn(&str) -> Option<String>,
    variable: &str,
) {
    if slot.is_none() {
        *slot = non_empty_env(env, variable);
    }
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
