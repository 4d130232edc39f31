//! Installation token exchange.
//!
//! Presents a signed App assertion to
//! `POST {rest_api_root}app/installations/{installation_id}/access_tokens` and
//! returns the installation-scoped bearer token GitHub issues.
//!
//! Exactly one request is made per call. Nothing is retried or cached here:
//! configuration failures surface immediately to the caller.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{InstallationId, InstallationToken, SignedAssertion};
use crate::endpoints;
use crate::error::{AuthError, ExchangeFailure};

const GITHUB_API_VERSION: &str = "2022-11-28";
pub(crate) const DEFAULT_USER_AGENT: &str = concat!("github-identity/", env!("CARGO_PKG_VERSION"));

/// Interface for exchanging an App assertion for an installation token.
///
/// The production implementation talks to GitHub over HTTPS; tests substitute
/// their own to observe or forbid network activity.
#[async_trait]
pub trait TokenExchanger: Send + Sync {
    /// Exchange `assertion` for a token scoped to `installation_id`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::ExchangeFailed` on transport failure, a non-2xx
    /// response, or a response body that does not contain a token.
    async fn exchange(
        &self,
        base_url: &str,
        installation_id: &InstallationId,
        assertion: &SignedAssertion,
    ) -> Result<InstallationToken, AuthError>;
}

/// Body of a successful `access_tokens` response. Other fields are ignored.
#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    token: String,
    expires_at: DateTime<Utc>,
}

/// `TokenExchanger` backed by the GitHub REST API.
#[derive(Debug, Clone)]
pub struct GitHubTokenExchanger {
    http_client: reqwest::Client,
}

impl GitHubTokenExchanger {
    /// Create an exchanger with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::ExchangeFailed` if the HTTP client cannot be
    /// initialised (for example when no TLS backend is available).
    pub fn new() -> Result<Self, AuthError> {
        let http_client = reqwest::Client::builder()
            .user_agent(DEFAULT_USER_AGENT)
            .build()
            .map_err(ExchangeFailure::Transport)?;

        Ok(Self { http_client })
    }

    /// Create an exchanger that sends requests through `http_client`.
    pub fn with_client(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }
}

#[async_trait]
impl TokenExchanger for GitHubTokenExchanger {
    async fn exchange(
        &self,
        base_url: &str,
        installation_id: &InstallationId,
        assertion: &SignedAssertion,
    ) -> Result<InstallationToken, AuthError> {
        let url = access_token_url(base_url, installation_id);
        debug!(url = %url, "Requesting installation access token");

        let response = self
            .http_client
            .post(&url)
            .header("Authorization", format!("Bearer {}", assertion.token()))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
            .send()
            .await
            .map_err(ExchangeFailure::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error body".to_string());
            warn!(
                installation_id = %installation_id,
                status = status.as_u16(),
                "GitHub rejected installation token request"
            );
            return Err(ExchangeFailure::Status {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let body = response.text().await.map_err(ExchangeFailure::Transport)?;
        let parsed: AccessTokenResponse =
            serde_json::from_str(&body).map_err(|e| ExchangeFailure::MalformedResponse {
                message: format!("Failed to parse access token response: {}", e),
            })?;

        if parsed.token.is_empty() {
            return Err(ExchangeFailure::MalformedResponse {
                message: "response contained an empty token".to_string(),
            }
            .into());
        }

        info!(
            installation_id = %installation_id,
            expires_at = %parsed.expires_at,
            "Obtained installation access token"
        );

        Ok(InstallationToken::new(parsed.token, parsed.expires_at))
    }
}

/// Build the token endpoint URL under the REST API root for `base_url`.
pub(crate) fn access_token_url(base_url: &str, installation_id: &InstallationId) -> String {
    format!(
        "{}app/installations/{}/access_tokens",
        endpoints::rest_api_url(base_url),
        installation_id
    )
}

#[cfg(test)]
#[path = "exchange_tests.rs"]
mod tests;
