//! # GitHub Identity CLI
//!
//! Command-line interface for checking a provider configuration:
//! - `resolve` loads settings, performs any App token exchange and reports the
//!   resulting identity (never the token itself)
//! - `describe` prints help for the provider settings

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use github_identity::{
    AuthError, ConfigError, ConfigFactory, IdentityError, ProviderContext, ProviderSettings,
    RawConfigInput, SettingsError,
};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_LEVEL_ARG: &str = "log-level";

pub mod descriptions;

// ============================================================================
// CLI Structure
// ============================================================================

/// GitHub identity CLI - resolve provider credentials
#[derive(Debug, Parser)]
#[command(name = "github-identity")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Resolve GitHub provider credentials into an identity")]
pub struct Cli {
    /// Provider settings file (TOML, YAML or JSON)
    #[arg(short, long, env = "GITHUB_IDENTITY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Logging level, used when RUST_LOG is not set
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// Enable JSON logging
    #[arg(long)]
    pub json_logs: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Resolve the configured identity and report it
    Resolve {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,

        /// Abandon the App token exchange after this many seconds
        #[arg(short, long)]
        timeout: Option<u64>,
    },

    /// Describe provider settings
    Describe {
        /// Setting to describe, e.g. `app_auth.pem_file`; all when omitted
        field: Option<String>,
    },
}

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON output
    Json,
}

// ============================================================================
// CLI Error Types
// ============================================================================

/// CLI-specific errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Authentication error: {0}")]
    Authentication(#[from] AuthError),

    #[error("Invalid argument: {arg} - {message}")]
    InvalidArgument { arg: String, message: String },

    #[error("Logging initialization failed: {message}")]
    Logging { message: String },

    #[error("Output error: {0}")]
    Output(#[from] serde_json::Error),
}

impl From<IdentityError> for CliError {
    fn from(error: IdentityError) -> Self {
        match error {
            IdentityError::Config(e) => Self::Configuration(e),
            IdentityError::Auth(e) => Self::Authentication(e),
        }
    }
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Settings(SettingsError::Identity(_)) => 2,
            Self::Settings(_) => 1,
            Self::Configuration(_) => 2,
            Self::Authentication(_) => 3,
            Self::InvalidArgument { .. } => 4,
            Self::Logging { .. } => 5,
            Self::Output(_) => 5,
        }
    }

    /// Whether this error can be reported through tracing.
    ///
    /// Logging setup failures happen before any subscriber exists; they are
    /// only reported on stderr.
    pub fn should_log(&self) -> bool {
        match self {
            Self::Logging { .. } => false,
            Self::InvalidArgument { arg, .. } => arg != LOG_LEVEL_ARG,
            _ => true,
        }
    }
}

// ============================================================================
// Identity report
// ============================================================================

/// Where the effective token came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenSource {
    Anonymous,
    StaticToken,
    AppInstallation,
}

impl TokenSource {
    pub fn of(input: &RawConfigInput) -> Self {
        if input.has_app_auth() {
            Self::AppInstallation
        } else if input.static_token().is_some() {
            Self::StaticToken
        } else {
            Self::Anonymous
        }
    }
}

/// Printable summary of a resolved identity. Never contains the token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct IdentityReport {
    pub owner: String,
    pub individual: bool,
    pub anonymous: bool,
    pub insecure: bool,
    pub base_url: String,
    pub rest_api_url: String,
    pub graphql_api_url: String,
    pub token_source: TokenSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_expires_at: Option<DateTime<Utc>>,
}

impl IdentityReport {
    pub fn new(context: &ProviderContext, token_source: TokenSource) -> Self {
        let identity = context.identity();
        Self {
            owner: identity.owner().to_string(),
            individual: identity.is_individual(),
            anonymous: identity.is_anonymous(),
            insecure: identity.is_insecure(),
            base_url: identity.base_url().to_string(),
            rest_api_url: identity.rest_api_url(),
            graphql_api_url: identity.graphql_api_url(),
            token_source,
            token_expires_at: context.token_expires_at(),
        }
    }

    /// Render the report in `format`.
    pub fn render(&self, format: OutputFormat) -> Result<String, CliError> {
        match format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(self)?),
            OutputFormat::Text => Ok(self.render_text()),
        }
    }

    fn render_text(&self) -> String {
        let owner = if self.owner.is_empty() {
            "(not set)"
        } else {
            self.owner.as_str()
        };
        let token_source = match self.token_source {
            TokenSource::Anonymous => "anonymous",
            TokenSource::StaticToken => "static token",
            TokenSource::AppInstallation => "GitHub App installation",
        };

        let mut lines = vec![
            format!("{:<18}{}", "owner:", owner),
            format!("{:<18}{}", "individual:", self.individual),
            format!("{:<18}{}", "anonymous:", self.anonymous),
            format!("{:<18}{}", "insecure:", self.insecure),
            format!("{:<18}{}", "base url:", self.base_url),
            format!("{:<18}{}", "rest api url:", self.rest_api_url),
            format!("{:<18}{}", "graphql api url:", self.graphql_api_url),
            format!("{:<18}{}", "token source:", token_source),
        ];
        if let Some(expires_at) = self.token_expires_at {
            lines.push(format!("{:<18}{}", "token expires at:", expires_at.to_rfc3339()));
        }
        lines.join("\n")
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

/// Main CLI entry point
pub async fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();

    initialize_logging(&cli)?;

    let output = execute(cli).await?;
    println!("{}", output);
    Ok(())
}

/// Execute a parsed command and return what should be printed.
pub async fn execute(cli: Cli) -> Result<String, CliError> {
    match cli.command {
        Commands::Resolve { format, timeout } => {
            execute_resolve_command(
                cli.config.as_deref(),
                format,
                timeout.map(Duration::from_secs),
            )
            .await
        }
        Commands::Describe { field } => execute_describe_command(field.as_deref()),
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// Initialize logging based on CLI arguments
///
/// Logs go to stderr so command output on stdout stays machine-readable.
fn initialize_logging(cli: &Cli) -> Result<(), CliError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .map_err(|e| CliError::InvalidArgument {
            arg: LOG_LEVEL_ARG.to_string(),
            message: e.to_string(),
        })?;

    let registry = tracing_subscriber::registry().with(filter);
    let result = if cli.json_logs {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };

    result.map_err(|e| CliError::Logging {
        message: e.to_string(),
    })
}

/// Execute resolve command
async fn execute_resolve_command(
    config_path: Option<&Path>,
    format: OutputFormat,
    timeout: Option<Duration>,
) -> Result<String, CliError> {
    let settings = ProviderSettings::load(config_path)?;
    let factory = ConfigFactory::new()?;

    let report = resolve_settings(settings, &factory, timeout).await?;
    report.render(format)
}

/// Resolve `settings` with `factory`, honouring Ctrl-C and `timeout`.
pub async fn resolve_settings(
    settings: ProviderSettings,
    factory: &ConfigFactory,
    timeout: Option<Duration>,
) -> Result<IdentityReport, CliError> {
    let input = settings.into_raw_input()?;
    let token_source = TokenSource::of(&input);

    let cancellation = CancellationToken::new();
    let triggers = spawn_cancellation_triggers(cancellation.clone(), timeout);

    let result = factory.configure(input, cancellation).await;
    triggers.abort();

    let context = result?;
    info!(token_source = ?token_source, "Identity resolved");

    Ok(IdentityReport::new(&context, token_source))
}

/// Cancel `cancellation` on Ctrl-C or once `timeout` elapses.
fn spawn_cancellation_triggers(
    cancellation: CancellationToken,
    timeout: Option<Duration>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let interrupted = async {
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
        };
        let deadline = async {
            match timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = cancellation.cancelled() => {}
            _ = interrupted => {
                warn!("Interrupt received; cancelling");
                cancellation.cancel();
            }
            _ = deadline => {
                warn!(timeout_ms = timeout.map(|t| t.as_millis() as u64), "Timed out; cancelling");
                cancellation.cancel();
            }
        }
    })
}

/// Execute describe command
fn execute_describe_command(field: Option<&str>) -> Result<String, CliError> {
    match field {
        Some(name) => descriptions::find(name)
            .map(descriptions::render)
            .ok_or_else(|| CliError::InvalidArgument {
                arg: "field".to_string(),
                message: format!("unknown setting '{}'", name),
            }),
        None => Ok(descriptions::FIELD_DESCRIPTIONS
            .iter()
            .map(descriptions::render)
            .collect::<Vec<_>>()
            .join("\n\n")),
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
