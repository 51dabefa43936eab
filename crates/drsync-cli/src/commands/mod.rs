//! Subcommands and the helpers they share

pub mod auth;
pub mod completions;
pub mod config;
pub mod plan;
pub mod sync;

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use drsync_cloud::auth::{open_authorize_page, Endpoints, OAuthSession};
use drsync_core::config::Config;
use drsync_core::domain::BackendKind;
use drsync_sync::filesystem::ExclusionFilter;
use drsync_sync::pipeline::SyncSettings;
use drsync_sync::planner::LocalRoots;
use tracing::{info, warn};

use crate::output::OutputFormat;

/// Options every command receives from the global flags
#[derive(Debug, Clone)]
pub struct GlobalOptions {
    pub format: OutputFormat,
    pub config_path: PathBuf,
    /// `--backend` override
    pub backend: Option<BackendKind>,
}

impl GlobalOptions {
    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    /// Loads the configuration file; defaults apply only when it is missing
    pub fn load_config(&self) -> Result<Config> {
        let config = Config::load_if_exists(&self.config_path)?;
        info!(config_path = %self.config_path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Backend selected for this run
    pub fn backend(&self, config: &Config) -> BackendKind {
        self.backend.unwrap_or(config.sync.backend)
    }
}

/// Builds the OAuth session for `backend` from the configured credential
pub fn auth_session(config: &Config, backend: BackendKind) -> Result<OAuthSession> {
    let credential = config.credential(backend).with_context(|| {
        format!(
            "No app credential configured for {}. Run 'drsync config set auth.{}.client_id <id>' first.",
            backend.display_name(),
            backend
        )
    })?;

    OAuthSession::with_endpoints(
        backend,
        credential,
        config.auth.redirect_uri.as_deref(),
        Endpoints::for_backend(backend),
        Duration::from_secs(config.network.timeout_secs),
    )
    .context("Failed to set up authorization")
}

/// Local roots and exclusion patterns from the configuration
pub fn sync_settings(config: &Config) -> Result<SyncSettings> {
    let filter = ExclusionFilter::new(
        &config.sync.exclude_folder_patterns,
        &config.sync.exclude_file_patterns,
    )
    .context("Invalid exclusion pattern in configuration")?;

    Ok(SyncSettings {
        roots: LocalRoots::from_config(config),
        filter,
    })
}

/// Interval between progress polls
pub fn poll_interval(config: &Config) -> Duration {
    Duration::from_millis(config.network.poll_interval_ms)
}

/// Shows `authorize_url` and reads the code the user pastes back
pub async fn ask_for_code(authorize_url: &str, open_browser: bool) -> Result<String> {
    if open_browser {
        if let Err(e) = open_authorize_page(authorize_url) {
            warn!(error = %e, "Could not open browser");
        }
    }
    eprintln!("Please allow DrSync and get the code from:");
    eprintln!("  {authorize_url}");

    let code = prompt("Authorization code: ").await?;
    anyhow::ensure!(!code.is_empty(), "No authorization code entered");
    Ok(code)
}

/// Prints `message` to stderr and reads one trimmed line from stdin
pub async fn prompt(message: &str) -> Result<String> {
    let message = message.to_string();
    let line = tokio::task::spawn_blocking(move || -> std::io::Result<String> {
        let mut stderr = std::io::stderr().lock();
        write!(stderr, "{message}")?;
        stderr.flush()?;

        let mut line = String::new();
        std::io::stdin().read_line(&mut line)?;
        Ok(line)
    })
    .await
    .context("Input task failed")?
    .context("Failed to read from stdin")?;

    Ok(line.trim().to_string())
}
