//! Auth commands - Login, Logout, and Status
//!
//! Provides the `drsync auth` CLI subcommands which:
//! 1. `login`  - Runs the authorization code flow for the selected backend and
//!    stores the refresh token in the system keyring.
//! 2. `logout` - Clears the stored refresh token.
//! 3. `status` - Refreshes the stored token and shows the connected account.

use anyhow::{Context, Result};
use clap::Subcommand;
use drsync_cloud::auth::{KeyringTokenStorage, OAuthSession};
use drsync_core::domain::BackendKind;
use drsync_core::ports::{IAuthSession, RefreshOutcome, Tokens};
use tracing::info;

use super::{ask_for_code, auth_session, GlobalOptions};
use crate::output::{get_formatter, OutputFormatter};

#[derive(Debug, Subcommand)]
pub enum AuthCommand {
    /// Authorize DrSync with the selected backend
    Login {
        /// Authorization code obtained from the authorize page
        #[arg(long)]
        code: Option<String>,

        /// Print the authorize URL instead of opening a browser
        #[arg(long)]
        no_browser: bool,
    },
    /// Remove the stored refresh token
    Logout,
    /// Check authorization status
    Status,
}

impl AuthCommand {
    pub async fn execute(&self, options: &GlobalOptions) -> Result<()> {
        let fmt = get_formatter(options.is_json());
        match self {
            AuthCommand::Login { code, no_browser } => {
                self.execute_login(options, code.clone(), !no_browser, &*fmt)
                    .await
            }
            AuthCommand::Logout => self.execute_logout(options, &*fmt).await,
            AuthCommand::Status => self.execute_status(options, &*fmt).await,
        }
    }

    /// Execute the login flow:
    /// 1. Build the OAuth session from the configured credential
    /// 2. Obtain a code (flag or prompt) and exchange it
    /// 3. Store the refresh token in the keyring
    /// 4. Fetch the account profile
    async fn execute_login(
        &self,
        options: &GlobalOptions,
        code: Option<String>,
        open_browser: bool,
        fmt: &dyn OutputFormatter,
    ) -> Result<()> {
        let config = options.load_config()?;
        let backend = options.backend(&config);
        let session = auth_session(&config, backend)?;

        info!(%backend, "Starting authorization");

        let code = match code {
            Some(code) => code,
            None => {
                let url = session
                    .authorize_url()
                    .context("Failed to build the authorize URL")?;
                ask_for_code(&url, open_browser).await?
            }
        };

        let tokens = session
            .exchange_code(&code)
            .await
            .context("Authorization failed")?;

        match &tokens.refresh_token {
            Some(refresh_token) => KeyringTokenStorage::store(backend, refresh_token)?,
            None => fmt.warn(&format!(
                "{} did not issue a refresh token; you will be asked to authorize again next time",
                backend.display_name()
            )),
        }

        let display_name = account_name(&session, &tokens).await?;
        info!(%backend, account = %display_name, "Authorization complete");

        if options.is_json() {
            fmt.print_json(&serde_json::json!({
                "success": true,
                "backend": backend.as_str(),
                "display_name": display_name,
            }));
        } else {
            fmt.success(&format!(
                "Logged in to {} as {}",
                backend.display_name(),
                display_name
            ));
        }
        Ok(())
    }

    async fn execute_logout(&self, options: &GlobalOptions, fmt: &dyn OutputFormatter) -> Result<()> {
        let config = options.load_config()?;
        let backend = options.backend(&config);

        KeyringTokenStorage::clear(backend)?;

        if options.is_json() {
            fmt.print_json(&serde_json::json!({
                "success": true,
                "backend": backend.as_str(),
            }));
        } else {
            fmt.success(&format!("Logged out of {}", backend.display_name()));
        }
        Ok(())
    }

    async fn execute_status(&self, options: &GlobalOptions, fmt: &dyn OutputFormatter) -> Result<()> {
        let config = options.load_config()?;
        let backend = options.backend(&config);

        let Some(refresh_token) = KeyringTokenStorage::load(backend)? else {
            report_status(options, fmt, backend, None, "not logged in");
            return Ok(());
        };

        let session = auth_session(&config, backend)?;
        match session
            .refresh(&refresh_token)
            .await
            .context("Failed to refresh the saved session")?
        {
            RefreshOutcome::Refreshed(tokens) => {
                if let Some(rotated) = tokens.refresh_token.as_deref() {
                    if rotated != refresh_token {
                        KeyringTokenStorage::store(backend, rotated)?;
                    }
                }
                let display_name = account_name(&session, &tokens).await?;
                report_status(options, fmt, backend, Some(&display_name), "authorized");
            }
            RefreshOutcome::Expired => {
                report_status(options, fmt, backend, None, "session expired");
            }
        }
        Ok(())
    }
}

async fn account_name(session: &OAuthSession, tokens: &Tokens) -> Result<String> {
    let client = session
        .connect(tokens)
        .context("Failed to create the cloud client")?;
    let account = client
        .account_info()
        .await
        .context("Failed to fetch account information")?;
    Ok(account.display_name)
}

fn report_status(
    options: &GlobalOptions,
    fmt: &dyn OutputFormatter,
    backend: BackendKind,
    display_name: Option<&str>,
    state: &str,
) {
    if options.is_json() {
        fmt.print_json(&serde_json::json!({
            "backend": backend.as_str(),
            "authenticated": display_name.is_some(),
            "state": state,
            "display_name": display_name,
        }));
        return;
    }

    match display_name {
        Some(name) => fmt.success(&format!("Logged in to {} as {}", backend.display_name(), name)),
        None => {
            fmt.warn(&format!("{}: {}", backend.display_name(), state));
            fmt.info("Run 'drsync auth login' to authorize DrSync.");
        }
    }
}
