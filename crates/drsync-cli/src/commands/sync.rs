//! Sync command - Upload or download synchronized data
//!
//! Provides the `drsync sync` CLI command which:
//! 1. Loads configuration and builds the OAuth session for the backend
//! 2. Reuses the refresh token from the system keyring, or asks for a code
//! 3. Reads the remote manifest and picks a direction (bootstrap upload when
//!    nothing was synced yet, otherwise the flag or an interactive choice)
//! 4. Runs the transfer with a live status line; Ctrl-C stops it between files

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Args;
use drsync_cloud::auth::KeyringTokenStorage;
use drsync_core::domain::{display_timestamp, BackendKind, SyncFlags, SyncManifest};
use drsync_sync::pipeline::{Connection, PreAuth, SyncPipeline};
use drsync_sync::reporter::{task_message_dots, transfer_bar, ProgressReporter};
use drsync_sync::task::Task;
use drsync_sync::transfer::{Direction, TransferReport};
use drsync_sync::SyncError;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{ask_for_code, auth_session, poll_interval, prompt, sync_settings, GlobalOptions};
use crate::output::{get_formatter, OutputFormatter};

#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Overwrite the remote copy with local data
    #[arg(long, conflicts_with = "download")]
    pub upload: bool,

    /// Overwrite local data with the remote copy
    #[arg(long)]
    pub download: bool,

    /// Authorization code, used when the saved session is missing or expired
    #[arg(long)]
    pub code: Option<String>,

    /// Print the authorize URL instead of opening a browser
    #[arg(long)]
    pub no_browser: bool,
}

/// How the direction of a run is decided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Choice {
    Fixed(Direction),
    Ask,
}

impl SyncCommand {
    pub async fn execute(&self, options: &GlobalOptions) -> Result<()> {
        let fmt = get_formatter(options.is_json());

        let config = options.load_config()?;
        let backend = options.backend(&config);
        let poll = poll_interval(&config);
        let session = Arc::new(auth_session(&config, backend)?);
        let pipeline = SyncPipeline::new(session, sync_settings(&config)?);

        let connection = connect(
            &pipeline,
            backend,
            self.code.clone(),
            !self.no_browser,
            poll,
            &*fmt,
        )
        .await?;

        let manifest = connection.existing_manifest.clone();
        let direction = match resolve_direction(self.upload, self.download, manifest.as_ref())? {
            Choice::Fixed(direction) => direction,
            Choice::Ask if options.is_json() => {
                anyhow::bail!("Previously synchronized data exists; pass --upload or --download")
            }
            Choice::Ask => {
                let last_sync = manifest.as_ref().map(|m| m.last_sync.as_str()).unwrap_or("");
                match ask_direction(backend, last_sync).await? {
                    Some(direction) => direction,
                    None => {
                        fmt.info("Nothing was synchronized");
                        return Ok(());
                    }
                }
            }
        };

        let flags = flags_for(direction, &config.sync.flags, manifest.as_ref());
        info!(%backend, %direction, "Starting transfer");

        let account = connection.account_display_name.clone();
        let report = transfer(pipeline, connection, direction, flags, poll, &*fmt).await?;

        fmt.transfer_done(backend, &account, &report);
        Ok(())
    }
}

/// Refreshes the saved session or runs the code flow, then persists the
/// refresh token for the next run
pub(crate) async fn connect(
    pipeline: &SyncPipeline,
    backend: BackendKind,
    code: Option<String>,
    open_browser: bool,
    poll: Duration,
    fmt: &dyn OutputFormatter,
) -> Result<Connection> {
    let saved = KeyringTokenStorage::load(backend).unwrap_or_else(|e| {
        warn!(error = %format!("{e:#}"), "Could not read the saved session");
        None
    });

    let pre_auth = watch(
        pipeline.start_pre_auth(saved),
        &format!("Connecting to {}", backend.display_name()),
        poll,
        fmt,
    )
    .await
    .context("Connection failed")?;

    let connection = match pre_auth {
        PreAuth::Connected(connection) => connection,
        PreAuth::RequiresCode { authorize_url } => {
            let code = match code {
                Some(code) => code,
                None => ask_for_code(&authorize_url, open_browser).await?,
            };
            watch(
                pipeline.complete_auth(code),
                &format!("Authenticating into {}", backend.display_name()),
                poll,
                fmt,
            )
            .await
            .context("Authorization failed")?
        }
    };

    if let Some(refresh_token) = &connection.refresh_token {
        if let Err(e) = KeyringTokenStorage::store(backend, refresh_token) {
            fmt.warn(&format!("Could not save the session: {e:#}"));
        }
    }
    Ok(connection)
}

/// Polls a stage with the dots animation until it finishes
async fn watch<T: Send + 'static>(
    task: Task<T>,
    message: &str,
    poll: Duration,
    fmt: &dyn OutputFormatter,
) -> Result<T, SyncError> {
    ProgressReporter::new(message)
        .with_animation(task_message_dots)
        .with_first_poll(poll)
        .run(task, |line: &str| fmt.status(line), Ok, Err)
        .await
}

async fn transfer(
    pipeline: SyncPipeline,
    connection: Connection,
    direction: Direction,
    flags: SyncFlags,
    poll: Duration,
    fmt: &dyn OutputFormatter,
) -> Result<TransferReport> {
    let cancel = CancellationToken::new();
    let pipeline = pipeline.with_cancellation(cancel.clone());
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current file");
            cancel.cancel();
        }
    });

    let task = match direction {
        Direction::Upload => pipeline.plan_and_run_upload(connection.client, flags),
        Direction::Download => pipeline.plan_and_run_download(connection.client, flags),
    };
    let result = ProgressReporter::new("")
        .with_animation(transfer_bar(direction))
        .with_first_poll(poll)
        .run(task, |line: &str| fmt.status(line), Ok, Err)
        .await;
    interrupt.abort();

    match result {
        Ok(report) => Ok(report),
        Err(SyncError::Cancelled) => anyhow::bail!("Sync interrupted"),
        Err(e) if e.is_auth_expired() => Err(anyhow::Error::new(e)
            .context("The session expired during the sync; run 'drsync auth login' and retry")),
        Err(e) => Err(anyhow::Error::new(e).context("Sync failed")),
    }
}

fn resolve_direction(upload: bool, download: bool, manifest: Option<&SyncManifest>) -> Result<Choice> {
    match (upload, download, manifest) {
        (_, true, None) => {
            anyhow::bail!("Nothing has been synchronized yet; run 'drsync sync --upload' first")
        }
        (_, true, Some(_)) => Ok(Choice::Fixed(Direction::Download)),
        (true, false, _) | (false, false, None) => Ok(Choice::Fixed(Direction::Upload)),
        (false, false, Some(_)) => Ok(Choice::Ask),
    }
}

/// Upload sends the configured categories; download fetches what the last
/// upload recorded
fn flags_for(direction: Direction, configured: &SyncFlags, manifest: Option<&SyncManifest>) -> SyncFlags {
    match (direction, manifest) {
        (Direction::Download, Some(manifest)) => manifest.settings,
        _ => *configured,
    }
}

async fn ask_direction(backend: BackendKind, last_sync: &str) -> Result<Option<Direction>> {
    let name = backend.display_name();
    eprintln!("  [1] Sync from {name}  Overwrite current data [{last_sync}]");
    eprintln!(
        "  [2] Sync to {name}    Overwrite previously synced data [{}]",
        display_timestamp(&Local::now())
    );

    let answer = prompt("Choose 1 or 2 (anything else cancels): ").await?;
    Ok(match answer.as_str() {
        "1" => Some(Direction::Download),
        "2" => Some(Direction::Upload),
        _ => None,
    })
}
