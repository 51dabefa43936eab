//! Caller-facing sync stages
//!
//! A sync run is a strict sequence of background stages, each returned as a
//! [`Task`] the caller polls (typically through a
//! [`ProgressReporter`](crate::reporter::ProgressReporter)):
//!
//! 1. [`SyncPipeline::start_pre_auth`] - refresh a saved token, or ask for a code
//! 2. [`SyncPipeline::complete_auth`] - exchange the pasted code (only when asked)
//! 3. [`SyncPipeline::plan_and_run_upload`] or
//!    [`SyncPipeline::plan_and_run_download`]
//!
//! Connecting fetches the account profile and the remote manifest. The
//! pipeline never picks a direction: without a manifest the caller
//! bootstraps with an upload, otherwise it asks the user.
//!
//! The cloud client is owned by the [`Connection`] and moved into the
//! transfer stage.

use std::fmt;
use std::sync::Arc;

use drsync_core::domain::{RemotePath, SyncFlags, SyncManifest, MARKER_PATH};
use drsync_core::ports::{IAuthSession, ICloudClient, RefreshOutcome, Tokens};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::filesystem::ExclusionFilter;
use crate::planner::{self, LocalRoots};
use crate::task::{Task, TaskContext};
use crate::transfer::{TransferEngine, TransferReport};
use crate::SyncError;

// ============================================================================
// Types
// ============================================================================

/// Immutable inputs shared by every stage
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub roots: LocalRoots,
    pub filter: ExclusionFilter,
}

/// An authenticated session, ready to transfer
pub struct Connection {
    pub client: Box<dyn ICloudClient>,
    pub account_display_name: String,
    /// Manifest of the previous upload; `None` when nothing was synced yet
    pub existing_manifest: Option<SyncManifest>,
    /// Refresh token to persist for the next run
    pub refresh_token: Option<String>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("backend", &self.client.backend())
            .field("account_display_name", &self.account_display_name)
            .field("existing_manifest", &self.existing_manifest)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .finish()
    }
}

/// Result of the pre-authentication stage
#[derive(Debug)]
pub enum PreAuth {
    /// The saved refresh token was still valid
    Connected(Connection),
    /// The user has to open `authorize_url` and paste back the code
    RequiresCode { authorize_url: String },
}

// ============================================================================
// SyncPipeline
// ============================================================================

/// Spawns the stages of a sync run
#[derive(Clone)]
pub struct SyncPipeline {
    auth: Arc<dyn IAuthSession>,
    settings: Arc<SyncSettings>,
    cancel: CancellationToken,
}

impl SyncPipeline {
    pub fn new(auth: Arc<dyn IAuthSession>, settings: SyncSettings) -> Self {
        Self {
            auth,
            settings: Arc::new(settings),
            cancel: CancellationToken::new(),
        }
    }

    /// Stages spawned from now on are cancelled together with `token`
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Cancels every running stage
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Refreshes `saved_refresh_token` and connects, or asks for a code
    pub fn start_pre_auth(&self, saved_refresh_token: Option<String>) -> Task<PreAuth> {
        let auth = Arc::clone(&self.auth);
        Task::spawn_with_token(self.cancel.child_token(), move |ctx| async move {
            pre_auth(auth.as_ref(), saved_refresh_token, &ctx).await
        })
    }

    /// Exchanges an authorization code and connects
    pub fn complete_auth(&self, code: String) -> Task<Connection> {
        let auth = Arc::clone(&self.auth);
        Task::spawn_with_token(self.cancel.child_token(), move |ctx| async move {
            authenticate(auth.as_ref(), &code, &ctx).await
        })
    }

    /// Scans the local trees and uploads them, finishing with the manifest
    pub fn plan_and_run_upload(&self, client: Box<dyn ICloudClient>, flags: SyncFlags) -> Task<TransferReport> {
        let settings = Arc::clone(&self.settings);
        Task::spawn_with_token(self.cancel.child_token(), move |ctx| async move {
            upload(client, settings, flags, &ctx).await
        })
    }

    /// Walks the remote trees selected by `flags` and downloads them
    pub fn plan_and_run_download(&self, client: Box<dyn ICloudClient>, flags: SyncFlags) -> Task<TransferReport> {
        let settings = Arc::clone(&self.settings);
        Task::spawn_with_token(self.cancel.child_token(), move |ctx| async move {
            download(client, settings, flags, &ctx).await
        })
    }
}

// ============================================================================
// Stage bodies
// ============================================================================

async fn pre_auth(
    auth: &dyn IAuthSession,
    saved_refresh_token: Option<String>,
    ctx: &TaskContext,
) -> Result<PreAuth, SyncError> {
    ctx.set_message(format!("Connecting to {}", auth.backend().display_name()));

    if let Some(refresh_token) = saved_refresh_token.filter(|_| auth.supports_refresh()) {
        match auth.refresh(&refresh_token).await? {
            RefreshOutcome::Refreshed(tokens) => {
                let connection = connect(auth, tokens, ctx).await?;
                return Ok(PreAuth::Connected(connection));
            }
            RefreshOutcome::Expired => {
                warn!(backend = %auth.backend(), "Saved session expired, authorization required");
            }
        }
    }

    Ok(PreAuth::RequiresCode {
        authorize_url: auth.authorize_url()?,
    })
}

async fn authenticate(auth: &dyn IAuthSession, code: &str, ctx: &TaskContext) -> Result<Connection, SyncError> {
    ctx.set_message(format!("Authenticating into {}", auth.backend().display_name()));
    let tokens = auth.exchange_code(code).await?;
    connect(auth, tokens, ctx).await
}

async fn connect(auth: &dyn IAuthSession, tokens: Tokens, ctx: &TaskContext) -> Result<Connection, SyncError> {
    ctx.check_cancelled()?;
    let client = auth.connect(&tokens)?;

    ctx.set_message("Connected. Gathering account information");
    let account = client.account_info().await?;
    ctx.set_message(format!(
        "Hello, {}! Checking previously synchronized data",
        account.display_name
    ));
    info!(backend = %auth.backend(), account = %account.display_name, "Connected");

    let existing_manifest = read_manifest(client.as_ref()).await?;
    Ok(Connection {
        client,
        account_display_name: account.display_name,
        existing_manifest,
        refresh_token: tokens.refresh_token,
    })
}

/// Reads the marker object; absence means nothing was synced yet
pub async fn read_manifest(client: &dyn ICloudClient) -> Result<Option<SyncManifest>, SyncError> {
    let marker = RemotePath::new(MARKER_PATH)?;
    match client.get_file(&marker).await {
        Ok(bytes) => SyncManifest::from_bytes(&bytes)
            .map(Some)
            .map_err(|e| SyncError::Manifest(e.to_string())),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn upload(
    client: Box<dyn ICloudClient>,
    settings: Arc<SyncSettings>,
    flags: SyncFlags,
    ctx: &TaskContext,
) -> Result<TransferReport, SyncError> {
    ctx.set_message("Scanning local files");
    let scan_settings = Arc::clone(&settings);
    let plan = tokio::task::spawn_blocking(move || {
        planner::plan_upload(&scan_settings.roots, &flags, &scan_settings.filter)
    })
    .await
    .map_err(|e| SyncError::Task(format!("local scan failed: {e}")))??;

    let manifest = SyncManifest::now(flags);
    TransferEngine::new(client.as_ref(), ctx)
        .upload(&plan, &manifest)
        .await
}

async fn download(
    client: Box<dyn ICloudClient>,
    settings: Arc<SyncSettings>,
    flags: SyncFlags,
    ctx: &TaskContext,
) -> Result<TransferReport, SyncError> {
    ctx.set_message("Verifying data");
    let plan = planner::plan_download(client.as_ref(), &settings.roots, &flags).await?;
    ctx.check_cancelled()?;

    TransferEngine::new(client.as_ref(), ctx).download(&plan).await
}
