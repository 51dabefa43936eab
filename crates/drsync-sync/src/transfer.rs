//! Transfer engine
//!
//! Executes a plan one file at a time, in plan order, publishing progress
//! through a [`TaskContext`].
//!
//! ## Upload
//!
//! 1. Remove the remote marker ("Preparing"), so an interrupted upload is
//!    never mistaken for a finished one
//! 2. Upload every planned file with overwrite
//! 3. Write the manifest to the marker path
//!
//! ## Download
//!
//! Fetch every planned file by id and write it below its local root,
//! creating missing parent directories. Existing files are overwritten in
//! place.
//!
//! ## Progress
//!
//! After `k` of `n` files the percentage is `floor(100 * k / (n + 1))`; it
//! only reaches 100 once the final step is done. The first failing file
//! aborts the run and nothing after it is attempted.

use std::fmt;
use std::time::Instant;

use drsync_core::domain::{RemotePath, SyncManifest, MARKER_PATH};
use drsync_core::ports::ICloudClient;
use serde::Serialize;
use tracing::{debug, error, info};

use crate::planner::{DownloadItem, DownloadPlan, UploadItem, UploadPlan};
use crate::task::TaskContext;
use crate::SyncError;

// ============================================================================
// Types
// ============================================================================

/// Which way files move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Upload,
    Download,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upload => write!(f, "upload"),
            Self::Download => write!(f, "download"),
        }
    }
}

/// Lifecycle of a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// Summary of a finished transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferReport {
    pub direction: Direction,
    pub files_transferred: usize,
    pub bytes_transferred: u64,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
}

/// Percentage after `completed` of `total` files
pub fn percentage(completed: usize, total: usize) -> u8 {
    let pct = completed.saturating_mul(100) / (total + 1);
    pct.min(100) as u8
}

/// File name of the marker, used in progress and error messages
fn marker_name() -> &'static str {
    MARKER_PATH.trim_start_matches('/')
}

// ============================================================================
// TransferEngine
// ============================================================================

/// Runs one plan against one client
pub struct TransferEngine<'a> {
    client: &'a dyn ICloudClient,
    ctx: &'a TaskContext,
    state: TransferState,
}

impl<'a> TransferEngine<'a> {
    pub fn new(client: &'a dyn ICloudClient, ctx: &'a TaskContext) -> Self {
        Self {
            client,
            ctx,
            state: TransferState::Pending,
        }
    }

    pub fn state(&self) -> TransferState {
        self.state
    }

    /// Uploads `plan`, then writes `manifest` to the marker path
    pub async fn upload(
        &mut self,
        plan: &UploadPlan,
        manifest: &SyncManifest,
    ) -> Result<TransferReport, SyncError> {
        let result = self.run_upload(plan, manifest).await;
        self.finish(Direction::Upload, result)
    }

    /// Downloads `plan` into the local roots
    pub async fn download(&mut self, plan: &DownloadPlan) -> Result<TransferReport, SyncError> {
        let result = self.run_download(plan).await;
        self.finish(Direction::Download, result)
    }

    fn finish(
        &mut self,
        direction: Direction,
        result: Result<TransferReport, SyncError>,
    ) -> Result<TransferReport, SyncError> {
        match &result {
            Ok(report) => {
                self.state = TransferState::Succeeded;
                info!(
                    %direction,
                    files = report.files_transferred,
                    bytes = report.bytes_transferred,
                    duration_ms = report.duration_ms,
                    "Transfer complete"
                );
            }
            Err(e) => {
                self.state = TransferState::Failed;
                error!(%direction, error = %e, "Transfer aborted");
            }
        }
        result
    }

    async fn run_upload(
        &mut self,
        plan: &UploadPlan,
        manifest: &SyncManifest,
    ) -> Result<TransferReport, SyncError> {
        self.state = TransferState::Running;
        let started = Instant::now();
        let total = plan.len();
        let marker = RemotePath::new(MARKER_PATH)?;

        self.ctx.check_cancelled()?;
        self.ctx.set_percentage(0);
        self.ctx.set_message("Preparing");
        self.ctx.set_current_file("Preparing");
        self.client
            .remove_file(&marker)
            .await
            .map_err(|e| SyncError::from(e).in_transfer(marker_name()))?;

        self.ctx.set_message("Syncing");
        let mut bytes = 0u64;
        for (index, item) in plan.items.iter().enumerate() {
            self.ctx.check_cancelled()?;
            self.ctx.set_percentage(percentage(index, total));

            let name = item.file_name();
            self.ctx.set_current_file(name.as_str());

            let sent = self
                .upload_one(item)
                .await
                .map_err(|e| e.in_transfer(name.as_str()))?;
            bytes += sent;
        }

        self.ctx.check_cancelled()?;
        self.ctx.set_percentage(percentage(total, total));
        self.ctx.set_current_file(marker_name());

        let body = manifest
            .to_bytes()
            .map_err(|e| SyncError::Manifest(e.to_string()))?;
        self.client
            .put_file(&marker, &body, true)
            .await
            .map_err(|e| SyncError::from(e).in_transfer(marker_name()))?;
        debug!(last_sync = %manifest.last_sync, "Wrote manifest");

        self.ctx.set_percentage(100);
        Ok(TransferReport {
            direction: Direction::Upload,
            files_transferred: total,
            bytes_transferred: bytes,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }

    async fn upload_one(&self, item: &UploadItem) -> Result<u64, SyncError> {
        let remote = item.remote_path()?;
        let data = tokio::fs::read(&item.absolute_path)
            .await
            .map_err(|e| SyncError::local_io(&item.absolute_path, e))?;

        self.client.put_file(&remote, &data, true).await?;
        debug!(path = %remote, bytes = data.len(), "Uploaded");
        Ok(data.len() as u64)
    }

    async fn run_download(&mut self, plan: &DownloadPlan) -> Result<TransferReport, SyncError> {
        self.state = TransferState::Running;
        let started = Instant::now();
        let total = plan.len();

        self.ctx.set_percentage(0);
        self.ctx.set_message("Syncing");
        let mut bytes = 0u64;
        for (index, item) in plan.items.iter().enumerate() {
            self.ctx.check_cancelled()?;

            let name = item.file_name();
            self.ctx.set_current_file(name.as_str());

            let received = self
                .download_one(item)
                .await
                .map_err(|e| e.in_transfer(name.as_str()))?;
            bytes += received;

            self.ctx.set_percentage(percentage(index + 1, total));
        }

        self.ctx.set_percentage(100);
        Ok(TransferReport {
            direction: Direction::Download,
            files_transferred: total,
            bytes_transferred: bytes,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }

    async fn download_one(&self, item: &DownloadItem) -> Result<u64, SyncError> {
        let target = item.local_path()?;
        let data = self.client.get_content(&item.remote.remote_id).await?;

        if let Some(dir) = target.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| SyncError::local_io(dir, e))?;
        }
        tokio::fs::write(&target, &data)
            .await
            .map_err(|e| SyncError::local_io(&target, e))?;

        debug!(path = %target.display(), bytes = data.len(), "Downloaded");
        Ok(data.len() as u64)
    }
}
