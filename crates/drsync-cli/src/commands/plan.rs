//! Plan command - Show which files a sync would transfer
//!
//! The upload plan is computed from the local trees alone. The download plan
//! needs a connection: it walks the remote trees recorded in the manifest.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use drsync_sync::pipeline::SyncPipeline;
use drsync_sync::planner::{self, DownloadPlan, UploadPlan};
use drsync_sync::transfer::Direction;
use tracing::info;

use super::{auth_session, poll_interval, sync::connect, sync_settings, GlobalOptions};
use crate::output::{get_formatter, OutputFormatter, PlanListing, PlanRow};

#[derive(Debug, Args)]
pub struct PlanCommand {
    /// Show the download plan instead of the upload plan
    #[arg(long)]
    pub download: bool,

    /// Authorization code, used when the saved session is missing or expired
    #[arg(long)]
    pub code: Option<String>,
}

impl PlanCommand {
    pub async fn execute(&self, options: &GlobalOptions) -> Result<()> {
        let fmt = get_formatter(options.is_json());
        let config = options.load_config()?;
        let settings = sync_settings(&config)?;

        if !self.download {
            let plan = planner::plan_upload(&settings.roots, &config.sync.flags, &settings.filter)
                .context("Failed to scan local files")?;
            info!(files = plan.len(), "Computed upload plan");
            print_upload(&*fmt, &plan)?;
            return Ok(());
        }

        let backend = options.backend(&config);
        let session = Arc::new(auth_session(&config, backend)?);
        let pipeline = SyncPipeline::new(session, settings.clone());
        let connection = connect(
            &pipeline,
            backend,
            self.code.clone(),
            true,
            poll_interval(&config),
            &*fmt,
        )
        .await?;

        let Some(manifest) = connection.existing_manifest else {
            anyhow::bail!(
                "Nothing has been synchronized to {} yet",
                backend.display_name()
            );
        };

        let plan = planner::plan_download(connection.client.as_ref(), &settings.roots, &manifest.settings)
            .await
            .context("Failed to list remote files")?;
        info!(files = plan.len(), "Computed download plan");
        print_download(&*fmt, &plan, &manifest.last_sync)
    }
}

fn print_upload(fmt: &dyn OutputFormatter, plan: &UploadPlan) -> Result<()> {
    let mut rows = Vec::with_capacity(plan.len());
    for item in &plan.items {
        rows.push(PlanRow {
            remote: item.remote_path()?.to_string(),
            local: item.absolute_path.display().to_string(),
        });
    }

    fmt.plan(&PlanListing {
        direction: Direction::Upload,
        last_sync: None,
        rows,
    });
    Ok(())
}

fn print_download(fmt: &dyn OutputFormatter, plan: &DownloadPlan, last_sync: &str) -> Result<()> {
    let mut rows = Vec::with_capacity(plan.len());
    for item in &plan.items {
        rows.push(PlanRow {
            remote: item.remote.relative_path.to_string(),
            local: item.local_path()?.display().to_string(),
        });
    }

    fmt.plan(&PlanListing {
        direction: Direction::Download,
        last_sync: Some(last_sync.to_string()),
        rows,
    });
    Ok(())
}
