//! Transfer planning
//!
//! Turns [`SyncFlags`] into an ordered list of files to move. The same flag
//! semantics drive both directions:
//!
//! | flag                          | upload (local scan)                 | download (remote)              |
//! |-------------------------------|-------------------------------------|--------------------------------|
//! | `installed_packages`          | whole `installed_packages` tree     | walk `/Installed Packages`     |
//! | `local_packages`              | `packages` tree minus user folders  | walk `/Packages`               |
//! | `user_directory`              | whole `packages_user` tree          | walk `/User`                   |
//! | preference flags (no user dir)| listed files that exist locally     | listed files that exist remotely |
//!
//! Roots are always visited in the order above, so identical inputs give
//! identical plans.

use std::path::{Path, PathBuf};

use drsync_core::config::Config;
use drsync_core::domain::{RemotePath, SyncFlags};
use drsync_core::ports::{ICloudClient, RemoteEntry};
use tracing::{debug, info};

use crate::filesystem::{self, ExclusionFilter};
use crate::walker;
use crate::SyncError;

// ============================================================================
// Local roots
// ============================================================================

/// The three local directories DrSync mirrors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalRoots {
    pub installed_packages: PathBuf,
    pub packages: PathBuf,
    /// User folder inside `packages`
    pub packages_user: PathBuf,
}

impl LocalRoots {
    pub fn new(installed_packages: impl Into<PathBuf>, packages: impl Into<PathBuf>, user_folder: &str) -> Self {
        let packages = packages.into();
        Self {
            installed_packages: installed_packages.into(),
            packages_user: packages.join(user_folder),
            packages,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.sync.installed_packages_dir.clone(),
            config.sync.packages_dir.clone(),
            &config.sync.user_folder,
        )
    }

    /// Name of the user folder, excluded when scanning `packages`
    pub fn user_folder_name(&self) -> String {
        filesystem::display_name(&self.packages_user)
    }
}

// ============================================================================
// Plans
// ============================================================================

/// One local file to upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadItem {
    /// Root the file was found under; its basename prefixes the remote path
    pub local_root: PathBuf,
    pub absolute_path: PathBuf,
}

impl UploadItem {
    /// Destination path on the backend
    pub fn remote_path(&self) -> Result<RemotePath, SyncError> {
        filesystem::remote_path_for(&self.local_root, &self.absolute_path)
    }

    pub fn file_name(&self) -> String {
        filesystem::display_name(&self.absolute_path)
    }
}

/// One remote file to download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadItem {
    /// Root the file is written under
    pub local_root: PathBuf,
    pub remote: RemoteEntry,
}

impl DownloadItem {
    /// Destination path on disk
    pub fn local_path(&self) -> Result<PathBuf, SyncError> {
        filesystem::local_path_for(&self.local_root, &self.remote.relative_path).ok_or_else(|| {
            SyncError::Manifest(format!(
                "{} does not belong under {}",
                self.remote.relative_path,
                self.local_root.display()
            ))
        })
    }

    pub fn file_name(&self) -> String {
        self.remote.name().to_string()
    }
}

/// Ordered list of uploads
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadPlan {
    pub items: Vec<UploadItem>,
}

/// Ordered list of downloads
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadPlan {
    pub items: Vec<DownloadItem>,
}

impl UploadPlan {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl DownloadPlan {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// ============================================================================
// Planning
// ============================================================================

/// Builds the upload plan from the local trees
pub fn plan_upload(
    roots: &LocalRoots,
    flags: &SyncFlags,
    filter: &ExclusionFilter,
) -> Result<UploadPlan, SyncError> {
    let mut items = Vec::new();

    let mut add_tree = |root: &Path, keep_folder: &dyn Fn(&str) -> bool| -> Result<(), SyncError> {
        for path in filesystem::scan_tree(root, filter, keep_folder)? {
            items.push(UploadItem {
                local_root: root.to_path_buf(),
                absolute_path: path,
            });
        }
        Ok(())
    };

    if flags.installed_packages {
        add_tree(&roots.installed_packages, &|_| true)?;
    }
    if flags.local_packages {
        let user_folder = roots.user_folder_name();
        add_tree(&roots.packages, &|name| name != user_folder)?;
    }
    if flags.user_directory {
        add_tree(&roots.packages_user, &|_| true)?;
    }

    for name in flags.preference_files() {
        let path = roots.packages_user.join(name);
        if path.exists() {
            items.push(UploadItem {
                local_root: roots.packages_user.clone(),
                absolute_path: path,
            });
        } else {
            debug!(file = name, "Preference file not present locally");
        }
    }

    info!(files = items.len(), "Planned upload");
    Ok(UploadPlan { items })
}

/// Builds the download plan from the remote trees
///
/// Disabled flags issue no remote requests.
pub async fn plan_download(
    client: &dyn ICloudClient,
    roots: &LocalRoots,
    flags: &SyncFlags,
) -> Result<DownloadPlan, SyncError> {
    let mut items = Vec::new();

    let trees = [
        (flags.installed_packages, &roots.installed_packages),
        (flags.local_packages, &roots.packages),
        (flags.user_directory, &roots.packages_user),
    ];
    for (enabled, local_root) in trees {
        if !enabled {
            continue;
        }
        let remote_root = filesystem::remote_root_for(local_root)?;
        for entry in walker::walk(client, &remote_root).await? {
            items.push(DownloadItem {
                local_root: local_root.clone(),
                remote: entry,
            });
        }
    }

    let preferences = flags.preference_files();
    if !preferences.is_empty() {
        let user_root = filesystem::remote_root_for(&roots.packages_user)?;
        for name in preferences {
            let path = user_root.join(name)?;
            match client.probe(&path).await? {
                Some(entry) if !entry.is_folder => items.push(DownloadItem {
                    local_root: roots.packages_user.clone(),
                    remote: entry,
                }),
                _ => debug!(path = %path, "Preference file not present remotely"),
            }
        }
    }

    info!(files = items.len(), "Planned download");
    Ok(DownloadPlan { items })
}
