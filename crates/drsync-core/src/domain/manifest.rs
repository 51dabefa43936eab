//! Sync flags and the remote manifest marker
//!
//! The manifest is a small JSON object stored at [`MARKER_PATH`] in the
//! remote area. Its presence means a previous upload ran to completion; its
//! `settings` record which categories that upload carried. The list of
//! transferred files is never persisted.

use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Remote path of the manifest marker object
pub const MARKER_PATH: &str = "/DrSync.drsync-data";

/// `strftime` pattern of [`SyncManifest::last_sync`], e.g. `18 Oct 2026 09:05`
pub const TIMESTAMP_FORMAT: &str = "%-d %b %Y %H:%M";

// ============================================================================
// SyncFlags
// ============================================================================

/// Categories selected for synchronization.
///
/// Serialized as a JSON object of string to bool. Missing keys decode as
/// `false` so that manifests written with fewer categories stay readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncFlags {
    /// The whole `Installed Packages` tree
    pub installed_packages: bool,
    /// The whole `Packages` tree except the user folder
    pub local_packages: bool,
    /// The whole `Packages/User` tree
    pub user_directory: bool,
    pub package_control_preferences: bool,
    pub drsync_preferences: bool,
    /// Editor preferences and the three platform keymaps
    pub sublime_preferences: bool,
}

impl SyncFlags {
    /// Every category enabled
    #[must_use]
    pub fn all() -> Self {
        Self {
            installed_packages: true,
            local_packages: true,
            user_directory: true,
            package_control_preferences: true,
            drsync_preferences: true,
            sublime_preferences: true,
        }
    }

    /// No category enabled
    #[must_use]
    pub fn none() -> Self {
        Self {
            installed_packages: false,
            local_packages: false,
            user_directory: false,
            package_control_preferences: false,
            drsync_preferences: false,
            sublime_preferences: false,
        }
    }

    /// Returns true if at least one category is enabled
    #[must_use]
    pub fn any(&self) -> bool {
        self.installed_packages
            || self.local_packages
            || self.user_directory
            || self.package_control_preferences
            || self.drsync_preferences
            || self.sublime_preferences
    }

    /// Individual preference files under the user folder selected by these
    /// flags, in planning order.
    ///
    /// Always empty when `user_directory` is set, since the whole folder is
    /// then transferred.
    #[must_use]
    pub fn preference_files(&self) -> Vec<&'static str> {
        if self.user_directory {
            return Vec::new();
        }

        let mut files = Vec::new();
        if self.package_control_preferences {
            files.push("Package Control.sublime-settings");
        }
        if self.drsync_preferences {
            files.push("DrSync.sublime-settings");
        }
        if self.sublime_preferences {
            files.extend([
                "Preferences.sublime-settings",
                "Default (Windows).sublime-keymap",
                "Default (OSX).sublime-keymap",
                "Default (Linux).sublime-keymap",
            ]);
        }
        files
    }

    /// Set a flag by its serialized name
    ///
    /// # Errors
    /// Returns error for an unknown flag name
    pub fn set(&mut self, name: &str, value: bool) -> Result<(), DomainError> {
        let slot = match name {
            "installed_packages" => &mut self.installed_packages,
            "local_packages" => &mut self.local_packages,
            "user_directory" => &mut self.user_directory,
            "package_control_preferences" => &mut self.package_control_preferences,
            "drsync_preferences" => &mut self.drsync_preferences,
            "sublime_preferences" => &mut self.sublime_preferences,
            other => {
                return Err(DomainError::ValidationFailed(format!(
                    "unknown sync flag '{other}'"
                )))
            }
        };
        *slot = value;
        Ok(())
    }
}

impl Default for SyncFlags {
    fn default() -> Self {
        Self::all()
    }
}

// ============================================================================
// SyncManifest
// ============================================================================

/// Contents of the remote marker object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncManifest {
    pub settings: SyncFlags,
    /// Local time of the upload, formatted with [`TIMESTAMP_FORMAT`]
    pub last_sync: String,
}

impl SyncManifest {
    /// Manifest for an upload finishing now
    #[must_use]
    pub fn now(settings: SyncFlags) -> Self {
        Self {
            settings,
            last_sync: display_timestamp(&Local::now()),
        }
    }

    /// Serialize to the JSON body of the marker object
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_bytes(&self) -> Result<Vec<u8>, DomainError> {
        serde_json::to_vec(self).map_err(|e| DomainError::InvalidManifest(e.to_string()))
    }

    /// Parse the JSON body of the marker object
    ///
    /// # Errors
    /// Returns error if the body is not a valid manifest
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DomainError> {
        serde_json::from_slice(bytes).map_err(|e| DomainError::InvalidManifest(e.to_string()))
    }
}

/// Formats a timestamp the way [`SyncManifest::last_sync`] stores it
#[must_use]
pub fn display_timestamp<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format(TIMESTAMP_FORMAT).to_string()
}
