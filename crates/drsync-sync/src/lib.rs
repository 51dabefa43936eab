//! DrSync Sync - Synchronization engine
//!
//! Provides:
//! - Whole-tree upload and download between local roots and a cloud backend
//! - Deterministic transfer plans driven by [`SyncFlags`](drsync_core::domain::SyncFlags)
//! - Background tasks with progress, cancellation and a polling reporter
//!
//! ## Modules
//!
//! - [`task`] - Background task runner with observable progress
//! - [`reporter`] - Polls a running task and renders status frames
//! - [`filesystem`] - Local tree scanner with exclusion patterns
//! - [`walker`] - Depth-first remote tree walker
//! - [`planner`] - Builds upload and download plans
//! - [`transfer`] - Executes a plan file by file
//! - [`pipeline`] - Caller-facing stages: connect, authenticate, sync

pub mod filesystem;
pub mod pipeline;
pub mod planner;
pub mod reporter;
pub mod task;
pub mod transfer;
pub mod walker;

use std::path::PathBuf;

use drsync_core::domain::DomainError;
use drsync_core::ports::{AuthError, CloudError};
use thiserror::Error;

/// Errors that can occur during synchronization operations
#[derive(Debug, Error)]
pub enum SyncError {
    /// A cloud request failed
    #[error("Cloud error: {0}")]
    Cloud(#[from] CloudError),

    /// Authentication with the backend failed
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// A local file or directory could not be read or written
    #[error("IO error on {}: {source}", .path.display())]
    LocalIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A file transfer failed; `file` names the file in flight
    #[error("Failed to transfer {file}: {source}")]
    Transfer {
        file: String,
        #[source]
        source: Box<SyncError>,
    },

    /// The manifest marker could not be read or written
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// A domain value failed validation
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// An exclusion pattern is not a valid regular expression
    #[error("Invalid exclusion pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// The task was cancelled by the caller
    #[error("Cancelled")]
    Cancelled,

    /// The background task panicked or could not be joined
    #[error("Task failed: {0}")]
    Task(String),
}

impl SyncError {
    /// Wraps an I/O error with the path it concerns
    pub fn local_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::LocalIo {
            path: path.into(),
            source,
        }
    }

    /// Attaches the name of the file in flight
    pub fn in_transfer(self, file: impl Into<String>) -> Self {
        match self {
            Self::Cancelled => Self::Cancelled,
            other => Self::Transfer {
                file: file.into(),
                source: Box::new(other),
            },
        }
    }

    /// True when the backend rejected the access token
    pub fn is_auth_expired(&self) -> bool {
        match self {
            Self::Cloud(CloudError::AuthExpired) => true,
            Self::Transfer { source, .. } => source.is_auth_expired(),
            _ => false,
        }
    }
}
