//! Cloud client port (driven/secondary port)
//!
//! This module defines the uniform file operations the sync engine performs
//! against a cloud backend. Two adapters implement it: a path-addressed
//! store (Dropbox-style) and a parent-linked object store (Drive-style).
//!
//! ## Design Notes
//!
//! - Errors are classified with [`CloudError`] rather than `anyhow`, because
//!   the engine treats `NotFound` during probing as absence, not failure.
//! - A client is bound to one authenticated session and owned by one sync
//!   run; it is moved from stage to stage as a `Box<dyn ICloudClient>`.
//! - Implementations never retry.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::newtypes::{BackendKind, RemoteId, RemotePath};

// ============================================================================
// CloudError
// ============================================================================

/// Failure of a single cloud operation
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CloudError {
    /// Connection failure, timeout, truncated body or server-side (5xx) error
    #[error("Transport error: {0}")]
    Transport(String),

    /// The addressed object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// An object already exists where a non-overwriting write was requested
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The access token was rejected (HTTP 401)
    #[error("Authorization expired or revoked")]
    AuthExpired,

    /// The response could not be interpreted
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// Any other non-success response
    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
}

impl CloudError {
    /// Returns true if this error means the object is absent
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, CloudError::NotFound(_))
    }
}

// ============================================================================
// DTOs
// ============================================================================

/// Information about the authenticated account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    /// Display name shown in the greeting
    pub display_name: String,
    /// Account email, when the backend reports one
    pub email: Option<String>,
}

/// A remote object discovered by listing or probing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    /// Normalized path relative to the managed root
    pub relative_path: RemotePath,
    /// Backend-specific identifier, usable with [`ICloudClient::get_content`]
    pub remote_id: RemoteId,
    pub is_folder: bool,
}

impl RemoteEntry {
    /// Last path segment
    #[must_use]
    pub fn name(&self) -> &str {
        self.relative_path.file_name().unwrap_or_default()
    }
}

// ============================================================================
// ICloudClient trait
// ============================================================================

/// Port trait for file operations on one authenticated backend
///
/// All paths are relative to the backend's managed root (the account root
/// for the path store, the `appdata` folder for the parent-link store).
#[async_trait::async_trait]
pub trait ICloudClient: Send + Sync {
    /// Which storage model this client talks to
    fn backend(&self) -> BackendKind;

    /// Retrieves the authenticated account's profile
    async fn account_info(&self) -> Result<AccountInfo, CloudError>;

    /// Downloads the object at `path`
    async fn get_file(&self, path: &RemotePath) -> Result<Vec<u8>, CloudError>;

    /// Downloads an object by the id a listing produced
    async fn get_content(&self, remote_id: &RemoteId) -> Result<Vec<u8>, CloudError>;

    /// Probes `path`; `NotFound` when absent
    async fn stat(&self, path: &RemotePath) -> Result<RemoteEntry, CloudError>;

    /// Writes `data` to `path`
    ///
    /// With `overwrite == false` the path store fails with `Conflict` when an
    /// object already exists. The parent-link store always replaces every
    /// same-named sibling.
    async fn put_file(
        &self,
        path: &RemotePath,
        data: &[u8],
        overwrite: bool,
    ) -> Result<RemoteEntry, CloudError>;

    /// Deletes the object(s) at `path`; absence counts as success
    async fn remove_file(&self, path: &RemotePath) -> Result<(), CloudError>;

    /// Lists the direct children of the folder at `path`, in backend order
    async fn list_children(&self, path: &RemotePath) -> Result<Vec<RemoteEntry>, CloudError>;

    /// Makes sure every folder along `path` exists
    ///
    /// Returns the leaf folder id for backends that address folders by id.
    async fn ensure_folder(&self, path: &RemotePath) -> Result<Option<RemoteId>, CloudError>;

    /// [`stat`](Self::stat) with absence mapped to `None`
    async fn probe(&self, path: &RemotePath) -> Result<Option<RemoteEntry>, CloudError> {
        match self.stat(path).await {
            Ok(entry) => Ok(Some(entry)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}
