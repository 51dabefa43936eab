//! Domain error types
//!
//! Errors raised while validating domain values (paths, identifiers,
//! the serialized manifest).

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid remote path (e.g. contains a traversal segment)
    #[error("Invalid remote path: {0}")]
    InvalidRemotePath(String),

    /// Invalid remote ID
    #[error("Invalid remote ID: {0}")]
    InvalidRemoteId(String),

    /// Unknown backend name
    #[error("Unknown backend: {0}")]
    UnknownBackend(String),

    /// The manifest marker body could not be encoded or decoded
    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}
