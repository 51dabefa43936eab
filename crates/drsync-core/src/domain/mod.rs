//! Domain types
//!
//! This module contains the core domain types for DrSync:
//! - Newtypes for remote paths and identifiers, plus path normalization
//! - The synchronization flags and the manifest marker object
//! - Domain-specific error types

pub mod errors;
pub mod manifest;
pub mod newtypes;

pub use errors::DomainError;
pub use manifest::{display_timestamp, SyncFlags, SyncManifest, MARKER_PATH};
pub use newtypes::*;
