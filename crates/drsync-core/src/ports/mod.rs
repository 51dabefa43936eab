//! Port definitions (hexagonal architecture interfaces)
//!
//! Ports are the interfaces the sync engine depends on; their
//! implementations live in the `drsync-cloud` adapter crate.
//!
//! ## Ports Overview
//!
//! - [`ICloudClient`] - Uniform file operations over one authenticated backend
//! - [`IAuthSession`] - OAuth2 code flow, token refresh and client construction

pub mod auth_session;
pub mod cloud_client;

pub use auth_session::{AuthError, Credential, IAuthSession, RefreshOutcome, Tokens};
pub use cloud_client::{AccountInfo, CloudError, ICloudClient, RemoteEntry};
