//! DrSync Cloud - HTTP adapters for the two supported backends
//!
//! Provides:
//! - OAuth2 authorization code flow and token refresh for both backends
//! - A path-addressed client speaking the Dropbox API v2
//! - A parent-linked client speaking the Google Drive API v2
//! - Keyring storage for refresh tokens
//!
//! ## Modules
//!
//! - [`auth`] - `OAuthSession` (the `IAuthSession` adapter) and `KeyringTokenStorage`
//! - [`http`] - Shared `reqwest` client construction and status-to-error mapping
//! - [`path_store`] - `PathStoreClient` (Dropbox)
//! - [`parent_link`] - `ParentLinkClient` (Google Drive)

pub mod auth;
pub mod http;
pub mod parent_link;
pub mod path_store;

pub use auth::{Endpoints, KeyringTokenStorage, OAuthSession};
pub use parent_link::ParentLinkClient;
pub use path_store::PathStoreClient;
