//! Authentication session port
//!
//! An [`IAuthSession`] knows one backend's OAuth2 endpoints and the app
//! credential. It produces the authorization URL, exchanges codes and
//! refresh tokens for [`Tokens`], and builds the matching cloud client.
//! Persisting tokens is the caller's job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::cloud_client::{CloudError, ICloudClient};
use crate::domain::newtypes::BackendKind;

// ============================================================================
// Credential
// ============================================================================

/// App credential registered with a backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// App key (Dropbox) or OAuth client id (Google)
    pub client_id: String,
    /// App secret; optional for public clients
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Scopes to request; empty means the backend default
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl Credential {
    pub fn new(client_id: impl Into<String>, client_secret: Option<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret,
            scopes: Vec::new(),
        }
    }
}

// ============================================================================
// Tokens
// ============================================================================

/// OAuth tokens held in memory for one sync run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tokens {
    /// Bearer token for API requests
    pub access_token: String,
    /// Usually `bearer`
    pub token_type: String,
    /// Token for obtaining new access tokens without user interaction
    pub refresh_token: Option<String>,
    /// When the access token expires, if the server said so
    pub expires_at: Option<DateTime<Utc>>,
}

impl Tokens {
    /// Returns true if the access token is known to have expired
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Utc::now() >= at)
    }
}

/// Result of a refresh attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// New tokens; `refresh_token` is always populated
    Refreshed(Tokens),
    /// The refresh token was revoked or expired; fall back to the code flow
    Expired,
}

// ============================================================================
// AuthError
// ============================================================================

/// Failure of an OAuth2 round trip
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    /// The authorization code or refresh token was rejected
    #[error("Invalid grant: {0}")]
    InvalidGrant(String),

    #[error("Transport error: {0}")]
    Transport(String),

    /// The token endpoint answered with something unparsable
    #[error("Malformed token response: {0}")]
    Malformed(String),

    /// Any other OAuth2 error response
    #[error("Authorization rejected: {0}")]
    Rejected(String),

    /// Bad endpoint URL or missing credential
    #[error("Configuration error: {0}")]
    Configuration(String),
}

// ============================================================================
// IAuthSession trait
// ============================================================================

/// Port trait for one backend's OAuth2 flow
#[async_trait::async_trait]
pub trait IAuthSession: Send + Sync {
    /// Which backend this session authenticates against
    fn backend(&self) -> BackendKind;

    /// Builds the URL the user opens to grant access
    ///
    /// Deterministic for a given credential and endpoint; performs no I/O.
    fn authorize_url(&self) -> Result<String, AuthError>;

    /// Exchanges an authorization code for tokens
    async fn exchange_code(&self, code: &str) -> Result<Tokens, AuthError>;

    /// Obtains a fresh access token from a refresh token
    ///
    /// A rejected refresh token yields `Ok(RefreshOutcome::Expired)`.
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshOutcome, AuthError>;

    /// Whether [`refresh`](Self::refresh) is meaningful for this backend
    fn supports_refresh(&self) -> bool;

    /// Builds the cloud client bound to `tokens`
    fn connect(&self, tokens: &Tokens) -> Result<Box<dyn ICloudClient>, CloudError>;
}
