//! OAuth2 authorization code flow for both backends
//!
//! Implements [`IAuthSession`] on top of the `oauth2` crate. The user opens
//! the authorization URL, approves access and pastes the code shown by the
//! provider back into DrSync; refresh tokens then keep the session alive
//! across runs.
//!
//! ## Components
//!
//! - [`Endpoints`] - OAuth and API base URLs of one backend (overridable for tests)
//! - [`OAuthSession`] - The `IAuthSession` adapter; also builds the cloud client
//! - [`KeyringTokenStorage`] - Refresh-token storage in the system keyring
//! - [`open_authorize_page`] - Opens the authorization URL in the default browser

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use drsync_core::domain::BackendKind;
use drsync_core::ports::{
    AuthError, CloudError, Credential, IAuthSession, ICloudClient, RefreshOutcome, Tokens,
};
use oauth2::basic::{BasicClient, BasicErrorResponseType, BasicTokenResponse, BasicTokenType};
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    HttpClientError, RedirectUrl, RefreshToken, RequestTokenError, Scope, StandardErrorResponse,
    TokenResponse, TokenUrl,
};
use tracing::{debug, info, warn};

use crate::http::DEFAULT_TIMEOUT;
use crate::parent_link::{self, ParentLinkClient};
use crate::path_store::{self, PathStoreClient};

/// Keyring service name for storing refresh tokens
const KEYRING_SERVICE: &str = "drsync";

/// Fixed `state` parameter; the code is pasted back by hand, so there is
/// no redirect to correlate
const AUTH_STATE: &str = "drsync";

/// Redirect URI for Google's copy-paste (out-of-band) flow
pub const OOB_REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";

/// Default scope for Google Drive: the app-data folder only
const DRIVE_DEFAULT_SCOPES: &[&str] = &["https://www.googleapis.com/auth/drive.appdata"];

type OAuthClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

type TokenError = RequestTokenError<
    HttpClientError<reqwest::Error>,
    StandardErrorResponse<BasicErrorResponseType>,
>;

// ============================================================================
// Endpoints
// ============================================================================

/// Base URLs of one backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// OAuth2 authorization page
    pub authorize_url: String,
    /// OAuth2 token endpoint
    pub token_url: String,
    /// Metadata API base
    pub api_url: String,
    /// Byte-transfer base (Dropbox content host, Drive upload host)
    pub content_url: String,
}

impl Endpoints {
    /// Production endpoints of `backend`
    pub fn for_backend(backend: BackendKind) -> Self {
        match backend {
            BackendKind::Dropbox => Self {
                authorize_url: "https://www.dropbox.com/oauth2/authorize".to_string(),
                token_url: "https://api.dropboxapi.com/oauth2/token".to_string(),
                api_url: path_store::API_URL.to_string(),
                content_url: path_store::CONTENT_URL.to_string(),
            },
            BackendKind::Drive => Self {
                authorize_url: "https://accounts.google.com/o/oauth2/auth".to_string(),
                token_url: "https://oauth2.googleapis.com/token".to_string(),
                api_url: parent_link::API_URL.to_string(),
                content_url: parent_link::UPLOAD_URL.to_string(),
            },
        }
    }

    /// Every endpoint under one base URL, as a mock server exposes them
    ///
    /// OAuth lives at `/oauth2/authorize` and `/oauth2/token`; Drive uploads
    /// at `/upload`; Dropbox content calls share the base.
    pub fn local(backend: BackendKind, base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            authorize_url: format!("{base}/oauth2/authorize"),
            token_url: format!("{base}/oauth2/token"),
            api_url: base.to_string(),
            content_url: match backend {
                BackendKind::Dropbox => base.to_string(),
                BackendKind::Drive => format!("{base}/upload"),
            },
        }
    }
}

// ============================================================================
// OAuthSession
// ============================================================================

/// [`IAuthSession`] adapter for either backend
pub struct OAuthSession {
    backend: BackendKind,
    client: OAuthClient,
    scopes: Vec<String>,
    endpoints: Endpoints,
    http_client: reqwest::Client,
    timeout: Duration,
}

impl OAuthSession {
    /// Creates a session against the production endpoints
    pub fn new(
        backend: BackendKind,
        credential: &Credential,
        redirect_uri: Option<&str>,
    ) -> Result<Self, AuthError> {
        Self::with_endpoints(
            backend,
            credential,
            redirect_uri,
            Endpoints::for_backend(backend),
            DEFAULT_TIMEOUT,
        )
    }

    /// Creates a session with explicit endpoints and request timeout
    pub fn with_endpoints(
        backend: BackendKind,
        credential: &Credential,
        redirect_uri: Option<&str>,
        endpoints: Endpoints,
        timeout: Duration,
    ) -> Result<Self, AuthError> {
        if credential.client_id.trim().is_empty() {
            return Err(AuthError::Configuration(format!(
                "no client id configured for {}",
                backend
            )));
        }

        let mut client = BasicClient::new(ClientId::new(credential.client_id.clone()))
            .set_auth_uri(
                AuthUrl::new(endpoints.authorize_url.clone())
                    .map_err(|e| AuthError::Configuration(format!("invalid authorize URL: {e}")))?,
            )
            .set_token_uri(
                TokenUrl::new(endpoints.token_url.clone())
                    .map_err(|e| AuthError::Configuration(format!("invalid token URL: {e}")))?,
            );

        if let Some(secret) = &credential.client_secret {
            client = client.set_client_secret(ClientSecret::new(secret.clone()));
        }

        let redirect = match (redirect_uri, backend) {
            (Some(uri), _) => Some(uri),
            (None, BackendKind::Drive) => Some(OOB_REDIRECT_URI),
            (None, BackendKind::Dropbox) => None,
        };
        if let Some(uri) = redirect {
            client = client.set_redirect_uri(
                RedirectUrl::new(uri.to_string())
                    .map_err(|e| AuthError::Configuration(format!("invalid redirect URI: {e}")))?,
            );
        }

        let scopes = if credential.scopes.is_empty() && backend == BackendKind::Drive {
            DRIVE_DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect()
        } else {
            credential.scopes.clone()
        };

        // token endpoint redirects are never followed
        let http_client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            backend,
            client,
            scopes,
            endpoints,
            http_client,
            timeout,
        })
    }

    /// Endpoints this session talks to
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    fn tokens_from(&self, response: &BasicTokenResponse, previous_refresh: Option<&str>) -> Tokens {
        let expires_at = response
            .expires_in()
            .and_then(|d| chrono::Duration::from_std(d).ok())
            .map(|d| Utc::now() + d);

        Tokens {
            access_token: response.access_token().secret().to_string(),
            token_type: token_type_name(response.token_type()),
            refresh_token: response
                .refresh_token()
                .map(|t| t.secret().to_string())
                .or_else(|| previous_refresh.map(str::to_string)),
            expires_at,
        }
    }
}

fn token_type_name(token_type: &BasicTokenType) -> String {
    match token_type {
        BasicTokenType::Bearer => "bearer".to_string(),
        BasicTokenType::Mac => "mac".to_string(),
        BasicTokenType::Extension(other) => other.clone(),
    }
}

/// Maps an `oauth2` request failure to an [`AuthError`]
fn map_token_error(err: TokenError) -> AuthError {
    match err {
        RequestTokenError::ServerResponse(response) => match response.error() {
            BasicErrorResponseType::InvalidGrant => AuthError::InvalidGrant(response.to_string()),
            _ => AuthError::Rejected(response.to_string()),
        },
        RequestTokenError::Request(e) => AuthError::Transport(e.to_string()),
        RequestTokenError::Parse(e, _body) => AuthError::Malformed(e.to_string()),
        RequestTokenError::Other(message) => AuthError::Malformed(message),
    }
}

#[async_trait::async_trait]
impl IAuthSession for OAuthSession {
    fn backend(&self) -> BackendKind {
        self.backend
    }

    fn authorize_url(&self) -> Result<String, AuthError> {
        let mut request = self
            .client
            .authorize_url(|| CsrfToken::new(AUTH_STATE.to_string()));

        for scope in &self.scopes {
            request = request.add_scope(Scope::new(scope.clone()));
        }

        request = match self.backend {
            BackendKind::Dropbox => request.add_extra_param("token_access_type", "offline"),
            BackendKind::Drive => request.add_extra_param("access_type", "offline"),
        };

        let (url, _state) = request.url();
        debug!(backend = %self.backend, "Generated authorization URL");
        Ok(url.to_string())
    }

    async fn exchange_code(&self, code: &str) -> Result<Tokens, AuthError> {
        info!(backend = %self.backend, "Exchanging authorization code for tokens");

        let response = self
            .client
            .exchange_code(AuthorizationCode::new(code.trim().to_string()))
            .request_async(&self.http_client)
            .await
            .map_err(map_token_error)?;

        info!(backend = %self.backend, "Obtained OAuth tokens");
        Ok(self.tokens_from(&response, None))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshOutcome, AuthError> {
        info!(backend = %self.backend, "Refreshing access token");

        let result = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(&self.http_client)
            .await
            .map_err(map_token_error);

        match result {
            Ok(response) => {
                info!(backend = %self.backend, "Refreshed access token");
                Ok(RefreshOutcome::Refreshed(
                    self.tokens_from(&response, Some(refresh_token)),
                ))
            }
            Err(AuthError::InvalidGrant(reason)) => {
                warn!(backend = %self.backend, reason = %reason, "Refresh token expired or revoked");
                Ok(RefreshOutcome::Expired)
            }
            Err(e) => Err(e),
        }
    }

    fn supports_refresh(&self) -> bool {
        true
    }

    fn connect(&self, tokens: &Tokens) -> Result<Box<dyn ICloudClient>, CloudError> {
        let token = tokens.access_token.clone();
        let client: Box<dyn ICloudClient> = match self.backend {
            BackendKind::Dropbox => Box::new(PathStoreClient::with_base_urls(
                token,
                self.endpoints.api_url.clone(),
                self.endpoints.content_url.clone(),
                self.timeout,
            )?),
            BackendKind::Drive => Box::new(ParentLinkClient::with_base_urls(
                token,
                self.endpoints.api_url.clone(),
                self.endpoints.content_url.clone(),
                self.timeout,
            )?),
        };
        Ok(client)
    }
}

// ============================================================================
// KeyringTokenStorage
// ============================================================================

/// Stores and retrieves refresh tokens from the system keyring
///
/// One entry per backend under the service name "drsync", keyed by the
/// backend name. Only the refresh token is stored; access tokens are
/// short-lived and held in memory.
pub struct KeyringTokenStorage;

impl KeyringTokenStorage {
    /// Stores the refresh token for `backend`
    pub fn store(backend: BackendKind, refresh_token: &str) -> Result<()> {
        let entry = keyring::Entry::new(KEYRING_SERVICE, backend.as_str())
            .context("Failed to create keyring entry")?;

        entry
            .set_password(refresh_token)
            .context("Failed to store refresh token in keyring")?;

        debug!(backend = %backend, "Stored refresh token in keyring");
        Ok(())
    }

    /// Loads the refresh token for `backend`, `None` if absent
    pub fn load(backend: BackendKind) -> Result<Option<String>> {
        let entry = keyring::Entry::new(KEYRING_SERVICE, backend.as_str())
            .context("Failed to create keyring entry")?;

        match entry.get_password() {
            Ok(token) => {
                debug!(backend = %backend, "Loaded refresh token from keyring");
                Ok(Some(token))
            }
            Err(keyring::Error::NoEntry) => {
                debug!(backend = %backend, "No refresh token in keyring");
                Ok(None)
            }
            Err(e) => Err(anyhow::Error::new(e).context("Failed to read from keyring")),
        }
    }

    /// Removes the refresh token for `backend`
    pub fn clear(backend: BackendKind) -> Result<()> {
        let entry = keyring::Entry::new(KEYRING_SERVICE, backend.as_str())
            .context("Failed to create keyring entry")?;

        match entry.delete_credential() {
            Ok(()) => {
                info!(backend = %backend, "Cleared refresh token from keyring");
                Ok(())
            }
            Err(keyring::Error::NoEntry) => {
                debug!(backend = %backend, "No refresh token to clear");
                Ok(())
            }
            Err(e) => Err(anyhow::Error::new(e).context("Failed to delete from keyring")),
        }
    }
}

/// Opens the authorization page in the user's default browser
pub fn open_authorize_page(url: &str) -> Result<()> {
    info!("Opening browser for authorization");
    webbrowser::open(url).context("Failed to open browser for authorization")?;
    Ok(())
}
