//! Dropbox API v2 client
//!
//! Objects are addressed by path relative to the account root. Metadata
//! calls go to the API host; byte transfers go to the content host with
//! their arguments in the `Dropbox-API-Arg` header.
//!
//! ## Error mapping
//!
//! Dropbox reports endpoint errors as HTTP 409 with an `error_summary` such
//! as `path/not_found/..`. Summaries containing `not_found` map to
//! [`CloudError::NotFound`], summaries containing `conflict` map to
//! [`CloudError::Conflict`]; every other status goes through
//! [`crate::http::classify_status`].

use std::time::Duration;

use drsync_core::domain::{BackendKind, RemoteId, RemotePath};
use drsync_core::ports::{AccountInfo, CloudError, ICloudClient, RemoteEntry};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::http::{self, build_client, check_status, map_transport, read_json};

/// Default Dropbox API host
pub const API_URL: &str = "https://api.dropboxapi.com";

/// Default Dropbox content host
pub const CONTENT_URL: &str = "https://content.dropboxapi.com";

const API_ARG_HEADER: &str = "Dropbox-API-Arg";
const API_RESULT_HEADER: &str = "Dropbox-API-Result";

// ============================================================================
// Dropbox wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct PathArg<'a> {
    path: &'a str,
}

#[derive(Debug, Serialize)]
struct ListFolderArg<'a> {
    path: &'a str,
    recursive: bool,
    include_deleted: bool,
}

#[derive(Debug, Serialize)]
struct ListFolderContinueArg<'a> {
    cursor: &'a str,
}

#[derive(Debug, Serialize)]
struct UploadArg<'a> {
    path: &'a str,
    mode: &'static str,
    autorename: bool,
    mute: bool,
}

/// File, folder or deleted-entry metadata
#[derive(Debug, Deserialize)]
struct Metadata {
    #[serde(rename = ".tag")]
    tag: String,
    #[allow(dead_code)]
    name: String,
    path_display: Option<String>,
    path_lower: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListFolderResult {
    entries: Vec<Metadata>,
    cursor: String,
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct FullAccount {
    name: AccountName,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AccountName {
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error_summary: String,
}

impl Metadata {
    fn is_deleted(&self) -> bool {
        self.tag == "deleted"
    }

    fn into_entry(self) -> Result<RemoteEntry, CloudError> {
        let display = self
            .path_display
            .or(self.path_lower)
            .ok_or_else(|| CloudError::Malformed("metadata without a path".to_string()))?;

        let relative_path =
            RemotePath::new(&display).map_err(|e| CloudError::Malformed(e.to_string()))?;
        let remote_id = RemoteId::new(relative_path.as_str())
            .map_err(|e| CloudError::Malformed(e.to_string()))?;

        Ok(RemoteEntry {
            relative_path,
            remote_id,
            is_folder: self.tag == "folder",
        })
    }
}

// ============================================================================
// PathStoreClient
// ============================================================================

/// [`ICloudClient`] over the Dropbox API v2
pub struct PathStoreClient {
    client: Client,
    api_url: String,
    content_url: String,
    access_token: String,
}

impl PathStoreClient {
    /// Creates a client against the production hosts
    pub fn new(access_token: impl Into<String>, timeout: Duration) -> Result<Self, CloudError> {
        Self::with_base_urls(access_token, API_URL, CONTENT_URL, timeout)
    }

    /// Creates a client with custom hosts (useful for testing)
    pub fn with_base_urls(
        access_token: impl Into<String>,
        api_url: impl Into<String>,
        content_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, CloudError> {
        Ok(Self {
            client: build_client(timeout)?,
            api_url: trim_base(api_url.into()),
            content_url: trim_base(content_url.into()),
            access_token: access_token.into(),
        })
    }

    fn rpc(&self, endpoint: &str) -> RequestBuilder {
        self.client
            .post(format!("{}/2/{}", self.api_url, endpoint))
            .bearer_auth(&self.access_token)
    }

    fn content(&self, endpoint: &str, arg: &impl Serialize) -> Result<RequestBuilder, CloudError> {
        let arg = api_arg_header(arg)?;
        Ok(self
            .client
            .post(format!("{}/2/{}", self.content_url, endpoint))
            .bearer_auth(&self.access_token)
            .header(API_ARG_HEADER, arg))
    }

    async fn send(&self, request: RequestBuilder, subject: &str) -> Result<Response, CloudError> {
        let response = request.send().await.map_err(map_transport)?;
        if response.status() == StatusCode::CONFLICT {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_endpoint_error(subject, &body));
        }
        check_status(response, subject).await
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>, CloudError> {
        let request = self.content("files/download", &PathArg { path })?;
        let response = self.send(request, path).await?;

        if !response.headers().contains_key(API_RESULT_HEADER) {
            return Err(CloudError::Malformed(format!(
                "download of {path} returned no {API_RESULT_HEADER} header"
            )));
        }

        let bytes = response.bytes().await.map_err(map_transport)?;
        debug!(path, bytes = bytes.len(), "Downloaded file");
        Ok(bytes.to_vec())
    }
}

#[async_trait::async_trait]
impl ICloudClient for PathStoreClient {
    fn backend(&self) -> BackendKind {
        BackendKind::Dropbox
    }

    async fn account_info(&self) -> Result<AccountInfo, CloudError> {
        debug!("Fetching current account");
        let response = self
            .send(self.rpc("users/get_current_account"), "account")
            .await?;
        let account: FullAccount = read_json(response, "account").await?;

        Ok(AccountInfo {
            display_name: account.name.display_name,
            email: account.email,
        })
    }

    async fn get_file(&self, path: &RemotePath) -> Result<Vec<u8>, CloudError> {
        self.download(path.as_str()).await
    }

    async fn get_content(&self, remote_id: &RemoteId) -> Result<Vec<u8>, CloudError> {
        self.download(remote_id.as_str()).await
    }

    async fn stat(&self, path: &RemotePath) -> Result<RemoteEntry, CloudError> {
        let subject = path.to_string();
        let request = self
            .rpc("files/get_metadata")
            .json(&PathArg { path: path.as_str() });
        let response = self.send(request, &subject).await?;
        let metadata: Metadata = read_json(response, &subject).await?;

        if metadata.is_deleted() {
            return Err(CloudError::NotFound(subject));
        }
        metadata.into_entry()
    }

    async fn put_file(
        &self,
        path: &RemotePath,
        data: &[u8],
        overwrite: bool,
    ) -> Result<RemoteEntry, CloudError> {
        let subject = path.to_string();
        let arg = UploadArg {
            path: path.as_str(),
            mode: if overwrite { "overwrite" } else { "add" },
            autorename: false,
            mute: true,
        };
        let request = self
            .content("files/upload", &arg)?
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(data.to_vec());

        let response = self.send(request, &subject).await?;
        let metadata: Metadata = read_json(response, &subject).await?;
        debug!(path = %path, bytes = data.len(), "Uploaded file");
        metadata.into_entry()
    }

    async fn remove_file(&self, path: &RemotePath) -> Result<(), CloudError> {
        let subject = path.to_string();
        let request = self
            .rpc("files/delete_v2")
            .json(&PathArg { path: path.as_str() });

        match self.send(request, &subject).await {
            Ok(_) => {
                debug!(path = %path, "Removed file");
                Ok(())
            }
            Err(CloudError::NotFound(_)) => {
                debug!(path = %path, "Nothing to remove");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn list_children(&self, path: &RemotePath) -> Result<Vec<RemoteEntry>, CloudError> {
        let subject = path.to_string();
        let request = self.rpc("files/list_folder").json(&ListFolderArg {
            path: path.as_str(),
            recursive: false,
            include_deleted: false,
        });
        let response = self.send(request, &subject).await?;
        let mut page: ListFolderResult = read_json(response, &subject).await?;

        let mut entries = Vec::new();
        let mut pages = 1usize;
        loop {
            for metadata in page.entries {
                if metadata.is_deleted() {
                    continue;
                }
                entries.push(metadata.into_entry()?);
            }

            if !page.has_more {
                break;
            }

            let request = self
                .rpc("files/list_folder/continue")
                .json(&ListFolderContinueArg {
                    cursor: &page.cursor,
                });
            let response = self.send(request, &subject).await?;
            page = read_json(response, &subject).await?;
            pages += 1;
        }

        debug!(path = %path, entries = entries.len(), pages, "Listed folder");
        Ok(entries)
    }

    async fn ensure_folder(&self, _path: &RemotePath) -> Result<Option<RemoteId>, CloudError> {
        // uploads create intermediate folders implicitly
        Ok(None)
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

/// Serializes a header argument, escaping non-ASCII characters as `\uXXXX`
/// since HTTP header values must be ASCII.
fn api_arg_header(arg: &impl Serialize) -> Result<String, CloudError> {
    let json = serde_json::to_string(arg)
        .map_err(|e| CloudError::Malformed(format!("failed to encode {API_ARG_HEADER}: {e}")))?;

    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        if c.is_ascii() {
            out.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                out.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    Ok(out)
}

/// Classifies a 409 endpoint error by its `error_summary`
fn classify_endpoint_error(subject: &str, body: &str) -> CloudError {
    let summary = match serde_json::from_str::<ErrorBody>(body) {
        Ok(e) => e.error_summary,
        Err(_) => {
            warn!(subject, "409 response without error_summary");
            return http::classify_status(StatusCode::CONFLICT, subject, body);
        }
    };

    if summary.contains("not_found") {
        CloudError::NotFound(subject.to_string())
    } else if summary.contains("conflict") {
        info!(subject, summary = %summary, "Write conflict");
        CloudError::Conflict(subject.to_string())
    } else {
        CloudError::Rejected {
            status: StatusCode::CONFLICT.as_u16(),
            message: summary,
        }
    }
}
