//! Google Drive API v2 client
//!
//! Drive has no paths: every object has an id, a title and a list of parent
//! ids, and siblings may share a title. This client maps [`RemotePath`]s
//! onto that model by walking titles from the `appdata` folder, one
//! listing per segment.
//!
//! ## Design Notes
//!
//! - Folder ids are looked up on every call; nothing is cached between calls.
//! - `ensure_folder` looks before it creates, so sequential runs never
//!   duplicate a folder. Two runs racing on the same account can still both
//!   create one (there is no server-side uniqueness).
//! - `put_file` deletes every same-titled file under the parent before
//!   uploading, which also heals duplicates left by earlier runs.

use std::time::Duration;

use drsync_core::domain::{BackendKind, RemoteId, RemotePath};
use drsync_core::ports::{AccountInfo, CloudError, ICloudClient, RemoteEntry};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::http::{build_client, check_status, map_transport, read_json};

/// Default Drive API base URL
pub const API_URL: &str = "https://www.googleapis.com/drive/v2";

/// Default Drive upload base URL
pub const UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v2";

/// Alias of the application-data folder, the root of the managed area
pub const APPDATA_FOLDER: &str = "appdata";

/// MIME type Drive uses for folder objects
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

const BINARY_MIME_TYPE: &str = "application/octet-stream";

const MULTIPART_BOUNDARY: &str = "drsync-multipart-boundary-5f0c2d7e";

const PAGE_SIZE: &str = "1000";

// ============================================================================
// Drive wire types
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    title: String,
    mime_type: String,
}

impl DriveFile {
    fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    items: Vec<DriveFile>,
    next_page_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct ParentRef<'a> {
    id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewFile<'a> {
    title: &'a str,
    parents: [ParentRef<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    mime_type: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct About {
    name: Option<String>,
    user: Option<AboutUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AboutUser {
    display_name: Option<String>,
    email_address: Option<String>,
}

/// Which kinds of object a title lookup accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    File,
    Folder,
    Any,
}

impl Kind {
    fn accepts(self, file: &DriveFile) -> bool {
        match self {
            Kind::File => !file.is_folder(),
            Kind::Folder => file.is_folder(),
            Kind::Any => true,
        }
    }
}

// ============================================================================
// ParentLinkClient
// ============================================================================

/// [`ICloudClient`] over the Google Drive API v2, rooted at `appdata`
pub struct ParentLinkClient {
    client: Client,
    api_url: String,
    upload_url: String,
    access_token: String,
    root_id: String,
}

impl ParentLinkClient {
    /// Creates a client against the production hosts
    pub fn new(access_token: impl Into<String>, timeout: Duration) -> Result<Self, CloudError> {
        Self::with_base_urls(access_token, API_URL, UPLOAD_URL, timeout)
    }

    /// Creates a client with custom hosts (useful for testing)
    pub fn with_base_urls(
        access_token: impl Into<String>,
        api_url: impl Into<String>,
        upload_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, CloudError> {
        Ok(Self {
            client: build_client(timeout)?,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            upload_url: upload_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
            root_id: APPDATA_FOLDER.to_string(),
        })
    }

    fn api(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.api_url, path))
            .bearer_auth(&self.access_token)
    }

    /// Every child of `parent_id`, following page tokens
    async fn children_of(&self, parent_id: &str) -> Result<Vec<DriveFile>, CloudError> {
        let query = format!("'{}' in parents and trashed = false", parent_id);
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .api(reqwest::Method::GET, "/files")
                .query(&[("q", query.as_str()), ("maxResults", PAGE_SIZE)]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = request.send().await.map_err(map_transport)?;
            let response = check_status(response, parent_id).await?;
            let page: FileList = read_json(response, parent_id).await?;
            items.extend(page.items);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(items)
    }

    async fn find_child(
        &self,
        parent_id: &str,
        title: &str,
        kind: Kind,
    ) -> Result<Option<DriveFile>, CloudError> {
        let children = self.children_of(parent_id).await?;
        Ok(children
            .into_iter()
            .find(|f| f.title == title && kind.accepts(f)))
    }

    async fn create_folder(&self, parent_id: &str, title: &str) -> Result<DriveFile, CloudError> {
        let body = NewFile {
            title,
            parents: [ParentRef { id: parent_id }],
            mime_type: Some(FOLDER_MIME_TYPE),
        };
        let response = self
            .api(reqwest::Method::POST, "/files")
            .json(&body)
            .send()
            .await
            .map_err(map_transport)?;
        let response = check_status(response, title).await?;
        let folder: DriveFile = read_json(response, title).await?;

        info!(title, id = %folder.id, "Created remote folder");
        Ok(folder)
    }

    /// Resolves the folder id for `path`, optionally creating missing folders
    async fn resolve_folder(
        &self,
        path: &RemotePath,
        create: bool,
    ) -> Result<Option<String>, CloudError> {
        let mut current = self.root_id.clone();

        for segment in path.segments() {
            current = match self.find_child(&current, segment, Kind::Folder).await? {
                Some(folder) => folder.id,
                None if create => self.create_folder(&current, segment).await?.id,
                None => return Ok(None),
            };
        }

        Ok(Some(current))
    }

    /// Parent folder id and title of `path`
    async fn locate(
        &self,
        path: &RemotePath,
        create_parent: bool,
    ) -> Result<Option<(String, String)>, CloudError> {
        let (Some(parent), Some(title)) = (path.parent(), path.file_name()) else {
            return Ok(None);
        };

        Ok(self
            .resolve_folder(&parent, create_parent)
            .await?
            .map(|id| (id, title.to_string())))
    }

    async fn delete_by_id(&self, id: &str) -> Result<(), CloudError> {
        let response = self
            .api(reqwest::Method::DELETE, &format!("/files/{}", id))
            .send()
            .await
            .map_err(map_transport)?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(id, "File already gone");
            return Ok(());
        }
        check_status(response, id).await?;
        Ok(())
    }

    fn to_entry(base: &RemotePath, file: DriveFile) -> Result<RemoteEntry, CloudError> {
        let relative_path = base
            .join(&file.title)
            .map_err(|e| CloudError::Malformed(e.to_string()))?;
        let remote_id = RemoteId::new(file.id).map_err(|e| CloudError::Malformed(e.to_string()))?;
        Ok(RemoteEntry {
            relative_path,
            remote_id,
            is_folder: file.mime_type == FOLDER_MIME_TYPE,
        })
    }
}

#[async_trait::async_trait]
impl ICloudClient for ParentLinkClient {
    fn backend(&self) -> BackendKind {
        BackendKind::Drive
    }

    async fn account_info(&self) -> Result<AccountInfo, CloudError> {
        debug!("Fetching about");
        let response = self
            .api(reqwest::Method::GET, "/about")
            .send()
            .await
            .map_err(map_transport)?;
        let response = check_status(response, "about").await?;
        let about: About = read_json(response, "about").await?;

        let (user_name, email) = match about.user {
            Some(user) => (user.display_name, user.email_address),
            None => (None, None),
        };
        let display_name = user_name
            .or(about.name)
            .ok_or_else(|| CloudError::Malformed("about response without a name".to_string()))?;

        Ok(AccountInfo {
            display_name,
            email,
        })
    }

    async fn get_file(&self, path: &RemotePath) -> Result<Vec<u8>, CloudError> {
        let Some((parent_id, title)) = self.locate(path, false).await? else {
            return Err(CloudError::NotFound(path.to_string()));
        };

        match self.find_child(&parent_id, &title, Kind::File).await? {
            Some(file) => {
                let id = RemoteId::new(file.id).map_err(|e| CloudError::Malformed(e.to_string()))?;
                self.get_content(&id).await
            }
            None => Err(CloudError::NotFound(path.to_string())),
        }
    }

    async fn get_content(&self, remote_id: &RemoteId) -> Result<Vec<u8>, CloudError> {
        let response = self
            .api(reqwest::Method::GET, &format!("/files/{}", remote_id))
            .query(&[("alt", "media")])
            .send()
            .await
            .map_err(map_transport)?;
        let response = check_status(response, remote_id.as_str()).await?;
        let bytes = response.bytes().await.map_err(map_transport)?;

        debug!(id = %remote_id, bytes = bytes.len(), "Downloaded file");
        Ok(bytes.to_vec())
    }

    async fn stat(&self, path: &RemotePath) -> Result<RemoteEntry, CloudError> {
        if path.is_root() {
            return Ok(RemoteEntry {
                relative_path: RemotePath::root(),
                remote_id: RemoteId::new(self.root_id.clone())
                    .map_err(|e| CloudError::Malformed(e.to_string()))?,
                is_folder: true,
            });
        }

        let Some((parent_id, title)) = self.locate(path, false).await? else {
            return Err(CloudError::NotFound(path.to_string()));
        };

        match self.find_child(&parent_id, &title, Kind::Any).await? {
            Some(file) => Self::to_entry(&path.parent().unwrap_or_else(RemotePath::root), file),
            None => Err(CloudError::NotFound(path.to_string())),
        }
    }

    async fn put_file(
        &self,
        path: &RemotePath,
        data: &[u8],
        _overwrite: bool,
    ) -> Result<RemoteEntry, CloudError> {
        self.remove_file(path).await?;

        let Some((parent_id, title)) = self.locate(path, true).await? else {
            return Err(CloudError::Rejected {
                status: 400,
                message: "cannot upload to the root folder itself".to_string(),
            });
        };

        let metadata = serde_json::to_vec(&NewFile {
            title: &title,
            parents: [ParentRef { id: &parent_id }],
            mime_type: None,
        })
        .map_err(|e| CloudError::Malformed(e.to_string()))?;

        let body = multipart_related_body(&metadata, data);
        let response = self
            .client
            .post(format!("{}/files", self.upload_url))
            .bearer_auth(&self.access_token)
            .query(&[("uploadType", "multipart")])
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={MULTIPART_BOUNDARY}"),
            )
            .body(body)
            .send()
            .await
            .map_err(map_transport)?;
        let subject = path.to_string();
        let response = check_status(response, &subject).await?;
        let file: DriveFile = read_json(response, &subject).await?;

        debug!(path = %path, id = %file.id, bytes = data.len(), "Uploaded file");
        Self::to_entry(&path.parent().unwrap_or_else(RemotePath::root), file)
    }

    async fn remove_file(&self, path: &RemotePath) -> Result<(), CloudError> {
        let Some((parent_id, title)) = self.locate(path, false).await? else {
            return Ok(());
        };

        let matches: Vec<DriveFile> = self
            .children_of(&parent_id)
            .await?
            .into_iter()
            .filter(|f| f.title == title && !f.is_folder())
            .collect();

        if matches.len() > 1 {
            warn!(path = %path, copies = matches.len(), "Removing duplicate remote files");
        }
        for file in &matches {
            self.delete_by_id(&file.id).await?;
        }

        debug!(path = %path, removed = matches.len(), "Removed file");
        Ok(())
    }

    async fn list_children(&self, path: &RemotePath) -> Result<Vec<RemoteEntry>, CloudError> {
        let Some(folder_id) = self.resolve_folder(path, false).await? else {
            return Err(CloudError::NotFound(path.to_string()));
        };

        let children = self.children_of(&folder_id).await?;
        let mut entries = Vec::with_capacity(children.len());
        for file in children {
            match Self::to_entry(path, file.clone()) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(title = %file.title, error = %e, "Skipping unaddressable remote object"),
            }
        }

        debug!(path = %path, entries = entries.len(), "Listed folder");
        Ok(entries)
    }

    async fn ensure_folder(&self, path: &RemotePath) -> Result<Option<RemoteId>, CloudError> {
        match self.resolve_folder(path, true).await? {
            Some(id) => Ok(Some(
                RemoteId::new(id).map_err(|e| CloudError::Malformed(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }
}

/// Builds a `multipart/related` body: JSON metadata, then the file bytes
fn multipart_related_body(metadata: &[u8], data: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(metadata.len() + data.len() + 256);
    body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata);
    body.extend_from_slice(format!("\r\n--{MULTIPART_BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(format!("Content-Type: {BINARY_MIME_TYPE}\r\n\r\n").as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{MULTIPART_BOUNDARY}--\r\n").as_bytes());
    body
}
