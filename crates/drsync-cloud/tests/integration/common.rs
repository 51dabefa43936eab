//! Shared test helpers for the cloud adapter integration tests
//!
//! Provides client constructors pointed at a wiremock server and
//! [`FakeDrive`], a stateful responder that behaves like the parts of the
//! Drive v2 API the parent-link client uses, including page-token paging.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use drsync_cloud::{ParentLinkClient, PathStoreClient};
use regex::Regex;
use wiremock::matchers::any;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub const FOLDER_MIME: &str = "application/vnd.google-apps.folder";

const TIMEOUT: Duration = Duration::from_secs(5);

/// PathStoreClient whose API and content hosts are both `server`
pub fn path_store_client(server: &MockServer) -> PathStoreClient {
    PathStoreClient::with_base_urls("test-access-token", server.uri(), server.uri(), TIMEOUT)
        .expect("build path store client")
}

/// ParentLinkClient with uploads under `<server>/upload`
pub fn parent_link_client(server: &MockServer) -> ParentLinkClient {
    ParentLinkClient::with_base_urls(
        "test-access-token",
        server.uri(),
        format!("{}/upload", server.uri()),
        TIMEOUT,
    )
    .expect("build parent link client")
}

// ============================================================================
// FakeDrive
// ============================================================================

#[derive(Debug, Clone)]
pub struct StoredFile {
    pub id: String,
    pub title: String,
    pub parent: String,
    pub is_folder: bool,
    pub content: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct DriveState {
    pub files: Vec<StoredFile>,
    pub next_id: u64,
    pub folders_created: usize,
    pub uploads: usize,
    pub deletes: usize,
    /// Items per listing page; everything in one page when unset
    pub page_size: Option<usize>,
    /// `pageToken` values received, in order
    pub page_tokens: Vec<String>,
}

impl DriveState {
    fn fresh_id(&mut self) -> String {
        self.next_id += 1;
        format!("obj{}", self.next_id)
    }
}

/// Stateful Drive-like responder
#[derive(Clone, Default)]
pub struct FakeDrive {
    pub state: Arc<Mutex<DriveState>>,
}

impl FakeDrive {
    /// Starts a mock server backed by a fresh fake
    pub async fn start() -> (MockServer, FakeDrive) {
        let server = MockServer::start().await;
        let fake = FakeDrive::default();
        Mock::given(any())
            .respond_with(fake.clone())
            .mount(&server)
            .await;
        (server, fake)
    }

    /// Adds an object directly, bypassing the API
    pub fn seed(&self, title: &str, parent: &str, is_folder: bool, content: &[u8]) -> String {
        let mut state = self.state.lock().unwrap();
        let id = state.fresh_id();
        state.files.push(StoredFile {
            id: id.clone(),
            title: title.to_string(),
            parent: parent.to_string(),
            is_folder,
            content: content.to_vec(),
        });
        id
    }

    /// Objects titled `title` under `parent`
    pub fn named(&self, parent: &str, title: &str) -> Vec<StoredFile> {
        let state = self.state.lock().unwrap();
        state
            .files
            .iter()
            .filter(|f| f.parent == parent && f.title == title)
            .cloned()
            .collect()
    }

    /// Splits listings into pages of `size` items
    pub fn paginate(&self, size: usize) {
        self.state.lock().unwrap().page_size = Some(size);
    }

    pub fn page_tokens(&self) -> Vec<String> {
        self.state.lock().unwrap().page_tokens.clone()
    }

    pub fn folders_created(&self) -> usize {
        self.state.lock().unwrap().folders_created
    }

    fn file_json(file: &StoredFile) -> serde_json::Value {
        serde_json::json!({
            "id": file.id,
            "title": file.title,
            "mimeType": if file.is_folder { FOLDER_MIME } else { "application/octet-stream" },
            "parents": [{"id": file.parent}],
        })
    }

    fn list(&self, request: &Request) -> ResponseTemplate {
        let query = request
            .url
            .query_pairs()
            .find(|(k, _)| k == "q")
            .map(|(_, v)| v.into_owned())
            .unwrap_or_default();
        let parent_re = Regex::new(r"'([^']+)' in parents").unwrap();
        let Some(parent) = parent_re.captures(&query).map(|c| c[1].to_string()) else {
            return ResponseTemplate::new(400);
        };

        let token = request
            .url
            .query_pairs()
            .find(|(k, _)| k == "pageToken")
            .map(|(_, v)| v.into_owned());

        let mut state = self.state.lock().unwrap();
        let offset: usize = match &token {
            Some(token) => match token.strip_prefix("offset-").and_then(|n| n.parse().ok()) {
                Some(offset) => offset,
                None => return ResponseTemplate::new(400),
            },
            None => 0,
        };
        if let Some(token) = token {
            state.page_tokens.push(token);
        }

        let children: Vec<&StoredFile> = state.files.iter().filter(|f| f.parent == parent).collect();
        let size = state.page_size.unwrap_or(usize::MAX);
        let end = offset.saturating_add(size).min(children.len());
        let items: Vec<serde_json::Value> = children[offset.min(end)..end]
            .iter()
            .map(|f| Self::file_json(f))
            .collect();

        let mut body = serde_json::json!({ "items": items });
        if end < children.len() {
            body["nextPageToken"] = serde_json::json!(format!("offset-{end}"));
        }
        ResponseTemplate::new(200).set_body_json(body)
    }

    fn create_folder(&self, request: &Request) -> ResponseTemplate {
        let body: serde_json::Value = match serde_json::from_slice(&request.body) {
            Ok(v) => v,
            Err(_) => return ResponseTemplate::new(400),
        };
        let title = body["title"].as_str().unwrap_or_default().to_string();
        let parent = body["parents"][0]["id"].as_str().unwrap_or_default().to_string();
        let is_folder = body["mimeType"] == FOLDER_MIME;

        let mut state = self.state.lock().unwrap();
        let id = state.fresh_id();
        let file = StoredFile {
            id,
            title,
            parent,
            is_folder,
            content: Vec::new(),
        };
        if is_folder {
            state.folders_created += 1;
        }
        let json = Self::file_json(&file);
        state.files.push(file);
        ResponseTemplate::new(200).set_body_json(json)
    }

    fn upload(&self, request: &Request) -> ResponseTemplate {
        let content_type = request
            .headers
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let Some(boundary) = content_type.split("boundary=").nth(1) else {
            return ResponseTemplate::new(400);
        };
        let Some((metadata, content)) = split_multipart(&request.body, boundary) else {
            return ResponseTemplate::new(400);
        };
        let metadata: serde_json::Value = match serde_json::from_slice(&metadata) {
            Ok(v) => v,
            Err(_) => return ResponseTemplate::new(400),
        };

        let mut state = self.state.lock().unwrap();
        let id = state.fresh_id();
        let file = StoredFile {
            id,
            title: metadata["title"].as_str().unwrap_or_default().to_string(),
            parent: metadata["parents"][0]["id"]
                .as_str()
                .unwrap_or_default()
                .to_string(),
            is_folder: false,
            content,
        };
        state.uploads += 1;
        let json = Self::file_json(&file);
        state.files.push(file);
        ResponseTemplate::new(200).set_body_json(json)
    }
}

impl Respond for FakeDrive {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let path = request.url.path().to_string();
        let method = request.method.as_str().to_string();

        match (method.as_str(), path.as_str()) {
            ("GET", "/about") => ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "Drive Tester",
                "user": {"displayName": "Drive Tester", "emailAddress": "tester@example.com"}
            })),
            ("GET", "/files") => self.list(request),
            ("POST", "/files") => self.create_folder(request),
            ("POST", "/upload/files") => self.upload(request),
            ("GET", p) if p.starts_with("/files/") => {
                let id = &p["/files/".len()..];
                let state = self.state.lock().unwrap();
                match state.files.iter().find(|f| f.id == id) {
                    Some(file) => ResponseTemplate::new(200).set_body_bytes(file.content.clone()),
                    None => ResponseTemplate::new(404),
                }
            }
            ("DELETE", p) if p.starts_with("/files/") => {
                let id = p["/files/".len()..].to_string();
                let mut state = self.state.lock().unwrap();
                let before = state.files.len();
                state.files.retain(|f| f.id != id);
                if state.files.len() == before {
                    ResponseTemplate::new(404)
                } else {
                    state.deletes += 1;
                    ResponseTemplate::new(204)
                }
            }
            _ => ResponseTemplate::new(404),
        }
    }
}

/// Splits a two-part `multipart/related` body into (metadata, content)
fn split_multipart(body: &[u8], boundary: &str) -> Option<(Vec<u8>, Vec<u8>)> {
    let delimiter = format!("--{boundary}");
    let parts = split_bytes(body, delimiter.as_bytes());
    // ["", part1, part2, "--\r\n"]
    if parts.len() < 3 {
        return None;
    }
    Some((part_body(parts[1])?, part_body(parts[2])?))
}

fn split_bytes<'a>(haystack: &'a [u8], needle: &[u8]) -> Vec<&'a [u8]> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i + needle.len() <= haystack.len() {
        if &haystack[i..i + needle.len()] == needle {
            parts.push(&haystack[start..i]);
            i += needle.len();
            start = i;
        } else {
            i += 1;
        }
    }
    parts.push(&haystack[start..]);
    parts
}

/// Body of one part: after the blank line, without the trailing CRLF
fn part_body(part: &[u8]) -> Option<Vec<u8>> {
    let sep = b"\r\n\r\n";
    let pos = part.windows(sep.len()).position(|w| w == sep)?;
    let body = &part[pos + sep.len()..];
    let body = body.strip_suffix(b"\r\n").unwrap_or(body);
    Some(body.to_vec())
}
