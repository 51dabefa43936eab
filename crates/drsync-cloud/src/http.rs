//! Shared HTTP plumbing
//!
//! Both backend clients build their `reqwest::Client` here and funnel every
//! non-success response through [`classify_status`], so the two adapters
//! report failures with the same [`CloudError`] taxonomy.

use std::time::Duration;

use drsync_core::ports::CloudError;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use tracing::debug;

/// Default timeout applied to every request
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Longest server message carried into an error
const MAX_MESSAGE_LEN: usize = 200;

/// Builds the HTTP client used by the cloud adapters
pub fn build_client(timeout: Duration) -> Result<Client, CloudError> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("drsync/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| CloudError::Transport(format!("failed to build HTTP client: {e}")))
}

/// Maps a `reqwest` failure that happened before a status was available
pub fn map_transport(err: reqwest::Error) -> CloudError {
    if err.is_decode() {
        CloudError::Malformed(err.to_string())
    } else {
        CloudError::Transport(err.to_string())
    }
}

/// Maps a non-success status to a [`CloudError`]
///
/// - 401 → `AuthExpired`
/// - 404 → `NotFound(subject)`
/// - 5xx → `Transport`
/// - anything else → `Rejected` with the server's message
pub fn classify_status(status: StatusCode, subject: &str, body: &str) -> CloudError {
    match status {
        StatusCode::UNAUTHORIZED => CloudError::AuthExpired,
        StatusCode::NOT_FOUND => CloudError::NotFound(subject.to_string()),
        s if s.is_server_error() => {
            CloudError::Transport(format!("server error {} for {subject}", s.as_u16()))
        }
        s => CloudError::Rejected {
            status: s.as_u16(),
            message: extract_message(body),
        },
    }
}

/// Passes a successful response through, classifying anything else
pub async fn check_status(response: Response, subject: &str) -> Result<Response, CloudError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    debug!(status = status.as_u16(), subject, "Request failed");
    Err(classify_status(status, subject, &body))
}

/// Reads and decodes a JSON body, reporting decode failures as `Malformed`
pub async fn read_json<T: serde::de::DeserializeOwned>(
    response: Response,
    subject: &str,
) -> Result<T, CloudError> {
    let bytes = response.bytes().await.map_err(map_transport)?;
    serde_json::from_slice(&bytes)
        .map_err(|e| CloudError::Malformed(format!("unexpected response for {subject}: {e}")))
}

/// Error envelopes of the two APIs: Dropbox's `error_summary` and
/// Google's `error.message`
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error_summary: Option<String>,
    error: Option<serde_json::Value>,
}

fn extract_message(body: &str) -> String {
    let message = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(ErrorEnvelope {
            error_summary: Some(summary),
            ..
        }) => summary,
        Ok(ErrorEnvelope {
            error: Some(error), ..
        }) => error
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string()),
        _ => body.trim().to_string(),
    };

    if message.len() > MAX_MESSAGE_LEN {
        let mut end = MAX_MESSAGE_LEN;
        while !message.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &message[..end])
    } else {
        message
    }
}
