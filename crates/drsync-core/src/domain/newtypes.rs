//! Newtypes for remote paths, identifiers and backend selection
//!
//! Remote paths are kept in one canonical form (see [`format_path`]) so that
//! paths built from local directory names, listing results and user input
//! compare equal whenever they name the same remote object.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

// ============================================================================
// Path normalization
// ============================================================================

/// Normalizes a remote path.
///
/// - empty input yields an empty string
/// - runs of `/` collapse into one
/// - the root (`"/"`) yields an empty string
/// - any other path gets exactly one leading `/` and no trailing `/`
///
/// The function is idempotent: `format_path(&format_path(p)) == format_path(p)`.
#[must_use]
pub fn format_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return String::new();
    }

    let mut out = String::with_capacity(path.len() + 1);
    for segment in segments {
        out.push('/');
        out.push_str(segment);
    }
    out
}

// ============================================================================
// RemotePath
// ============================================================================

/// A normalized remote path, e.g. `/Installed Packages/Theme.sublime-package`.
///
/// The root of the managed area is the empty path. Segments `.` and `..`
/// are rejected so that a remote listing can never address a local file
/// outside the configured roots.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RemotePath(String);

impl RemotePath {
    /// Create a new RemotePath, normalizing the input
    ///
    /// # Errors
    /// Returns error if any segment is `.` or `..`
    pub fn new(path: impl AsRef<str>) -> Result<Self, DomainError> {
        let formatted = format_path(path.as_ref());

        if formatted.split('/').any(|s| s == "." || s == "..") {
            return Err(DomainError::InvalidRemotePath(format!(
                "Remote path contains invalid traversal: {}",
                path.as_ref()
            )));
        }

        Ok(Self(formatted))
    }

    /// The root of the managed area (empty path)
    #[must_use]
    pub fn root() -> Self {
        Self(String::new())
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path segments, root first
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// Join a relative path (one or more segments) onto this path
    ///
    /// # Errors
    /// Returns error if the result would contain a traversal segment
    pub fn join(&self, relative: &str) -> Result<Self, DomainError> {
        Self::new(format!("{}/{}", self.0, relative))
    }

    /// Parent path; `None` for the root
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }

        match self.0.rfind('/') {
            Some(idx) => Some(Self(self.0[..idx].to_string())),
            None => None,
        }
    }

    /// Last segment; `None` for the root
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        if self.is_root() {
            return None;
        }

        self.0.rsplit('/').next()
    }

    /// Returns the remainder of this path below `prefix`, without a leading `/`.
    ///
    /// `"/User/a/b".strip_prefix("/User") == Some("a/b")`. Returns `None`
    /// when `prefix` is not an ancestor of this path.
    #[must_use]
    pub fn strip_prefix(&self, prefix: &RemotePath) -> Option<&str> {
        if prefix.is_root() {
            return self.0.strip_prefix('/');
        }

        self.0
            .strip_prefix(prefix.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|rest| !rest.is_empty())
    }

    /// Like [`strip_prefix`](Self::strip_prefix), comparing the prefix
    /// segments case-insensitively.
    ///
    /// Path-addressed backends are case-insensitive and may report a folder
    /// in a different case than it was requested in.
    #[must_use]
    pub fn strip_prefix_ignore_case(&self, prefix: &RemotePath) -> Option<&str> {
        let mut offset = 0;
        let mut own = self.segments();
        for expected in prefix.segments() {
            let segment = own.next()?;
            if segment.to_lowercase() != expected.to_lowercase() {
                return None;
            }
            offset += 1 + segment.len();
        }

        self.0[offset..]
            .strip_prefix('/')
            .filter(|rest| !rest.is_empty())
    }
}

impl Display for RemotePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, "/")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl FromStr for RemotePath {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for RemotePath {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RemotePath> for String {
    fn from(path: RemotePath) -> Self {
        path.0
    }
}

// ============================================================================
// RemoteId
// ============================================================================

/// Backend-opaque identifier of a remote object.
///
/// For the path-addressed backend this is the object's path; for the
/// parent-link backend it is the object id. Identifiers from different
/// backends must never be compared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RemoteId(String);

impl RemoteId {
    /// Create a new RemoteId
    ///
    /// # Errors
    /// Returns error if the ID is empty
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(DomainError::InvalidRemoteId(
                "Remote ID cannot be empty".to_string(),
            ));
        }
        Ok(Self(id))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RemoteId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for RemoteId {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RemoteId> for String {
    fn from(id: RemoteId) -> Self {
        id.0
    }
}

// ============================================================================
// BackendKind
// ============================================================================

/// The storage model a cloud backend implements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Path-addressed store with native directory listing (Dropbox-style)
    Dropbox,
    /// Object store with parent-id links and duplicate names (Drive-style)
    Drive,
}

impl BackendKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Dropbox => "dropbox",
            BackendKind::Drive => "drive",
        }
    }

    /// Human-readable service name used in status messages
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            BackendKind::Dropbox => "Dropbox",
            BackendKind::Drive => "GoogleDrive",
        }
    }
}

impl Display for BackendKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dropbox" => Ok(BackendKind::Dropbox),
            "drive" | "gdrive" | "googledrive" => Ok(BackendKind::Drive),
            other => Err(DomainError::UnknownBackend(other.to_string())),
        }
    }
}
