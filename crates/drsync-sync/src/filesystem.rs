//! Local tree scanner
//!
//! Collects the files below a local root in a deterministic order (entries
//! sorted by name within each directory, pre-order recursion) and maps
//! between local paths and remote paths.
//!
//! ## Path mapping
//!
//! A local root `/…/Packages` maps to the remote folder `/Packages`: the
//! remote path of a file is the root's basename followed by the file's path
//! relative to the root.
//!
//! ## Exclusions
//!
//! [`ExclusionFilter`] patterns are regular expressions tested against a
//! single path segment and anchored at its start, so `\.git` excludes
//! `.git` and `.github` but not `x.git`.

use std::fs;
use std::path::{Component, Path, PathBuf};

use drsync_core::config::exclusion_regex;
use drsync_core::domain::RemotePath;
use regex::Regex;
use tracing::{debug, warn};

use crate::SyncError;

// ============================================================================
// ExclusionFilter
// ============================================================================

/// Folder and file name patterns skipped while scanning
#[derive(Debug, Clone, Default)]
pub struct ExclusionFilter {
    folders: Vec<Regex>,
    files: Vec<Regex>,
}

impl ExclusionFilter {
    /// Compiles the patterns, anchoring each at the start of the segment
    pub fn new(folder_patterns: &[String], file_patterns: &[String]) -> Result<Self, SyncError> {
        Ok(Self {
            folders: compile_all(folder_patterns)?,
            files: compile_all(file_patterns)?,
        })
    }

    pub fn excludes_folder(&self, name: &str) -> bool {
        self.folders.iter().any(|re| re.is_match(name))
    }

    pub fn excludes_file(&self, name: &str) -> bool {
        self.files.iter().any(|re| re.is_match(name))
    }
}

fn compile_all(patterns: &[String]) -> Result<Vec<Regex>, SyncError> {
    patterns
        .iter()
        .map(|pattern| {
            exclusion_regex(pattern).map_err(|source| SyncError::Pattern {
                pattern: pattern.clone(),
                source,
            })
        })
        .collect()
}

// ============================================================================
// Scanning
// ============================================================================

/// Lists every file below `root` that survives `filter`
///
/// `keep_folder` is consulted for every folder name in addition to the
/// exclusion patterns. A missing root yields an empty list.
pub fn scan_tree(
    root: &Path,
    filter: &ExclusionFilter,
    keep_folder: &dyn Fn(&str) -> bool,
) -> Result<Vec<PathBuf>, SyncError> {
    if !root.is_dir() {
        warn!(root = %root.display(), "Local root does not exist, nothing to scan");
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    scan_dir(root, filter, keep_folder, &mut files)?;
    debug!(root = %root.display(), files = files.len(), "Scanned local tree");
    Ok(files)
}

fn scan_dir(
    dir: &Path,
    filter: &ExclusionFilter,
    keep_folder: &dyn Fn(&str) -> bool,
    out: &mut Vec<PathBuf>,
) -> Result<(), SyncError> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| SyncError::local_io(dir, e))? {
        let entry = entry.map_err(|e| SyncError::local_io(dir, e))?;
        match entry.file_name().into_string() {
            Ok(name) => entries.push((name, entry.path())),
            Err(raw) => warn!(dir = %dir.display(), name = ?raw, "Skipping non UTF-8 name"),
        }
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    for (name, path) in entries {
        // follows symlinks; dangling links are neither
        if path.is_dir() {
            if !filter.excludes_folder(&name) && keep_folder(&name) {
                scan_dir(&path, filter, keep_folder, out)?;
            }
        } else if path.is_file() && !filter.excludes_file(&name) {
            out.push(path);
        }
    }
    Ok(())
}

// ============================================================================
// Path mapping
// ============================================================================

/// Remote folder that mirrors a local root: `/<basename(root)>`
pub fn remote_root_for(local_root: &Path) -> Result<RemotePath, SyncError> {
    let name = local_root
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            SyncError::local_io(
                local_root,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "root has no usable name"),
            )
        })?;
    Ok(RemotePath::new(name)?)
}

/// Remote path of `file` below `local_root`
pub fn remote_path_for(local_root: &Path, file: &Path) -> Result<RemotePath, SyncError> {
    let relative = file.strip_prefix(local_root).map_err(|_| {
        SyncError::local_io(
            file,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "file is outside its root"),
        )
    })?;

    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => match part.to_str() {
                Some(s) => segments.push(s),
                None => {
                    return Err(SyncError::local_io(
                        file,
                        std::io::Error::new(std::io::ErrorKind::InvalidData, "non UTF-8 path"),
                    ))
                }
            },
            _ => {
                return Err(SyncError::local_io(
                    file,
                    std::io::Error::new(std::io::ErrorKind::InvalidInput, "unexpected path component"),
                ))
            }
        }
    }

    Ok(remote_root_for(local_root)?.join(&segments.join("/"))?)
}

/// Local destination of `remote` below `local_root`
///
/// Returns `None` when `remote` does not live under the root's remote folder.
/// The folder name is matched case-insensitively.
pub fn local_path_for(local_root: &Path, remote: &RemotePath) -> Option<PathBuf> {
    let remote_root = remote_root_for(local_root).ok()?;
    let relative = remote
        .strip_prefix(&remote_root)
        .or_else(|| remote.strip_prefix_ignore_case(&remote_root))?;

    let mut path = local_root.to_path_buf();
    for segment in relative.split('/') {
        path.push(segment);
    }
    Some(path)
}

/// File name used in progress and error messages
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
