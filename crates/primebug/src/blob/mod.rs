//! Blob storage for attachments.
//!
//! Blobs are addressed by slash-separated paths namespaced per project:
//! `projects/{project}/{bugs|comments}/{owner}/{unique}-{file}`. Uploading
//! returns the URL the attachment record stores; deleting takes the path.

mod fs;
mod memory;

pub use fs::FsBlobStore;
pub use memory::MemoryBlobStore;

use crate::domain::ProjectId;
use crate::error::{Result, StorageError};
use async_trait::async_trait;
use std::fmt;

/// Object storage for attachment bytes.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` at `path`, replacing any existing blob, and return
    /// its public URL.
    async fn upload(&self, path: &str, bytes: &[u8], mime_type: &str) -> Result<String>;

    /// Delete the blob at `path`. Deleting a missing blob is not an error.
    async fn delete(&self, path: &str) -> Result<()>;

    /// Delete every blob under `prefix`, returning how many were removed.
    async fn delete_prefix(&self, prefix: &str) -> Result<usize>;

    /// Read a blob back.
    async fn read(&self, path: &str) -> Result<Option<Vec<u8>>>;
}

/// Which kind of record an attachment hangs off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobKind {
    /// Attached to a bug.
    Bug,
    /// Attached to a comment.
    Comment,
}

impl fmt::Display for BlobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlobKind::Bug => write!(f, "bugs"),
            BlobKind::Comment => write!(f, "comments"),
        }
    }
}

/// Namespace holding every blob of a project.
#[must_use]
pub fn project_prefix(project: &ProjectId) -> String {
    format!("projects/{project}/")
}

/// Path for a new attachment blob.
#[must_use]
pub fn attachment_path(
    project: &ProjectId,
    kind: BlobKind,
    owner: &str,
    unique: &str,
    file_name: &str,
) -> String {
    format!(
        "{}{kind}/{}/{unique}-{}",
        project_prefix(project),
        sanitize_segment(owner),
        sanitize_segment(file_name)
    )
}

/// Replace characters that would change the path structure.
fn sanitize_segment(segment: &str) -> String {
    let cleaned: String = segment
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}

/// Reject paths that are absolute, empty, or climb out of the namespace.
pub(crate) fn check_path(path: &str) -> std::result::Result<(), String> {
    if path.is_empty() {
        return Err("empty path".to_string());
    }
    if path.starts_with('/') || path.contains('\\') {
        return Err("path must be relative and slash-separated".to_string());
    }
    if path.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..") {
        return Err("path contains an empty or relative segment".to_string());
    }
    Ok(())
}

pub(crate) fn upload_error(path: &str, reason: impl fmt::Display) -> crate::error::Error {
    StorageError::Upload {
        path: path.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

pub(crate) fn delete_error(path: &str, reason: impl fmt::Display) -> crate::error::Error {
    StorageError::Delete {
        path: path.to_string(),
        reason: reason.to_string(),
    }
    .into()
}
