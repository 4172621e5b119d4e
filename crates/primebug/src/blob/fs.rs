use super::{check_path, delete_error, upload_error, BlobStore};
use crate::error::Result;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Blob store backed by a directory; URLs use the `file://` scheme.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Store blobs under `root`, which is created on first upload.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The directory blobs live in.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        path.split('/').fold(self.root.clone(), |acc, seg| acc.join(seg))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn upload(&self, path: &str, bytes: &[u8], _mime_type: &str) -> Result<String> {
        check_path(path).map_err(|reason| upload_error(path, reason))?;
        let target = self.resolve(path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| upload_error(path, e))?;
        }

        // Write to a sibling temp file first so readers never see a partial blob.
        let mut temp = target.clone().into_os_string();
        temp.push(".partial");
        let temp = PathBuf::from(temp);
        fs::write(&temp, bytes)
            .await
            .map_err(|e| upload_error(path, e))?;
        fs::rename(&temp, &target)
            .await
            .map_err(|e| upload_error(path, e))?;

        let absolute = fs::canonicalize(&target)
            .await
            .map_err(|e| upload_error(path, e))?;
        Ok(format!("file://{}", absolute.display()))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        check_path(path).map_err(|reason| delete_error(path, reason))?;
        match fs::remove_file(self.resolve(path)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(delete_error(path, e)),
        }
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize> {
        let trimmed = prefix.trim_end_matches('/');
        check_path(trimmed).map_err(|reason| delete_error(prefix, reason))?;
        let dir = self.resolve(trimmed);
        let removed = count_files(&dir).await.map_err(|e| delete_error(prefix, e))?;
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(removed),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(0),
            Err(e) => Err(delete_error(prefix, e)),
        }
    }

    async fn read(&self, path: &str) -> Result<Option<Vec<u8>>> {
        check_path(path).map_err(|reason| upload_error(path, reason))?;
        match fs::read(self.resolve(path)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Count regular files below `dir`; a missing directory counts as zero.
async fn count_files(dir: &Path) -> std::io::Result<usize> {
    let mut pending = vec![dir.to_path_buf()];
    let mut count = 0;
    while let Some(current) = pending.pop() {
        let mut entries = match fs::read_dir(&current).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => return Err(e),
        };
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                pending.push(entry.path());
            } else {
                count += 1;
            }
        }
    }
    Ok(count)
}
