use super::{check_path, delete_error, upload_error, BlobStore};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

/// Blob store kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs.
    pub async fn len(&self) -> usize {
        self.blobs.lock().await.len()
    }

    /// Returns `true` if no blobs are stored.
    pub async fn is_empty(&self) -> bool {
        self.blobs.lock().await.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(&self, path: &str, bytes: &[u8], _mime_type: &str) -> Result<String> {
        check_path(path).map_err(|reason| upload_error(path, reason))?;
        self.blobs
            .lock()
            .await
            .insert(path.to_string(), bytes.to_vec());
        Ok(format!("memory://{path}"))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        check_path(path).map_err(|reason| delete_error(path, reason))?;
        self.blobs.lock().await.remove(path);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize> {
        let mut blobs = self.blobs.lock().await;
        let before = blobs.len();
        blobs.retain(|path, _| !path.starts_with(prefix));
        Ok(before - blobs.len())
    }

    async fn read(&self, path: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.blobs.lock().await.get(path).cloned())
    }
}
