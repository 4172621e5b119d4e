//! Storage abstraction for documents.
//!
//! [`DocumentStore`] is the contract every backend implements. It is
//! object-safe, so callers hold an `Arc<dyn DocumentStore>` created by
//! [`open_store`] and share it between services.
//!
//! # Backends
//!
//! - **In-memory**: ephemeral, everything is lost when the process exits
//! - **JSONL**: the in-memory engine plus a snapshot file written by
//!   [`DocumentStore::save`] and re-read by [`DocumentStore::reload`]

use crate::batch::WriteBatch;
use crate::document::{DocKey, VersionedDocument};
use crate::error::Result;
use crate::memory::MemoryStore;
use crate::query::Query;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Core document store trait.
///
/// # Method Categories
///
/// - **Reads**: `get`, `query`, `export_all`
/// - **Writes**: `commit`
/// - **Persistence**: `save`, `reload`
///
/// # Consistency
///
/// `commit` is atomic: every precondition is checked and every operation
/// validated before any document changes. A failed commit leaves the store
/// exactly as it was.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch one document.
    ///
    /// Returns `None` if the document doesn't exist.
    async fn get(&self, key: &DocKey) -> Result<Option<VersionedDocument>>;

    /// Run a query, returning matching documents in key order unless the
    /// query specifies an ordering.
    ///
    /// # Errors
    ///
    /// Returns `Error::InFilterTooLarge` if the query exceeds engine limits.
    async fn query(&self, query: &Query) -> Result<Vec<VersionedDocument>>;

    /// Atomically apply a batch.
    ///
    /// # Errors
    ///
    /// - `Error::BatchTooLarge` if the batch exceeds the write limit
    /// - `Error::Conflict` if a precondition does not hold
    /// - `Error::MissingDocument` if an update targets an absent document
    async fn commit(&self, batch: WriteBatch) -> Result<()>;

    /// Every stored document, in key order.
    async fn export_all(&self) -> Result<Vec<VersionedDocument>>;

    /// Persist the current state. A no-op for ephemeral backends.
    async fn save(&self) -> Result<()>;

    /// Discard unsaved state and re-read the persisted snapshot.
    /// A no-op for ephemeral backends.
    async fn reload(&self) -> Result<()>;
}

/// Storage backend configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// In-memory storage (ephemeral)
    InMemory,

    /// In-memory storage persisted to a JSONL snapshot file
    Jsonl(PathBuf),
}

impl StoreBackend {
    /// Returns the snapshot file path for file-based backends.
    #[must_use]
    pub fn data_path(&self) -> Option<&Path> {
        match self {
            StoreBackend::Jsonl(path) => Some(path),
            StoreBackend::InMemory => None,
        }
    }
}

/// Open a store for the given backend.
///
/// For `Jsonl`, an existing snapshot is loaded; load warnings are logged
/// and the offending lines skipped. A missing file yields an empty store.
///
/// # Errors
///
/// Returns `Error::Io` if the snapshot exists but cannot be read.
pub async fn open_store(backend: StoreBackend) -> Result<Arc<dyn DocumentStore>> {
    match backend {
        StoreBackend::InMemory => Ok(Arc::new(MemoryStore::new())),
        StoreBackend::Jsonl(path) => Ok(Arc::new(MemoryStore::open(path).await?)),
    }
}

/// Fetch and decode one document.
///
/// # Errors
///
/// Returns `Error::Json` if the stored body does not match `T`.
pub async fn fetch<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    key: &DocKey,
) -> Result<Option<T>> {
    store.get(key).await?.map(|doc| doc.decode()).transpose()
}

/// Run a query and decode every result.
///
/// # Errors
///
/// Returns `Error::Json` if any matching body does not match `T`.
pub async fn fetch_all<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    query: &Query,
) -> Result<Vec<T>> {
    store
        .query(query)
        .await?
        .iter()
        .map(VersionedDocument::decode)
        .collect()
}
