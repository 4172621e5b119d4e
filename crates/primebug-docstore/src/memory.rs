//! In-memory document engine.
//!
//! All documents live in a `BTreeMap` behind a `tokio::sync::Mutex`, so
//! every read and commit observes a consistent state and iteration order
//! is deterministic. The engine can optionally be bound to a JSONL
//! snapshot file (see [`crate::jsonl`]).

use crate::batch::{WriteBatch, WriteOp, MAX_BATCH_WRITES};
use crate::document::{DocKey, VersionedDocument};
use crate::error::{Error, Result};
use crate::jsonl::{load_snapshot, save_snapshot};
use crate::query::Query;
use crate::store::DocumentStore;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Documents plus the store-wide write counter.
#[derive(Debug, Default, Clone)]
pub(crate) struct MemoryState {
    pub(crate) docs: BTreeMap<DocKey, VersionedDocument>,
    pub(crate) last_version: u64,
}

impl MemoryState {
    /// Validate `batch` against the current state and compute the
    /// resulting documents without touching `self`.
    ///
    /// Returns the staged document states (`None` = deleted) and the
    /// write counter after the commit.
    fn stage(&self, batch: &WriteBatch) -> Result<(BTreeMap<DocKey, Option<VersionedDocument>>, u64)> {
        if batch.len() > MAX_BATCH_WRITES {
            return Err(Error::BatchTooLarge {
                count: batch.len(),
                limit: MAX_BATCH_WRITES,
            });
        }

        for precondition in batch.preconditions() {
            let actual = self.docs.get(&precondition.key).map(|d| d.version);
            if actual != precondition.expected {
                return Err(Error::Conflict {
                    key: precondition.key.clone(),
                    expected: precondition.expected,
                    actual,
                });
            }
        }

        let mut staged: BTreeMap<DocKey, Option<VersionedDocument>> = BTreeMap::new();
        let mut version = self.last_version;

        for op in batch.ops() {
            let key = op.key();
            let current = match staged.get(key) {
                Some(state) => state.clone(),
                None => self.docs.get(key).cloned(),
            };

            let next = match op {
                WriteOp::Set { data, .. } => {
                    version += 1;
                    Some(VersionedDocument {
                        key: key.clone(),
                        version,
                        data: data.clone(),
                    })
                }
                WriteOp::Update { fields, .. } => {
                    let mut doc = current.ok_or_else(|| Error::MissingDocument(key.clone()))?;
                    for (field, value) in fields {
                        doc.data.insert(field.clone(), value.clone());
                    }
                    version += 1;
                    doc.version = version;
                    Some(doc)
                }
                WriteOp::Delete { .. } => None,
            };
            staged.insert(key.clone(), next);
        }

        Ok((staged, version))
    }

    fn apply(&mut self, batch: &WriteBatch) -> Result<()> {
        let (staged, version) = self.stage(batch)?;
        for (key, state) in staged {
            match state {
                Some(doc) => {
                    self.docs.insert(key, doc);
                }
                None => {
                    self.docs.remove(&key);
                }
            }
        }
        self.last_version = version;
        Ok(())
    }
}

/// The in-memory [`DocumentStore`] implementation.
#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    snapshot_path: Option<PathBuf>,
}

impl MemoryStore {
    /// Create an empty, ephemeral store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            snapshot_path: None,
        }
    }

    /// Create a store bound to a JSONL snapshot, loading it if it exists.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file exists but cannot be read.
    pub async fn open(path: PathBuf) -> Result<Self> {
        let state = Self::read_snapshot(&path).await?;
        Ok(Self {
            state: Mutex::new(state),
            snapshot_path: Some(path),
        })
    }

    async fn read_snapshot(path: &std::path::Path) -> Result<MemoryState> {
        if !path.exists() {
            debug!(path = %path.display(), "No snapshot yet, starting empty");
            return Ok(MemoryState::default());
        }
        let (state, warnings) = load_snapshot(path).await?;
        for warning in &warnings {
            warn!(warning = ?warning, "JSONL load warning");
        }
        Ok(state)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, key: &DocKey) -> Result<Option<VersionedDocument>> {
        let state = self.state.lock().await;
        Ok(state.docs.get(key).cloned())
    }

    async fn query(&self, query: &Query) -> Result<Vec<VersionedDocument>> {
        query.validate()?;
        let state = self.state.lock().await;
        let mut matches: Vec<VersionedDocument> = state
            .docs
            .range(DocKey::new(query.collection.clone(), String::new())..)
            .take_while(|(key, _)| key.collection == query.collection)
            .filter(|(_, doc)| query.matches(&doc.data))
            .map(|(_, doc)| doc.clone())
            .collect();
        drop(state);

        query.finish(&mut matches, |doc| &doc.data);
        Ok(matches)
    }

    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        let mut state = self.state.lock().await;
        state.apply(&batch)
    }

    async fn export_all(&self) -> Result<Vec<VersionedDocument>> {
        let state = self.state.lock().await;
        Ok(state.docs.values().cloned().collect())
    }

    async fn save(&self) -> Result<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        let state = self.state.lock().await.clone();
        save_snapshot(&state, path).await
    }

    async fn reload(&self) -> Result<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        let fresh = Self::read_snapshot(path).await?;
        *self.state.lock().await = fresh;
        Ok(())
    }
}
