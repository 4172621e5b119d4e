//! Optimistic multi-document transactions.
//!
//! [`run_transaction`] implements the read-modify-write loop:
//!
//! 1. Load the declared read set into a [`TxSnapshot`], remembering versions.
//! 2. Run the caller's body, which inspects the snapshot and stages writes.
//! 3. Guard every read with a version precondition and commit.
//! 4. On a conflict, start over from a fresh snapshot.
//!
//! The body is synchronous and may run several times; it must not have
//! side effects outside the batch it is handed.

use crate::batch::WriteBatch;
use crate::document::{DocKey, VersionedDocument};
use crate::error::{Error, Result};
use crate::store::DocumentStore;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use tracing::debug;

/// The documents a transaction read, with the versions it saw.
#[derive(Debug, Default, Clone)]
pub struct TxSnapshot {
    docs: HashMap<DocKey, Option<VersionedDocument>>,
}

impl TxSnapshot {
    /// Read `keys` from `store`.
    ///
    /// # Errors
    ///
    /// Propagates store read failures.
    pub async fn load(store: &dyn DocumentStore, keys: &[DocKey]) -> Result<Self> {
        let mut docs = HashMap::with_capacity(keys.len());
        for key in keys {
            let doc = store.get(key).await?;
            docs.insert(key.clone(), doc);
        }
        Ok(Self { docs })
    }

    /// The raw document at `key`, if it was read and exists.
    ///
    /// Keys outside the read set always return `None`.
    #[must_use]
    pub fn get_raw(&self, key: &DocKey) -> Option<&VersionedDocument> {
        self.docs.get(key).and_then(Option::as_ref)
    }

    /// Decode the document at `key`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if the stored body does not match `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &DocKey) -> Result<Option<T>> {
        self.get_raw(key).map(VersionedDocument::decode).transpose()
    }

    /// The version observed for `key`; `None` if absent or not read.
    #[must_use]
    pub fn version(&self, key: &DocKey) -> Option<u64> {
        self.get_raw(key).map(|doc| doc.version)
    }

    /// Pin every read into `batch` so the commit fails if any of them changed.
    fn guard(&self, batch: &mut WriteBatch) {
        for (key, doc) in &self.docs {
            match doc {
                Some(doc) => batch.require_version(key, doc.version),
                None => batch.require_absent(key),
            };
        }
    }
}

/// Run `body` as an optimistic transaction over `reads`.
///
/// The body receives a snapshot of the read set and an empty batch. If it
/// returns `Ok`, the batch is committed with every read pinned to its
/// observed version. A conflicting concurrent commit causes a retry from a
/// fresh snapshot, up to `max_attempts` attempts in total (at least one).
///
/// If the body returns `Err`, nothing is written and the error is
/// returned unchanged.
///
/// # Errors
///
/// - The body's own error
/// - `Error::TransactionExhausted` (converted into `E`) when every attempt conflicted
/// - Any non-conflict commit failure (converted into `E`)
pub async fn run_transaction<T, E, F>(
    store: &dyn DocumentStore,
    reads: &[DocKey],
    max_attempts: u32,
    mut body: F,
) -> std::result::Result<T, E>
where
    F: FnMut(&TxSnapshot, &mut WriteBatch) -> std::result::Result<T, E> + Send,
    E: From<Error>,
    T: Send,
{
    let max_attempts = max_attempts.max(1);

    for attempt in 1..=max_attempts {
        let snapshot = TxSnapshot::load(store, reads).await?;
        let mut batch = WriteBatch::new();
        let output = body(&snapshot, &mut batch)?;
        snapshot.guard(&mut batch);

        match store.commit(batch).await {
            Ok(()) => {
                debug!(attempt, "Transaction committed");
                return Ok(output);
            }
            Err(e) if e.is_conflict() => {
                debug!(attempt, max_attempts, error = %e, "Transaction conflicted, retrying");
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(Error::TransactionExhausted {
        attempts: max_attempts,
    }
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::testing::FaultyStore;
    use serde_json::json;
    use std::sync::Arc;

    fn counter() -> DocKey {
        DocKey::new("counters", "c")
    }

    fn increment(snapshot: &TxSnapshot, batch: &mut WriteBatch) -> Result<u64> {
        let current = snapshot
            .get_raw(&counter())
            .and_then(|doc| doc.data.get("value").and_then(serde_json::Value::as_u64))
            .unwrap_or(0);
        batch.set_raw(&counter(), json!({ "value": current + 1 }))?;
        Ok(current + 1)
    }

    #[tokio::test]
    async fn test_transaction_commits_body_writes() {
        let store = MemoryStore::new();
        let first = run_transaction(&store, &[counter()], 3, increment).await.unwrap();
        let second = run_transaction(&store, &[counter()], 3, increment).await.unwrap();
        assert_eq!((first, second), (1, 2));
    }

    #[tokio::test]
    async fn test_body_error_writes_nothing() {
        let store = MemoryStore::new();
        let result: Result<()> = run_transaction(&store, &[counter()], 3, |_, batch| {
            batch.set_raw(&counter(), json!({ "value": 99 }))?;
            Err(Error::Unavailable("body refused".to_string()))
        })
        .await;

        assert!(result.is_err());
        assert!(store.get(&counter()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_conflict_is_retried() {
        let store = FaultyStore::new(Arc::new(MemoryStore::new()));
        store.conflict_next_commits(2);

        let mut runs = 0;
        let value = run_transaction(&store, &[counter()], 5, |snapshot, batch| {
            runs += 1;
            increment(snapshot, batch)
        })
        .await
        .unwrap();

        assert_eq!(value, 1);
        assert_eq!(runs, 3);
    }

    #[tokio::test]
    async fn test_conflicts_exhaust_attempts() {
        let store = FaultyStore::new(Arc::new(MemoryStore::new()));
        store.conflict_next_commits(10);

        let err = run_transaction(&store, &[counter()], 4, increment)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::TransactionExhausted { attempts: 4 }));
        assert!(store.get(&counter()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stale_read_detected_at_commit() {
        let store = MemoryStore::new();
        run_transaction(&store, &[counter()], 1, increment).await.unwrap();

        let snapshot = TxSnapshot::load(&store, &[counter()]).await.unwrap();
        run_transaction(&store, &[counter()], 1, increment).await.unwrap();

        let mut batch = WriteBatch::new();
        increment(&snapshot, &mut batch).unwrap();
        snapshot.guard(&mut batch);
        assert!(store.commit(batch).await.unwrap_err().is_conflict());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments_never_lose_updates() {
        let store = Arc::new(MemoryStore::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                run_transaction(store.as_ref(), &[counter()], 200, increment).await
            }));
        }

        let mut values = Vec::new();
        for handle in handles {
            values.push(handle.await.unwrap().unwrap());
        }
        values.sort_unstable();

        assert_eq!(values, (1..=16).collect::<Vec<u64>>());
    }
}
