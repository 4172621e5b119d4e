//! Fault injection for code built on [`DocumentStore`].
//!
//! Available with the `test-util` feature (and in this crate's own tests).
//!
//! ```rust,ignore
//! use primebug_docstore::testing::FaultyStore;
//!
//! let store = Arc::new(FaultyStore::new(primebug_docstore::open_store(StoreBackend::InMemory).await?));
//! store.fail_commits_touching("notifications");
//! // every commit writing a notification now fails with Error::Unavailable
//! ```

use crate::batch::WriteBatch;
use crate::document::{DocKey, VersionedDocument};
use crate::error::{Error, Result};
use crate::query::Query;
use crate::store::DocumentStore;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FaultKind {
    Unavailable,
    Conflict,
}

#[derive(Debug, Clone)]
struct FaultRule {
    /// Only batches writing to this collection trip the rule; `None` matches all.
    collection: Option<String>,
    kind: FaultKind,
    /// Remaining trips; `None` means unlimited.
    remaining: Option<u32>,
}

/// A [`DocumentStore`] wrapper that fails selected commits.
///
/// Reads always pass through. Commits are checked against the registered
/// rules in order; the first live rule whose collection the batch touches
/// rejects the commit before it reaches the inner store.
///
/// It can also interleave: a batch queued with
/// [`FaultyStore::interleave_before_commit_touching`] lands on the inner
/// store right before the next matching commit, as if another writer got
/// there first.
pub struct FaultyStore {
    inner: Arc<dyn DocumentStore>,
    rules: Mutex<Vec<FaultRule>>,
    interleaved: Mutex<Vec<(String, WriteBatch)>>,
    commits_attempted: AtomicUsize,
    commits_rejected: AtomicUsize,
}

impl FaultyStore {
    /// Wrap `inner` with no faults registered.
    pub fn new(inner: Arc<dyn DocumentStore>) -> Self {
        Self {
            inner,
            rules: Mutex::new(Vec::new()),
            interleaved: Mutex::new(Vec::new()),
            commits_attempted: AtomicUsize::new(0),
            commits_rejected: AtomicUsize::new(0),
        }
    }

    fn rules(&self) -> MutexGuard<'_, Vec<FaultRule>> {
        // A poisoned lock only means another test thread panicked mid-update.
        self.rules
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn push(&self, collection: Option<&str>, kind: FaultKind, remaining: Option<u32>) {
        self.rules().push(FaultRule {
            collection: collection.map(str::to_string),
            kind,
            remaining,
        });
    }

    /// Fail every commit that writes to `collection`.
    pub fn fail_commits_touching(&self, collection: &str) {
        self.push(Some(collection), FaultKind::Unavailable, None);
    }

    /// Fail the next `count` commits, whatever they write.
    pub fn fail_next_commits(&self, count: u32) {
        self.push(None, FaultKind::Unavailable, Some(count));
    }

    /// Report a write conflict for the next `count` commits.
    pub fn conflict_next_commits(&self, count: u32) {
        self.push(None, FaultKind::Conflict, Some(count));
    }

    /// Report a write conflict for the next `count` commits writing to `collection`.
    pub fn conflict_next_commits_touching(&self, collection: &str, count: u32) {
        self.push(Some(collection), FaultKind::Conflict, Some(count));
    }

    /// Commit `batch` to the inner store just before the next commit that
    /// writes to `collection`. Fires once.
    pub fn interleave_before_commit_touching(&self, collection: &str, batch: WriteBatch) {
        self.interleaved
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push((collection.to_string(), batch));
    }

    /// Remove every rule and pending interleaved batch.
    pub fn clear(&self) {
        self.rules().clear();
        self.interleaved
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clear();
    }

    /// Commits received so far, rejected or not.
    pub fn commits_attempted(&self) -> usize {
        self.commits_attempted.load(Ordering::SeqCst)
    }

    /// Commits rejected by a rule so far.
    pub fn commits_rejected(&self) -> usize {
        self.commits_rejected.load(Ordering::SeqCst)
    }

    fn trip(&self, batch: &WriteBatch) -> Option<FaultKind> {
        let mut rules = self.rules();
        let rule = rules.iter_mut().find(|rule| {
            rule.remaining != Some(0)
                && rule
                    .collection
                    .as_deref()
                    .is_none_or(|collection| batch.touches(collection))
        })?;
        if let Some(remaining) = rule.remaining.as_mut() {
            *remaining -= 1;
        }
        Some(rule.kind)
    }

    fn take_interleaved(&self, batch: &WriteBatch) -> Option<WriteBatch> {
        let mut pending = self
            .interleaved
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let index = pending
            .iter()
            .position(|(collection, _)| batch.touches(collection))?;
        Some(pending.remove(index).1)
    }
}

#[async_trait]
impl DocumentStore for FaultyStore {
    async fn get(&self, key: &DocKey) -> Result<Option<VersionedDocument>> {
        self.inner.get(key).await
    }

    async fn query(&self, query: &Query) -> Result<Vec<VersionedDocument>> {
        self.inner.query(query).await
    }

    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        self.commits_attempted.fetch_add(1, Ordering::SeqCst);
        if let Some(first) = self.take_interleaved(&batch) {
            self.inner.commit(first).await?;
        }
        match self.trip(&batch) {
            None => self.inner.commit(batch).await,
            Some(kind) => {
                self.commits_rejected.fetch_add(1, Ordering::SeqCst);
                let key = batch
                    .ops()
                    .first()
                    .map_or_else(|| DocKey::new("", ""), |op| op.key().clone());
                Err(match kind {
                    FaultKind::Unavailable => {
                        Error::Unavailable(format!("injected failure writing {key}"))
                    }
                    FaultKind::Conflict => Error::Conflict {
                        key,
                        expected: None,
                        actual: None,
                    },
                })
            }
        }
    }

    async fn export_all(&self) -> Result<Vec<VersionedDocument>> {
        self.inner.export_all().await
    }

    async fn save(&self) -> Result<()> {
        self.inner.save().await
    }

    async fn reload(&self) -> Result<()> {
        self.inner.reload().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use serde_json::json;

    fn bug_batch() -> WriteBatch {
        let mut batch = WriteBatch::new();
        batch
            .set_raw(&DocKey::new("bugs", "b1"), json!({ "t": 1 }))
            .unwrap();
        batch
    }

    #[tokio::test]
    async fn test_collection_rule_only_trips_matching_batches() {
        let store = FaultyStore::new(Arc::new(MemoryStore::new()));
        store.fail_commits_touching("notifications");

        store.commit(bug_batch()).await.unwrap();

        let mut batch = WriteBatch::new();
        batch
            .set_raw(&DocKey::new("notifications", "n1"), json!({}))
            .unwrap();
        let err = store.commit(batch).await.unwrap_err();

        assert!(matches!(err, Error::Unavailable(_)));
        assert_eq!(store.commits_attempted(), 2);
        assert_eq!(store.commits_rejected(), 1);
    }

    #[tokio::test]
    async fn test_counted_rule_expires() {
        let store = FaultyStore::new(Arc::new(MemoryStore::new()));
        store.fail_next_commits(1);

        assert!(store.commit(bug_batch()).await.is_err());
        assert!(store.commit(bug_batch()).await.is_ok());
    }

    #[tokio::test]
    async fn test_interleaved_batch_lands_before_matching_commit() {
        let store = FaultyStore::new(Arc::new(MemoryStore::new()));
        let mut other = WriteBatch::new();
        other
            .set_raw(&DocKey::new("bugs", "b0"), json!({ "t": 0 }))
            .unwrap();
        store.interleave_before_commit_touching("bugs", other);

        let mut guarded = WriteBatch::new();
        guarded
            .require_absent(&DocKey::new("bugs", "b0"))
            .set_raw(&DocKey::new("bugs", "b1"), json!({ "t": 1 }))
            .unwrap();
        let err = store.commit(guarded).await.unwrap_err();
        assert!(err.is_conflict());

        // Fired once; the retry goes through.
        store.commit(bug_batch()).await.unwrap();
        assert!(store.get(&DocKey::new("bugs", "b0")).await.unwrap().is_some());
        assert!(store.get(&DocKey::new("bugs", "b1")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_clear_removes_rules() {
        let store = FaultyStore::new(Arc::new(MemoryStore::new()));
        store.fail_commits_touching("bugs");
        store.clear();
        assert!(store.commit(bug_batch()).await.is_ok());
    }
}
