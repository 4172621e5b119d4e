//! Services of the bug tracker.
//!
//! Every service function takes the [`Backend`] explicitly: the document
//! store, the blob store, the notification outbox and the settings are
//! constructed once at startup and passed by reference. Every mutating
//! call takes the [`ActingUser`](crate::domain::ActingUser) and checks its
//! rights before writing anything.

pub mod attachments;
pub mod bugs;
pub mod comments;
pub mod notifications;
pub mod profiles;
pub mod projects;
pub mod reports;
pub mod teams;
pub mod traceability;

use crate::blob::{BlobStore, MemoryBlobStore};
use crate::config::ServiceSettings;
use crate::domain::NotificationIntent;
use crate::error::Result;
use notifications::{FlushReport, NotificationOutbox};
use primebug_docstore::{
    open_store, run_transaction, DocKey, DocumentStore, StoreBackend, TxSnapshot, WriteBatch,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

/// Explicitly constructed client shared by all services.
pub struct Backend {
    store: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStore>,
    outbox: NotificationOutbox,
    settings: ServiceSettings,
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("store", &"<dyn DocumentStore>")
            .field("blobs", &"<dyn BlobStore>")
            .field("pending_notifications", &self.outbox.pending())
            .field("settings", &self.settings)
            .finish()
    }
}

impl Backend {
    /// Assemble a backend from its parts.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
        settings: ServiceSettings,
    ) -> Self {
        let outbox = NotificationOutbox::new(settings.max_delivery_attempts);
        Self {
            store,
            blobs,
            outbox,
            settings,
        }
    }

    /// Ephemeral backend with in-memory documents and blobs.
    ///
    /// # Errors
    ///
    /// Propagates store construction failures.
    pub async fn in_memory(settings: ServiceSettings) -> Result<Self> {
        let store = open_store(StoreBackend::InMemory).await?;
        Ok(Self::new(store, Arc::new(MemoryBlobStore::new()), settings))
    }

    /// The document store.
    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    /// The blob store.
    pub fn blobs(&self) -> &dyn BlobStore {
        self.blobs.as_ref()
    }

    /// Pending notifications.
    pub fn outbox(&self) -> &NotificationOutbox {
        &self.outbox
    }

    /// Service tunables.
    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    /// Deliver whatever the outbox holds. Never fails.
    pub async fn flush_notifications(&self) -> FlushReport {
        self.outbox.flush(self.store()).await
    }

    /// Persist the document store.
    ///
    /// # Errors
    ///
    /// Propagates snapshot write failures.
    pub async fn save(&self) -> Result<()> {
        Ok(self.store.save().await?)
    }

    /// Queue post-commit notifications and try to deliver them right away.
    pub(crate) async fn notify(&self, intents: impl IntoIterator<Item = NotificationIntent>) {
        let mut queued = 0;
        for intent in intents {
            if self.outbox.enqueue(intent) {
                queued += 1;
            }
        }
        if queued > 0 {
            self.flush_notifications().await;
        }
    }

    /// Run an optimistic transaction with the configured retry budget.
    pub(crate) async fn transact<T, F>(&self, reads: &[DocKey], body: F) -> Result<T>
    where
        F: FnMut(&TxSnapshot, &mut WriteBatch) -> Result<T> + Send,
        T: Send,
    {
        run_transaction(
            self.store(),
            reads,
            self.settings.max_transaction_attempts,
            body,
        )
        .await
    }

    /// Commit `batches` one after another.
    ///
    /// There is no rollback: if a batch fails, the ones before it stay
    /// committed and the error is returned.
    pub(crate) async fn commit_sequentially(&self, batches: Vec<WriteBatch>) -> Result<usize> {
        let total = batches.len();
        for (index, batch) in batches.into_iter().enumerate() {
            if let Err(e) = self.store.commit(batch).await {
                warn!(batch = index + 1, total, error = %e, "Batch failed; earlier batches stay committed");
                return Err(e.into());
            }
        }
        Ok(total)
    }

    /// Best-effort blob removal; failures are logged.
    pub(crate) async fn remove_blobs<'a>(&self, paths: impl IntoIterator<Item = &'a str>) -> usize {
        let mut removed = 0;
        for path in paths {
            match self.blobs.delete(path).await {
                Ok(()) => removed += 1,
                Err(e) => warn!(path, error = %e, "Failed to delete attachment blob"),
            }
        }
        removed
    }
}

/// What a cascading delete removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CascadeReport {
    /// Bug documents deleted.
    pub bugs: usize,
    /// Activity entries deleted.
    pub activity: usize,
    /// Comments deleted.
    pub comments: usize,
    /// Blobs removed.
    pub blobs: usize,
    /// Write batches committed.
    pub batches: usize,
}
