//! Notification outbox and inbox.
//!
//! Services never write notifications inside their own transaction. After a
//! primary commit they hand [`NotificationIntent`]s to the
//! [`NotificationOutbox`], which reserves an id per notification and
//! delivers them with its own retry policy. Delivery problems are logged
//! and never reach the caller of the primary operation.

use super::Backend;
use crate::domain::{
    collections, ActingUser, Notification, NotificationId, NotificationIntent, UserId,
};
use crate::error::{Error, Result};
use crate::id_generation::generate_id;
use chrono::Utc;
use primebug_docstore::store::{fetch, fetch_all};
use primebug_docstore::{DocumentStore, Query, WriteBatch, MAX_BATCH_WRITES};
use serde::Serialize;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
struct Pending {
    notification: Notification,
    attempts: u32,
}

/// Outcome of one [`NotificationOutbox::flush`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    /// Written to the inbox (or found already written).
    pub delivered: usize,
    /// Failed and queued for another attempt.
    pub requeued: usize,
    /// Failed for the last allowed time and discarded.
    pub dropped: usize,
}

/// Queue of notifications waiting to be written.
#[derive(Debug)]
pub struct NotificationOutbox {
    queue: Mutex<VecDeque<Pending>>,
    max_attempts: u32,
}

impl NotificationOutbox {
    /// Create an outbox that tries each notification `max_attempts` times.
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            max_attempts: max_attempts.max(1),
        }
    }

    fn queue(&self) -> MutexGuard<'_, VecDeque<Pending>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue `intent`. Returns `false`, queuing nothing, when the recipient
    /// is empty.
    pub fn enqueue(&self, intent: NotificationIntent) -> bool {
        if intent.recipient.is_empty() {
            debug!(kind = %intent.kind, "Skipping notification without recipient");
            return false;
        }
        let notification = Notification {
            id: NotificationId::new(generate_id("notification", intent.recipient.as_str())),
            recipient: intent.recipient,
            sender_name: intent.sender_name,
            kind: intent.kind,
            title: intent.title,
            message: intent.message,
            link: intent.link,
            read: false,
            created_at: Utc::now(),
        };
        self.queue().push_back(Pending {
            notification,
            attempts: 0,
        });
        true
    }

    /// Number of notifications waiting for delivery.
    pub fn pending(&self) -> usize {
        self.queue().len()
    }

    /// Try to deliver everything currently queued.
    ///
    /// Each notification is inserted with an absent-document precondition,
    /// so a retry after an ambiguous failure cannot create a duplicate.
    pub async fn flush(&self, store: &dyn DocumentStore) -> FlushReport {
        let drained: Vec<Pending> = self.queue().drain(..).collect();
        let mut report = FlushReport::default();
        let mut retry = Vec::new();

        for mut pending in drained {
            let key = pending.notification.id.key();
            let mut batch = WriteBatch::new();
            batch.require_absent(&key);
            if let Err(e) = batch.set(&key, &pending.notification) {
                warn!(id = %pending.notification.id, error = %e, "Dropping unencodable notification");
                report.dropped += 1;
                continue;
            }

            match store.commit(batch).await {
                Ok(()) => report.delivered += 1,
                Err(e) if e.is_conflict() => {
                    debug!(id = %pending.notification.id, "Notification already delivered");
                    report.delivered += 1;
                }
                Err(e) => {
                    pending.attempts += 1;
                    if pending.attempts >= self.max_attempts {
                        warn!(
                            id = %pending.notification.id,
                            recipient = %pending.notification.recipient,
                            attempts = pending.attempts,
                            error = %e,
                            "Dropping notification after repeated delivery failures"
                        );
                        report.dropped += 1;
                    } else {
                        warn!(
                            id = %pending.notification.id,
                            attempts = pending.attempts,
                            error = %e,
                            "Notification delivery failed; will retry"
                        );
                        retry.push(pending);
                        report.requeued += 1;
                    }
                }
            }
        }

        if !retry.is_empty() {
            let mut queue = self.queue();
            for pending in retry.into_iter().rev() {
                queue.push_front(pending);
            }
        }
        report
    }
}

/// A user's notifications, newest first.
///
/// # Errors
///
/// Propagates store failures.
pub async fn list_notifications(
    backend: &Backend,
    user: &UserId,
    unread_only: bool,
) -> Result<Vec<Notification>> {
    let mut query = Query::collection(collections::NOTIFICATIONS).eq("recipient", user.as_str());
    if unread_only {
        query = query.eq("read", false);
    }
    let mut notifications: Vec<Notification> = fetch_all(backend.store(), &query).await?;
    notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(notifications)
}

/// Mark one notification read. Only its recipient may do so.
///
/// # Errors
///
/// - `Error::NotificationNotFound` if it does not exist
/// - `Error::Permission` if `actor` is not the recipient
pub async fn mark_read(
    backend: &Backend,
    id: &NotificationId,
    actor: &ActingUser,
) -> Result<Notification> {
    let mut notification: Notification = fetch(backend.store(), &id.key())
        .await?
        .ok_or_else(|| Error::NotificationNotFound(id.clone()))?;
    if notification.recipient != actor.id {
        return Err(Error::Permission(
            "Only the recipient can mark a notification as read".to_string(),
        ));
    }
    if notification.read {
        return Ok(notification);
    }

    let mut batch = WriteBatch::new();
    batch.update(&id.key(), &json!({ "read": true }))?;
    backend.store().commit(batch).await?;
    notification.read = true;
    debug!(id = %id, "Notification marked read");
    Ok(notification)
}

/// Mark every unread notification of `actor` read. Returns how many changed.
///
/// # Errors
///
/// Propagates store failures; batches committed before a failure stay
/// committed.
pub async fn mark_all_read(backend: &Backend, actor: &ActingUser) -> Result<usize> {
    let unread = list_notifications(backend, &actor.id, true).await?;
    let mut batches = Vec::new();
    for chunk in unread.chunks(MAX_BATCH_WRITES) {
        let mut batch = WriteBatch::new();
        for notification in chunk {
            batch.update(&notification.id.key(), &json!({ "read": true }))?;
        }
        batches.push(batch);
    }
    backend.commit_sequentially(batches).await?;
    info!(user = %actor.id, count = unread.len(), "Marked notifications read");
    Ok(unread.len())
}

/// Number of unread notifications for `user`.
///
/// # Errors
///
/// Propagates store failures.
pub async fn unread_count(backend: &Backend, user: &UserId) -> Result<usize> {
    let query = Query::collection(collections::NOTIFICATIONS)
        .eq("recipient", user.as_str())
        .eq("read", false);
    Ok(backend.store().query(&query).await?.len())
}
