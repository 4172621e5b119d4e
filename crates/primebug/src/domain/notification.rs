use super::{NotificationId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a notification was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationKind {
    /// A bug was assigned to the recipient.
    BugAssigned,
    /// A bug the recipient follows changed status.
    BugStatusChanged,
    /// Someone commented on a bug the recipient follows.
    BugCommented,
    /// The recipient was added to a project.
    ProjectAssigned,
    /// A commit reference was attached to the recipient's bug.
    BugReferenceAttached,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationKind::BugAssigned => write!(f, "BugAssigned"),
            NotificationKind::BugStatusChanged => write!(f, "BugStatusChanged"),
            NotificationKind::BugCommented => write!(f, "BugCommented"),
            NotificationKind::ProjectAssigned => write!(f, "ProjectAssigned"),
            NotificationKind::BugReferenceAttached => write!(f, "BugReferenceAttached"),
        }
    }
}

/// Inbox row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Notification id, reserved when the intent is queued.
    pub id: NotificationId,

    /// Recipient.
    pub recipient: UserId,

    /// Display name of whoever triggered it.
    pub sender_name: String,

    /// Notification type.
    #[serde(rename = "type")]
    pub kind: NotificationKind,

    /// Short title.
    pub title: String,

    /// Body.
    pub message: String,

    /// Deep link into the application.
    pub link: String,

    /// Read flag.
    #[serde(default)]
    pub read: bool,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// A notification a service wants delivered after its commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationIntent {
    /// Recipient; empty means nobody.
    pub recipient: UserId,
    /// Display name of the sender.
    pub sender_name: String,
    /// Notification type.
    pub kind: NotificationKind,
    /// Title.
    pub title: String,
    /// Body.
    pub message: String,
    /// Deep link, relative to the configured link base.
    pub link: String,
}
