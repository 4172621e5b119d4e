use super::{Actor, Attachment, BugId, CommentId, ProjectId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Append-only comment on a bug.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    /// Comment id.
    pub id: CommentId,

    /// Bug commented on.
    pub bug_id: BugId,

    /// Project of the bug, for cascade deletes.
    #[serde(rename = "proyecto_id")]
    pub project_id: ProjectId,

    /// Text; may be absent when attachments are present.
    #[serde(default)]
    pub text: Option<String>,

    /// Attached files.
    #[serde(rename = "adjuntos", default)]
    pub attachments: Vec<Attachment>,

    /// Author.
    pub author: Actor,

    /// Written by the system rather than typed by the author.
    #[serde(default)]
    pub system: bool,

    /// When it was posted.
    pub created_at: DateTime<Utc>,
}

/// Data for a new comment.
#[derive(Debug, Clone, Default)]
pub struct NewComment {
    /// Text.
    pub text: Option<String>,
    /// Files uploaded for the comment.
    pub attachments: Vec<Attachment>,
}

impl NewComment {
    /// A text-only comment.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            attachments: Vec::new(),
        }
    }

    /// Trimmed text, `None` if blank.
    #[must_use]
    pub fn normalized_text(&self) -> Option<String> {
        self.text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(ToString::to_string)
    }

    /// Whether there is neither text nor an attachment.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.normalized_text().is_none() && self.attachments.is_empty()
    }
}
