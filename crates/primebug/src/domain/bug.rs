use super::{require_text, BugId, BugStatus, ProjectId, Resolution, UserId};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum title length in characters.
pub const MAX_TITLE_LENGTH: usize = 200;

/// Maximum description length in characters.
pub const MAX_DESCRIPTION_LENGTH: usize = 20_000;

/// Human ticket number, `{projectCode}-{sequence}`. Assigned once.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketNumber(pub String);

impl TicketNumber {
    /// Format a ticket number.
    #[must_use]
    pub fn new(code: &str, sequence: u64) -> Self {
        Self(format!("{code}-{sequence}"))
    }

    /// The formatted number.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The sequence part, if the number is well formed.
    #[must_use]
    pub fn sequence(&self) -> Option<u64> {
        self.0.rsplit_once('-').and_then(|(_, seq)| seq.parse().ok())
    }
}

impl fmt::Display for TicketNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of work a ticket describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    /// Defect.
    Bug,
    /// Enhancement.
    Improvement,
    /// Plain task.
    Task,
    /// Visual-only issue.
    Cosmetic,
    /// Concern spanning several areas.
    #[serde(rename = "Cross-cutting")]
    CrossCutting,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Bug => write!(f, "Bug"),
            Category::Improvement => write!(f, "Improvement"),
            Category::Task => write!(f, "Task"),
            Category::Cosmetic => write!(f, "Cosmetic"),
            Category::CrossCutting => write!(f, "Cross-cutting"),
        }
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace(['_', ' '], "-").as_str() {
            "bug" => Ok(Category::Bug),
            "improvement" => Ok(Category::Improvement),
            "task" => Ok(Category::Task),
            "cosmetic" => Ok(Category::Cosmetic),
            "cross-cutting" | "crosscutting" => Ok(Category::CrossCutting),
            _ => Err(format!(
                "Invalid category: '{s}'. Must be bug, improvement, task, cosmetic or cross-cutting"
            )),
        }
    }
}

/// Ticket priority.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub enum Priority {
    /// Low.
    Low,
    /// Medium (default).
    #[default]
    Medium,
    /// High.
    High,
    /// Critical.
    Critical,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Low => write!(f, "Low"),
            Priority::Medium => write!(f, "Medium"),
            Priority::High => write!(f, "High"),
            Priority::Critical => write!(f, "Critical"),
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "critical" => Ok(Priority::Critical),
            _ => Err(format!(
                "Invalid priority: '{s}'. Must be low, medium, high or critical"
            )),
        }
    }
}

/// A file stored in blob storage and referenced from a bug or comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Original file name.
    pub name: String,
    /// Public URL.
    pub url: String,
    /// Blob path, used for deletion.
    pub storage_path: String,
    /// MIME type.
    pub mime_type: String,
    /// Size in bytes.
    pub size: u64,
}

/// A ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bug {
    /// System-generated id.
    pub id: BugId,

    /// Parent project.
    #[serde(rename = "proyecto_id")]
    pub project_id: ProjectId,

    /// Human ticket number, immutable once assigned.
    #[serde(rename = "numero_bug")]
    pub ticket_number: TicketNumber,

    /// Title.
    pub title: String,

    /// Rich-text description.
    #[serde(default)]
    pub description: String,

    /// Category.
    pub category: Category,

    /// Priority.
    #[serde(default)]
    pub priority: Priority,

    /// Workflow status.
    pub status: BugStatus,

    /// Only set while `status` is Resolved.
    #[serde(rename = "resolucion", default)]
    pub resolution: Option<Resolution>,

    /// Assigned member (optional).
    #[serde(default)]
    pub assignee: Option<UserId>,

    /// Reporter; never changes.
    pub created_by: UserId,

    /// Attached files, in upload order.
    #[serde(rename = "adjuntos", default)]
    pub attachments: Vec<Attachment>,

    /// Commit or external ticket reference.
    #[serde(rename = "commit_id", default)]
    pub commit_reference: Option<String>,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,

    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Bug {
    /// Creator or current assignee.
    #[must_use]
    pub fn is_participant(&self, user: &UserId) -> bool {
        self.created_by == *user || self.assignee.as_ref() == Some(user)
    }

    /// Assignee, ignoring blank ids.
    #[must_use]
    pub fn assigned_to(&self) -> Option<&UserId> {
        self.assignee.as_ref().filter(|id| !id.is_empty())
    }
}

/// Data for creating a bug. New bugs always start Open.
#[derive(Debug, Clone)]
pub struct NewBug {
    /// Title.
    pub title: String,
    /// Description.
    pub description: String,
    /// Category.
    pub category: Category,
    /// Priority; `None` means Medium.
    pub priority: Option<Priority>,
    /// Initial assignee.
    pub assignee: Option<UserId>,
    /// Files uploaded before creation.
    pub attachments: Vec<Attachment>,
}

impl NewBug {
    /// A bug with only the required fields.
    pub fn new(title: impl Into<String>, category: Category) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            category,
            priority: None,
            assignee: None,
            attachments: Vec::new(),
        }
    }

    /// Check field limits; returns the trimmed title.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` for an empty or oversized field.
    pub fn validate(&self) -> Result<String> {
        let title = validate_title(&self.title)?;
        validate_description(&self.description)?;
        Ok(title)
    }
}

/// Edit of an existing bug. `None` leaves a field alone.
///
/// Title, description, category and attachments are content; priority and
/// assignee are triage. The two groups have different edit rules.
#[derive(Debug, Clone, Default)]
pub struct BugEdit {
    /// New title.
    pub title: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New category.
    pub category: Option<Category>,
    /// Replacement attachment list.
    pub attachments: Option<Vec<Attachment>>,
    /// Attachments appended to whatever the bug holds when the edit commits.
    pub added_attachments: Vec<Attachment>,
    /// New priority.
    pub priority: Option<Priority>,
    /// New assignee (`Some(None)` unassigns).
    pub assignee: Option<Option<UserId>>,
}

impl BugEdit {
    /// Whether any content field is set.
    #[must_use]
    pub fn touches_content(&self) -> bool {
        self.title.is_some()
            || self.description.is_some()
            || self.category.is_some()
            || self.attachments.is_some()
            || !self.added_attachments.is_empty()
    }

    /// Whether priority or assignee is set.
    #[must_use]
    pub fn touches_triage(&self) -> bool {
        self.priority.is_some() || self.assignee.is_some()
    }

    /// Returns `true` if nothing would change.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.touches_content() && !self.touches_triage()
    }
}

/// Filter for listing bugs of a project.
#[derive(Debug, Clone, Default)]
pub struct BugFilter {
    /// Filter by status.
    pub status: Option<BugStatus>,
    /// Filter by assignee.
    pub assignee: Option<UserId>,
    /// Filter by priority.
    pub priority: Option<Priority>,
    /// Filter by category.
    pub category: Option<Category>,
}

impl BugFilter {
    /// Whether `bug` passes every set criterion.
    #[must_use]
    pub fn matches(&self, bug: &Bug) -> bool {
        self.status.is_none_or(|s| bug.status == s)
            && self
                .assignee
                .as_ref()
                .is_none_or(|a| bug.assignee.as_ref() == Some(a))
            && self.priority.is_none_or(|p| bug.priority == p)
            && self.category.is_none_or(|c| bug.category == c)
    }
}

pub(crate) fn validate_title(title: &str) -> Result<String> {
    let title = require_text("Title", title)?;
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(Error::Validation(format!(
            "Title cannot exceed {MAX_TITLE_LENGTH} characters"
        )));
    }
    Ok(title)
}

pub(crate) fn validate_description(description: &str) -> Result<()> {
    if description.chars().count() > MAX_DESCRIPTION_LENGTH {
        return Err(Error::Validation(format!(
            "Description cannot exceed {MAX_DESCRIPTION_LENGTH} characters"
        )));
    }
    Ok(())
}
