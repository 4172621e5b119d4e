use super::{ActivityId, Actor, Bug, BugId, BugStatus, ProjectId, Resolution};
use crate::id_generation::generate_id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What an activity entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    /// The bug was reported.
    Creation,
    /// The bug moved between statuses.
    StatusChange,
    /// A commit or external reference was attached.
    Traceability,
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivityKind::Creation => write!(f, "creation"),
            ActivityKind::StatusChange => write!(f, "status_change"),
            ActivityKind::Traceability => write!(f, "traceability"),
        }
    }
}

/// Immutable audit row attached to a bug.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    /// Entry id.
    pub id: ActivityId,

    /// Bug the entry belongs to.
    pub bug_id: BugId,

    /// Project of the bug, for cascade deletes.
    #[serde(rename = "proyecto_id")]
    pub project_id: ProjectId,

    /// Entry type.
    #[serde(rename = "type")]
    pub kind: ActivityKind,

    /// Human-readable summary.
    pub description: String,

    /// Value before the change (status changes).
    #[serde(default)]
    pub old_value: Option<String>,

    /// Value after the change (status changes, traceability).
    #[serde(default)]
    pub new_value: Option<String>,

    /// Resolution recorded with a move to Resolved.
    #[serde(default)]
    pub resolution: Option<Resolution>,

    /// Who did it.
    pub actor: Actor,

    /// When it happened.
    pub timestamp: DateTime<Utc>,
}

impl ActivityEntry {
    fn base(bug: &Bug, kind: ActivityKind, description: String, actor: Actor, at: DateTime<Utc>) -> Self {
        Self {
            id: ActivityId::new(generate_id("activity", bug.id.as_str())),
            bug_id: bug.id.clone(),
            project_id: bug.project_id.clone(),
            kind,
            description,
            old_value: None,
            new_value: None,
            resolution: None,
            actor,
            timestamp: at,
        }
    }

    /// Entry written alongside a new bug.
    #[must_use]
    pub fn creation(bug: &Bug, actor: Actor, at: DateTime<Utc>) -> Self {
        let description = format!("{} created {}", actor.display_name, bug.ticket_number);
        Self::base(bug, ActivityKind::Creation, description, actor, at)
    }

    /// Entry for a status move.
    #[must_use]
    pub fn status_change(
        bug: &Bug,
        from: BugStatus,
        to: BugStatus,
        resolution: Option<Resolution>,
        actor: Actor,
        at: DateTime<Utc>,
    ) -> Self {
        let description = match resolution {
            Some(resolution) => format!(
                "{} changed status from {from} to {to} ({resolution})",
                actor.display_name
            ),
            None => format!("{} changed status from {from} to {to}", actor.display_name),
        };
        let mut entry = Self::base(bug, ActivityKind::StatusChange, description, actor, at);
        entry.old_value = Some(from.to_string());
        entry.new_value = Some(to.to_string());
        entry.resolution = resolution;
        entry
    }

    /// Entry for an attached commit or ticket reference.
    #[must_use]
    pub fn traceability(bug: &Bug, reference: &str, actor: Actor, at: DateTime<Utc>) -> Self {
        let description = format!("{} linked reference {reference}", actor.display_name);
        let mut entry = Self::base(bug, ActivityKind::Traceability, description, actor, at);
        entry.old_value = bug.commit_reference.clone();
        entry.new_value = Some(reference.to_string());
        entry
    }
}
