//! Bug status workflow.
//!
//! ```text
//! Open -> InProgress -> Resolved -> Reopened | Closed
//! Reopened -> InProgress | Resolved | Closed
//! Closed -> Reopened
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Status of a bug.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BugStatus {
    /// Reported, nobody working on it yet.
    Open,
    /// Being worked on.
    InProgress,
    /// Fixed or otherwise settled; carries a [`Resolution`].
    Resolved,
    /// Resolution rejected, back in play.
    Reopened,
    /// Done.
    Closed,
}

impl BugStatus {
    /// Every status, in workflow order.
    pub const ALL: [BugStatus; 5] = [
        BugStatus::Open,
        BugStatus::InProgress,
        BugStatus::Resolved,
        BugStatus::Reopened,
        BugStatus::Closed,
    ];

    /// Statuses reachable in one step.
    ///
    /// Closed is terminal for edits but not for the workflow: a status
    /// change to Reopened is the only way out of it.
    #[must_use]
    pub fn successors(self) -> &'static [BugStatus] {
        match self {
            BugStatus::Open => &[BugStatus::InProgress],
            BugStatus::InProgress => &[BugStatus::Resolved],
            BugStatus::Resolved => &[BugStatus::Reopened, BugStatus::Closed],
            BugStatus::Reopened => &[
                BugStatus::InProgress,
                BugStatus::Resolved,
                BugStatus::Closed,
            ],
            BugStatus::Closed => &[BugStatus::Reopened],
        }
    }

    /// Whether `self -> to` is an edge of the workflow.
    #[must_use]
    pub fn can_transition_to(self, to: BugStatus) -> bool {
        self.successors().contains(&to)
    }

    /// Stored name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            BugStatus::Open => "Open",
            BugStatus::InProgress => "InProgress",
            BugStatus::Resolved => "Resolved",
            BugStatus::Reopened => "Reopened",
            BugStatus::Closed => "Closed",
        }
    }
}

impl fmt::Display for BugStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BugStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded: String = s
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .collect::<String>()
            .to_lowercase();
        match folded.as_str() {
            "open" => Ok(BugStatus::Open),
            "inprogress" => Ok(BugStatus::InProgress),
            "resolved" => Ok(BugStatus::Resolved),
            "reopened" => Ok(BugStatus::Reopened),
            "closed" => Ok(BugStatus::Closed),
            _ => Err(format!(
                "Invalid status: '{s}'. Must be open, in_progress, resolved, reopened or closed"
            )),
        }
    }
}

/// Why a bug was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Resolution {
    /// The fix is done.
    Completed,
    /// Turned into a new requirement.
    NewRequirement,
    /// Duplicate of another bug.
    Duplicate,
    /// Not applicable.
    NotApplicable,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Completed => write!(f, "Completed"),
            Resolution::NewRequirement => write!(f, "NewRequirement"),
            Resolution::Duplicate => write!(f, "Duplicate"),
            Resolution::NotApplicable => write!(f, "NotApplicable"),
        }
    }
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded: String = s
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .collect::<String>()
            .to_lowercase();
        match folded.as_str() {
            "completed" => Ok(Resolution::Completed),
            "newrequirement" => Ok(Resolution::NewRequirement),
            "duplicate" => Ok(Resolution::Duplicate),
            "notapplicable" => Ok(Resolution::NotApplicable),
            _ => Err(format!(
                "Invalid resolution: '{s}'. Must be completed, new_requirement, duplicate or not_applicable"
            )),
        }
    }
}
