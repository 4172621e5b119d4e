use super::{require_text, ProjectId, TeamId, TicketNumber, UserId};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Shortest accepted project code.
pub const MIN_CODE_LENGTH: usize = 2;

/// Longest accepted project code.
pub const MAX_CODE_LENGTH: usize = 10;

/// Lifecycle of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProjectStatus {
    /// Work in progress.
    #[default]
    Active,
    /// Paused.
    Standby,
    /// Finished.
    Closed,
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectStatus::Active => write!(f, "Active"),
            ProjectStatus::Standby => write!(f, "Standby"),
            ProjectStatus::Closed => write!(f, "Closed"),
        }
    }
}

impl FromStr for ProjectStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(ProjectStatus::Active),
            "standby" => Ok(ProjectStatus::Standby),
            "closed" => Ok(ProjectStatus::Closed),
            _ => Err(format!(
                "Invalid project status: '{s}'. Must be active, standby or closed"
            )),
        }
    }
}

/// Role of a user inside a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProjectRole {
    /// The user that created the project. Exactly one per project.
    Creator,
    /// May manage members and project settings.
    Admin,
    /// Regular member.
    Member,
}

impl ProjectRole {
    /// Creator and Admin may manage the project.
    #[must_use]
    pub fn can_manage(self) -> bool {
        matches!(self, ProjectRole::Creator | ProjectRole::Admin)
    }
}

impl fmt::Display for ProjectRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectRole::Creator => write!(f, "Creator"),
            ProjectRole::Admin => write!(f, "Admin"),
            ProjectRole::Member => write!(f, "Member"),
        }
    }
}

impl FromStr for ProjectRole {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "creator" => Ok(ProjectRole::Creator),
            "admin" => Ok(ProjectRole::Admin),
            "member" => Ok(ProjectRole::Member),
            _ => Err(format!(
                "Invalid project role: '{s}'. Must be creator, admin or member"
            )),
        }
    }
}

/// A project and its ticket sequence counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Slug id, globally unique.
    pub id: ProjectId,

    /// Project name.
    pub name: String,

    /// Short code used as the ticket number prefix.
    #[serde(rename = "sigla")]
    pub code: String,

    /// Free-text description.
    #[serde(default)]
    pub description: String,

    /// Owning team.
    pub team_id: TeamId,

    /// Lifecycle status.
    #[serde(default)]
    pub status: ProjectStatus,

    /// Last ticket sequence handed out. Only ever incremented by one,
    /// inside the transaction that persists the new bug.
    #[serde(default)]
    pub last_ticket_sequence: u64,

    /// Member ids; kept as an array for membership queries.
    #[serde(default)]
    pub members: Vec<UserId>,

    /// Role per member.
    #[serde(default)]
    pub roles: BTreeMap<UserId, ProjectRole>,

    /// Creator of the project.
    pub created_by: UserId,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,

    /// Last settings or membership change.
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// Whether `user` belongs to the project.
    #[must_use]
    pub fn is_member(&self, user: &UserId) -> bool {
        self.members.contains(user)
    }

    /// Role of `user`, if a member.
    #[must_use]
    pub fn role_of(&self, user: &UserId) -> Option<ProjectRole> {
        self.roles.get(user).copied()
    }

    /// Whether `user` is the Creator or an Admin.
    #[must_use]
    pub fn can_manage(&self, user: &UserId) -> bool {
        self.role_of(user).is_some_and(ProjectRole::can_manage)
    }

    /// Whether `user` created the project.
    #[must_use]
    pub fn is_creator(&self, user: &UserId) -> bool {
        self.role_of(user) == Some(ProjectRole::Creator)
    }

    /// The sequence and ticket number the next bug would receive.
    #[must_use]
    pub fn next_ticket(&self) -> (u64, TicketNumber) {
        let next = self.last_ticket_sequence + 1;
        (next, TicketNumber::new(&self.code, next))
    }
}

/// Data for creating a project.
#[derive(Debug, Clone)]
pub struct NewProject {
    /// Project name.
    pub name: String,
    /// Short code ("sigla").
    pub code: String,
    /// Description.
    pub description: String,
    /// Owning team.
    pub team_id: TeamId,
}

impl NewProject {
    /// Trimmed name and normalized code.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` if the name is empty or the code malformed.
    pub fn validated(&self) -> Result<(String, String)> {
        let name = require_text("Project name", &self.name)?;
        let code = normalize_code(&self.code)?;
        Ok((name, code))
    }
}

/// Settings change for an existing project. `None` leaves a field alone.
#[derive(Debug, Clone, Default)]
pub struct ProjectUpdate {
    /// New name.
    pub name: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New status.
    pub status: Option<ProjectStatus>,
}

impl ProjectUpdate {
    /// Returns `true` if nothing would change.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.status.is_none()
    }
}

/// Trim and upper-case a project code, checking its length and alphabet.
///
/// # Errors
///
/// Returns `Error::Validation` for codes outside 2-10 ASCII alphanumerics.
pub fn normalize_code(code: &str) -> Result<String> {
    let code = code.trim().to_ascii_uppercase();
    if code.is_empty() {
        return Err(Error::Validation("Project code cannot be empty".to_string()));
    }
    if code.len() < MIN_CODE_LENGTH || code.len() > MAX_CODE_LENGTH {
        return Err(Error::Validation(format!(
            "Project code must be {MIN_CODE_LENGTH}-{MAX_CODE_LENGTH} characters, got '{code}'"
        )));
    }
    if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(Error::Validation(format!(
            "Project code may only contain letters and digits, got '{code}'"
        )));
    }
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::lowercase("web", "WEB")]
    #[case::padded("  api2 ", "API2")]
    #[case::minimum("ab", "AB")]
    #[case::maximum("abcdefghij", "ABCDEFGHIJ")]
    fn test_normalize_code_accepts(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize_code(input).unwrap(), expected);
    }

    #[rstest]
    #[case::empty("")]
    #[case::blank("   ")]
    #[case::too_short("w")]
    #[case::too_long("abcdefghijk")]
    #[case::punctuation("we-b")]
    #[case::non_ascii("ÑU")]
    fn test_normalize_code_rejects(#[case] input: &str) {
        assert!(matches!(normalize_code(input), Err(Error::Validation(_))));
    }

    #[test]
    fn test_next_ticket_uses_code_and_sequence() {
        let project = Project {
            id: ProjectId::new("web-0a1b"),
            name: "Web".to_string(),
            code: "WEB".to_string(),
            description: String::new(),
            team_id: TeamId::new("t1"),
            status: ProjectStatus::Active,
            last_ticket_sequence: 5,
            members: vec![UserId::new("ana")],
            roles: BTreeMap::from([(UserId::new("ana"), ProjectRole::Creator)]),
            created_by: UserId::new("ana"),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(project.next_ticket(), (6, TicketNumber::new("WEB", 6)));
        assert!(project.can_manage(&UserId::new("ana")));
        assert!(!project.can_manage(&UserId::new("ben")));

        let json = serde_json::to_value(&project).unwrap();
        assert_eq!(json["sigla"], "WEB");
    }

    #[test]
    fn test_only_creator_and_admin_manage() {
        assert!(ProjectRole::Creator.can_manage());
        assert!(ProjectRole::Admin.can_manage());
        assert!(!ProjectRole::Member.can_manage());
    }
}
