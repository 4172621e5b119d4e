use super::{TeamId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Role of a user inside a team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TeamRole {
    /// May manage team membership.
    Owner,
    /// Regular member.
    Member,
}

impl fmt::Display for TeamRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TeamRole::Owner => write!(f, "Owner"),
            TeamRole::Member => write!(f, "Member"),
        }
    }
}

impl FromStr for TeamRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "owner" => Ok(TeamRole::Owner),
            "member" => Ok(TeamRole::Member),
            _ => Err(format!("Invalid team role: '{s}'. Must be owner or member")),
        }
    }
}

/// A team: the tenant that owns projects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    /// Team id.
    pub id: TeamId,

    /// Team name.
    pub name: String,

    /// Member ids; kept as an array for membership queries.
    #[serde(default)]
    pub members: Vec<UserId>,

    /// Role per member.
    #[serde(default)]
    pub roles: BTreeMap<UserId, TeamRole>,

    /// User that created the team.
    pub created_by: UserId,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Team {
    /// Whether `user` belongs to the team.
    #[must_use]
    pub fn is_member(&self, user: &UserId) -> bool {
        self.members.contains(user)
    }

    /// Role of `user`, if a member.
    #[must_use]
    pub fn role_of(&self, user: &UserId) -> Option<TeamRole> {
        self.roles.get(user).copied()
    }

    /// Whether `user` is an owner.
    #[must_use]
    pub fn is_owner(&self, user: &UserId) -> bool {
        self.role_of(user) == Some(TeamRole::Owner)
    }

    /// Number of owners.
    #[must_use]
    pub fn owner_count(&self) -> usize {
        self.roles
            .values()
            .filter(|role| **role == TeamRole::Owner)
            .count()
    }
}
