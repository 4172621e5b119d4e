//! Domain types for the bug tracker.
//!
//! Every persisted entity is a typed record with explicit optional fields
//! and explicit defaults (e.g. attachments default to an empty list), so
//! documents written by older versions still decode.
//!
//! Field names marked with `serde(rename)` keep compatibility with the
//! document shapes already stored (`proyecto_id`, `numero_bug`, ...).

mod activity;
mod bug;
mod comment;
mod notification;
mod project;
mod status;
mod team;
mod user;

pub use activity::{ActivityEntry, ActivityKind};
pub use bug::{
    Attachment, Bug, BugEdit, BugFilter, Category, NewBug, Priority, TicketNumber,
    MAX_DESCRIPTION_LENGTH, MAX_TITLE_LENGTH,
};
pub(crate) use bug::{validate_description, validate_title};
pub use comment::{Comment, NewComment};
pub use notification::{Notification, NotificationIntent, NotificationKind};
pub use project::{
    normalize_code, NewProject, Project, ProjectRole, ProjectStatus, ProjectUpdate,
    MAX_CODE_LENGTH, MIN_CODE_LENGTH,
};
pub use status::{BugStatus, Resolution};
pub use team::{Team, TeamRole};
pub use user::{ActingUser, Actor, UserProfile};

/// Collection names in the document store.
pub mod collections {
    /// User display profiles.
    pub const PROFILES: &str = "profiles";
    /// Teams.
    pub const TEAMS: &str = "teams";
    /// Projects.
    pub const PROJECTS: &str = "projects";
    /// Bugs (tickets).
    pub const BUGS: &str = "bugs";
    /// Append-only bug activity log.
    pub const ACTIVITY: &str = "activity";
    /// Bug comments.
    pub const COMMENTS: &str = "comments";
    /// Notification inbox rows.
    pub const NOTIFICATIONS: &str = "notifications";
}

/// Defines a string-backed identifier with the usual conversions and a
/// `key()` addressing its document.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $collection:expr) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Wrap an existing identifier.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// The identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Address of the document this id names.
            #[must_use]
            pub fn key(&self) -> primebug_docstore::DocKey {
                primebug_docstore::DocKey::new($collection, self.0.clone())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(
    /// Opaque user identifier issued by the authentication provider.
    UserId,
    collections::PROFILES
);
string_id!(
    /// Team identifier.
    TeamId,
    collections::TEAMS
);
string_id!(
    /// Project slug, globally unique.
    ProjectId,
    collections::PROJECTS
);
string_id!(
    /// System-generated bug document id.
    BugId,
    collections::BUGS
);
string_id!(
    /// Activity entry id.
    ActivityId,
    collections::ACTIVITY
);
string_id!(
    /// Comment id.
    CommentId,
    collections::COMMENTS
);
string_id!(
    /// Notification id.
    NotificationId,
    collections::NOTIFICATIONS
);

impl UserId {
    /// Returns `true` for the empty id (e.g. an unassigned slot).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

/// Trim `value` and reject it if nothing remains.
pub(crate) fn require_text(field: &str, value: &str) -> crate::error::Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(crate::error::Error::Validation(format!(
            "{field} cannot be empty"
        )));
    }
    Ok(trimmed.to_string())
}
