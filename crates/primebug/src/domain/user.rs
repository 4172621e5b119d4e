use super::UserId;
use serde::{Deserialize, Serialize};

/// Display profile resolved from an opaque user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Identity issued by the authentication provider.
    pub id: UserId,

    /// Name shown in activity logs and notifications.
    pub display_name: String,

    /// Contact address (optional)
    #[serde(default)]
    pub email: Option<String>,

    /// Avatar URL (optional)
    #[serde(default)]
    pub photo_url: Option<String>,
}

/// The authenticated identity performing a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActingUser {
    /// User id.
    pub id: UserId,
    /// Display name at the time of the call.
    pub display_name: String,
}

impl ActingUser {
    /// Build an acting user from an id and a display name.
    pub fn new(id: impl Into<UserId>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }

    /// The actor snapshot recorded on audit rows.
    #[must_use]
    pub fn actor(&self) -> Actor {
        Actor {
            id: self.id.clone(),
            display_name: self.display_name.clone(),
        }
    }
}

impl From<&UserProfile> for ActingUser {
    fn from(profile: &UserProfile) -> Self {
        Self {
            id: profile.id.clone(),
            display_name: profile.display_name.clone(),
        }
    }
}

/// Who performed a recorded action, frozen at the time it happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// User id.
    pub id: UserId,
    /// Display name.
    pub display_name: String,
}
