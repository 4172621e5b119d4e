//! CLI argument structs for all commands.
//!
//! Each top-level command has its own argument struct; grouped commands
//! carry a nested action enum the way `team` and `project` do.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

use super::types::{
    BackendArg, BugStatusArg, CategoryArg, PriorityArg, ProjectRoleArg, ProjectStatusArg,
    ResolutionArg, TeamRoleArg,
};
use super::validators::{parse_date, validate_code, validate_id, validate_title};

/// Arguments for the `init` command
#[derive(Parser, Debug, Clone)]
pub struct InitArgs {
    /// Document storage backend
    #[arg(short, long, value_enum, default_value = "jsonl")]
    pub backend: BackendArg,

    /// Suppress output messages
    #[arg(short, long)]
    pub quiet: bool,
}

// ============================================================================
// Users
// ============================================================================

/// Arguments for the `user` command
#[derive(Parser, Debug, Clone)]
pub struct UserArgs {
    /// User action
    #[command(subcommand)]
    pub action: UserAction,
}

/// Profile actions
#[derive(Subcommand, Debug, Clone)]
pub enum UserAction {
    /// Create or replace a user profile
    Add {
        /// User id
        #[arg(value_parser = validate_id)]
        id: String,

        /// Name shown on tickets and notifications
        #[arg(short, long)]
        name: String,

        /// Contact email
        #[arg(long)]
        email: Option<String>,

        /// Avatar URL
        #[arg(long)]
        photo_url: Option<String>,
    },

    /// Show a profile (defaults to the acting user)
    Show {
        /// User id
        #[arg(value_parser = validate_id)]
        id: Option<String>,
    },
}

// ============================================================================
// Teams
// ============================================================================

/// Arguments for the `team` command
#[derive(Parser, Debug, Clone)]
pub struct TeamArgs {
    /// Team action
    #[command(subcommand)]
    pub action: TeamAction,
}

/// Team actions
#[derive(Subcommand, Debug, Clone)]
pub enum TeamAction {
    /// Create a team owned by the acting user
    Create {
        /// Team name
        name: String,
    },

    /// List the acting user's teams
    List,

    /// Show a team and its members
    Show {
        /// Team id
        #[arg(value_parser = validate_id)]
        team: String,
    },

    /// Add a user to a team
    AddMember {
        /// Team id
        #[arg(value_parser = validate_id)]
        team: String,

        /// User id
        #[arg(value_parser = validate_id)]
        user: String,

        /// Role to grant
        #[arg(short, long, value_enum, default_value = "member")]
        role: TeamRoleArg,
    },

    /// Remove a user from a team
    RemoveMember {
        /// Team id
        #[arg(value_parser = validate_id)]
        team: String,

        /// User id
        #[arg(value_parser = validate_id)]
        user: String,
    },

    /// Change a member's role
    SetRole {
        /// Team id
        #[arg(value_parser = validate_id)]
        team: String,

        /// User id
        #[arg(value_parser = validate_id)]
        user: String,

        /// New role
        #[arg(value_enum)]
        role: TeamRoleArg,
    },
}

// ============================================================================
// Projects
// ============================================================================

/// Arguments for the `project` command
#[derive(Parser, Debug, Clone)]
pub struct ProjectArgs {
    /// Project action
    #[command(subcommand)]
    pub action: ProjectAction,
}

/// Project actions
#[derive(Subcommand, Debug, Clone)]
pub enum ProjectAction {
    /// Create a project inside a team
    Create {
        /// Owning team id
        #[arg(short, long, value_parser = validate_id)]
        team: String,

        /// Project name
        #[arg(short, long)]
        name: String,

        /// Ticket code, 2-10 letters or digits (e.g. WEB)
        #[arg(short, long, value_parser = validate_code)]
        code: String,

        /// Project description
        #[arg(short = 'D', long, default_value = "")]
        description: String,
    },

    /// List the acting user's projects in a team
    List {
        /// Team id
        #[arg(short, long, value_parser = validate_id)]
        team: String,
    },

    /// Show project details
    Show {
        /// Project id
        #[arg(value_parser = validate_id)]
        project: String,
    },

    /// Update project settings
    Update {
        /// Project id
        #[arg(value_parser = validate_id)]
        project: String,

        /// New name
        #[arg(short, long)]
        name: Option<String>,

        /// New description
        #[arg(short = 'D', long)]
        description: Option<String>,

        /// New lifecycle status
        #[arg(short, long, value_enum)]
        status: Option<ProjectStatusArg>,
    },

    /// Add a team member to the project
    AddMember {
        /// Project id
        #[arg(value_parser = validate_id)]
        project: String,

        /// User id
        #[arg(value_parser = validate_id)]
        user: String,

        /// Role to grant
        #[arg(short, long, value_enum, default_value = "member")]
        role: ProjectRoleArg,
    },

    /// Remove a member from the project
    RemoveMember {
        /// Project id
        #[arg(value_parser = validate_id)]
        project: String,

        /// User id
        #[arg(value_parser = validate_id)]
        user: String,
    },

    /// Change a member's role
    SetRole {
        /// Project id
        #[arg(value_parser = validate_id)]
        project: String,

        /// User id
        #[arg(value_parser = validate_id)]
        user: String,

        /// New role
        #[arg(value_enum)]
        role: ProjectRoleArg,
    },

    /// Delete a project with all its bugs, comments and attachments
    Delete {
        /// Project id
        #[arg(value_parser = validate_id)]
        project: String,

        /// Confirm the deletion
        #[arg(short, long)]
        force: bool,
    },
}

// ============================================================================
// Bugs
// ============================================================================

/// Arguments for the `bug` command
#[derive(Parser, Debug, Clone)]
pub struct BugArgs {
    /// Bug action
    #[command(subcommand)]
    pub action: BugAction,
}

/// Bug actions
#[derive(Subcommand, Debug, Clone)]
pub enum BugAction {
    /// Report a new bug; it receives the project's next ticket number
    Create {
        /// Project id
        #[arg(value_parser = validate_id)]
        project: String,

        /// Bug title (maximum 200 characters)
        #[arg(long, value_parser = validate_title)]
        title: String,

        /// Detailed description
        #[arg(short = 'D', long, default_value = "")]
        description: String,

        /// Bug category
        #[arg(short, long, value_enum, default_value = "bug")]
        category: CategoryArg,

        /// Priority (defaults to medium)
        #[arg(short, long, value_enum)]
        priority: Option<PriorityArg>,

        /// Assignee user id
        #[arg(short, long, value_parser = validate_id)]
        assignee: Option<String>,

        /// Files to attach
        #[arg(long = "attach")]
        attachments: Vec<PathBuf>,
    },

    /// List bugs of a project
    List {
        /// Project id
        #[arg(value_parser = validate_id)]
        project: String,

        /// Filter by status
        #[arg(short, long, value_enum)]
        status: Option<BugStatusArg>,

        /// Filter by assignee
        #[arg(short, long, value_parser = validate_id)]
        assignee: Option<String>,

        /// Filter by priority
        #[arg(short, long, value_enum)]
        priority: Option<PriorityArg>,

        /// Filter by category
        #[arg(short, long, value_enum)]
        category: Option<CategoryArg>,
    },

    /// Show a bug with its history and comments
    Show {
        /// Bug id
        #[arg(value_parser = validate_id)]
        bug: String,
    },

    /// Move a bug to a new status
    Status {
        /// Bug id
        #[arg(value_parser = validate_id)]
        bug: String,

        /// Target status
        #[arg(value_enum)]
        status: BugStatusArg,

        /// Status you expect the bug to have; defaults to its stored status
        #[arg(long, value_enum)]
        from: Option<BugStatusArg>,

        /// Resolution, required when moving to resolved
        #[arg(short, long, value_enum)]
        resolution: Option<ResolutionArg>,
    },

    /// Edit content (while open) or priority and assignee
    Edit {
        /// Bug id
        #[arg(value_parser = validate_id)]
        bug: String,

        /// New title
        #[arg(long, value_parser = validate_title)]
        title: Option<String>,

        /// New description
        #[arg(short = 'D', long)]
        description: Option<String>,

        /// New category
        #[arg(short, long, value_enum)]
        category: Option<CategoryArg>,

        /// New priority
        #[arg(short, long, value_enum)]
        priority: Option<PriorityArg>,

        /// New assignee
        #[arg(short, long, value_parser = validate_id, conflicts_with = "unassign")]
        assignee: Option<String>,

        /// Clear the assignee
        #[arg(long)]
        unassign: bool,
    },

    /// Attach a file to a bug
    Attach {
        /// Bug id
        #[arg(value_parser = validate_id)]
        bug: String,

        /// File to upload
        file: PathBuf,

        /// MIME type (guessed from the extension when omitted)
        #[arg(long)]
        mime: Option<String>,
    },

    /// Delete a bug with its history, comments and attachments
    Delete {
        /// Bug id
        #[arg(value_parser = validate_id)]
        bug: String,
    },

    /// Record a commit or change reference on several bugs
    Trace {
        /// Commit id or other change reference
        #[arg(short, long)]
        reference: String,

        /// Bug ids
        #[arg(required = true, value_parser = validate_id)]
        bugs: Vec<String>,
    },
}

// ============================================================================
// Comments
// ============================================================================

/// Arguments for the `comment` command
#[derive(Parser, Debug, Clone)]
pub struct CommentArgs {
    /// Comment action
    #[command(subcommand)]
    pub action: CommentAction,
}

/// Comment actions
#[derive(Subcommand, Debug, Clone)]
pub enum CommentAction {
    /// Comment on a bug
    Add {
        /// Bug id
        #[arg(value_parser = validate_id)]
        bug: String,

        /// Comment text
        #[arg(short, long)]
        text: Option<String>,

        /// Files to attach
        #[arg(long = "attach")]
        attachments: Vec<PathBuf>,
    },

    /// List a bug's comments
    List {
        /// Bug id
        #[arg(value_parser = validate_id)]
        bug: String,
    },
}

// ============================================================================
// Notifications
// ============================================================================

/// Arguments for the `notifications` command
#[derive(Parser, Debug, Clone)]
pub struct NotificationsArgs {
    /// Notification action
    #[command(subcommand)]
    pub action: NotificationsAction,
}

/// Inbox actions
#[derive(Subcommand, Debug, Clone)]
pub enum NotificationsAction {
    /// List the acting user's notifications, newest first
    List {
        /// Only unread notifications
        #[arg(short, long)]
        unread: bool,
    },

    /// Mark notifications as read
    Read {
        /// Notification id
        #[arg(value_parser = validate_id, required_unless_present = "all")]
        id: Option<String>,

        /// Mark every notification as read
        #[arg(long, conflicts_with = "id")]
        all: bool,
    },
}

// ============================================================================
// Reports
// ============================================================================

/// Arguments for the `report` command
#[derive(Parser, Debug, Clone)]
pub struct ReportArgs {
    /// Team id
    #[arg(short, long, value_parser = validate_id)]
    pub team: String,

    /// Restrict to one project
    #[arg(short, long, value_parser = validate_id)]
    pub project: Option<String>,

    /// Only bugs created at or after this date (YYYY-MM-DD or RFC 3339)
    #[arg(long, value_parser = parse_date)]
    pub from: Option<DateTime<Utc>>,

    /// Only bugs created at or before this date (YYYY-MM-DD or RFC 3339)
    #[arg(long, value_parser = parse_date)]
    pub to: Option<DateTime<Utc>>,
}
