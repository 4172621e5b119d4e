//! CLI argument parsing and command dispatch.
//!
//! This module provides the command-line interface for primebug using
//! clap's derive API. Every command other than `init` opens the workspace,
//! runs one service call as the acting user, then flushes notifications
//! and saves the store.
//!
//! # Global Flags
//!
//! - `--json`: Output in JSON format (applies to all commands)
//! - `--as <user>`: Acting user id, also read from `PRIMEBUG_USER`
//!
//! # Example
//!
//! ```bash
//! primebug --as alice team create "Core"
//! primebug --as alice project create --team core-xxxx --name "Web" --code WEB
//! primebug --as alice bug create web-a1b2 --title "Login fails" --priority high
//! primebug --as alice bug status <bug-id> in_progress
//! ```

mod args;
mod execute;
mod types;
mod validators;

use anyhow::Result;
use clap::{Parser, Subcommand};

// Re-export argument structs
pub use args::{
    BugAction, BugArgs, CommentAction, CommentArgs, InitArgs, NotificationsAction,
    NotificationsArgs, ProjectAction, ProjectArgs, ReportArgs, TeamAction, TeamArgs, UserAction,
    UserArgs,
};

// Re-export types
pub use types::{
    BackendArg, BugStatusArg, CategoryArg, PriorityArg, ProjectRoleArg, ProjectStatusArg,
    ResolutionArg, TeamRoleArg,
};

// Re-export validators for external use
pub use validators::{parse_date, validate_code, validate_id, validate_title};

/// Environment variable naming the acting user when `--as` is absent
pub const USER_ENV_VAR: &str = "PRIMEBUG_USER";

/// PrimeBug - a multi-tenant bug tracker
///
/// Teams own projects, projects own bugs with sequential ticket numbers
/// (WEB-1, WEB-2, ...). Data lives in `.primebug/` next to your project.
#[derive(Parser, Debug)]
#[command(name = "primebug")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output in JSON format for programmatic use
    #[arg(long, global = true)]
    pub json: bool,

    /// Act as this user id
    #[arg(long = "as", global = true, env = USER_ENV_VAR, value_name = "USER")]
    pub as_user: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Initialize a new primebug workspace
    ///
    /// Creates the `.primebug/` directory with configuration, an empty
    /// document snapshot and the attachment directory.
    Init(InitArgs),

    /// Manage user profiles
    User(UserArgs),

    /// Manage teams and their members
    Team(TeamArgs),

    /// Manage projects and their members
    Project(ProjectArgs),

    /// Report, triage and resolve bugs
    Bug(BugArgs),

    /// Comment on bugs
    Comment(CommentArgs),

    /// Read your notifications
    Notifications(NotificationsArgs),

    /// Summarize the bugs of a team
    ///
    /// Counts by status, priority, category and assignee across every
    /// project of the team you belong to.
    Report(ReportArgs),
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        <Self as Parser>::parse()
    }

    /// Parse CLI arguments from an iterator (for testing)
    pub fn try_parse_from<I, T>(iter: I) -> std::result::Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(iter)
    }

    /// Execute the CLI command
    pub async fn execute(&self) -> Result<()> {
        use crate::output::OutputMode;

        let output_mode = if self.json {
            OutputMode::Json
        } else {
            OutputMode::Text
        };

        let Some(command) = &self.command else {
            println!("PrimeBug bug tracker");
            println!("Use --help for more information");
            return Ok(());
        };
        let user = self.as_user.as_deref();

        let app = match command {
            Commands::Init(args) => return execute::execute_init(args).await,
            Commands::User(args) => {
                let app = open_workspace().await?;
                execute::execute_user(&app, user, args, output_mode).await?;
                app
            }
            Commands::Team(args) => {
                let app = open_workspace().await?;
                execute::execute_team(&app, user, args, output_mode).await?;
                app
            }
            Commands::Project(args) => {
                let app = open_workspace().await?;
                execute::execute_project(&app, user, args, output_mode).await?;
                app
            }
            Commands::Bug(args) => {
                let app = open_workspace().await?;
                execute::execute_bug(&app, user, args, output_mode).await?;
                app
            }
            Commands::Comment(args) => {
                let app = open_workspace().await?;
                execute::execute_comment(&app, user, args, output_mode).await?;
                app
            }
            Commands::Notifications(args) => {
                let app = open_workspace().await?;
                execute::execute_notifications(&app, user, args, output_mode).await?;
                app
            }
            Commands::Report(args) => {
                let app = open_workspace().await?;
                execute::execute_report(&app, user, args, output_mode).await?;
                app
            }
        };

        app.save().await?;
        Ok(())
    }
}

/// Open the workspace containing the current directory.
async fn open_workspace() -> Result<crate::app::App> {
    let app = crate::app::App::from_directory(&std::env::current_dir()?).await?;
    Ok(app)
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========== CLI Parsing Tests ==========

    #[test]
    fn test_parse_no_command() {
        let cli = Cli::try_parse_from(["primebug"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.json);
    }

    #[test]
    fn test_parse_init_defaults_to_jsonl() {
        let cli = Cli::try_parse_from(["primebug", "init"]).unwrap();
        match cli.command {
            Some(Commands::Init(args)) => {
                assert_eq!(args.backend, BackendArg::Jsonl);
                assert!(!args.quiet);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["primebug", "team", "list", "--json", "--as", "alice"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.as_user.as_deref(), Some("alice"));
    }

    #[test]
    fn test_parse_bug_create() {
        let cli = Cli::try_parse_from([
            "primebug",
            "bug",
            "create",
            "web-a1b2",
            "--title",
            "  Login fails ",
            "--priority",
            "high",
            "--category",
            "cross-cutting",
            "--assignee",
            "bob",
        ])
        .unwrap();

        let Some(Commands::Bug(BugArgs {
            action:
                BugAction::Create {
                    project,
                    title,
                    priority,
                    category,
                    assignee,
                    attachments,
                    ..
                },
        })) = cli.command
        else {
            panic!("expected bug create");
        };
        assert_eq!(project, "web-a1b2");
        assert_eq!(title, "Login fails");
        assert_eq!(priority, Some(PriorityArg::High));
        assert_eq!(category, CategoryArg::CrossCutting);
        assert_eq!(assignee.as_deref(), Some("bob"));
        assert!(attachments.is_empty());
    }

    #[test]
    fn test_parse_bug_create_rejects_blank_title() {
        let result = Cli::try_parse_from(["primebug", "bug", "create", "web", "--title", "  "]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_bug_status_with_resolution() {
        let cli = Cli::try_parse_from([
            "primebug",
            "bug",
            "status",
            "bug1",
            "resolved",
            "--from",
            "in-progress",
            "--resolution",
            "duplicate",
        ])
        .unwrap();

        let Some(Commands::Bug(BugArgs {
            action:
                BugAction::Status {
                    status,
                    from,
                    resolution,
                    ..
                },
        })) = cli.command
        else {
            panic!("expected bug status");
        };
        assert_eq!(status, BugStatusArg::Resolved);
        assert_eq!(from, Some(BugStatusArg::InProgress));
        assert_eq!(resolution, Some(ResolutionArg::Duplicate));
    }

    #[test]
    fn test_parse_bug_edit_assignee_conflicts_with_unassign() {
        let result = Cli::try_parse_from([
            "primebug",
            "bug",
            "edit",
            "bug1",
            "--assignee",
            "bob",
            "--unassign",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_bug_trace_requires_bugs() {
        assert!(Cli::try_parse_from(["primebug", "bug", "trace", "--reference", "abc123"]).is_err());

        let cli = Cli::try_parse_from([
            "primebug",
            "bug",
            "trace",
            "--reference",
            "abc123",
            "b1",
            "b2",
        ])
        .unwrap();
        let Some(Commands::Bug(BugArgs {
            action: BugAction::Trace { reference, bugs },
        })) = cli.command
        else {
            panic!("expected bug trace");
        };
        assert_eq!(reference, "abc123");
        assert_eq!(bugs, vec!["b1", "b2"]);
    }

    #[test]
    fn test_parse_project_create_normalizes_code() {
        let cli = Cli::try_parse_from([
            "primebug", "project", "create", "--team", "core", "--name", "Web", "--code", "web",
        ])
        .unwrap();
        let Some(Commands::Project(ProjectArgs {
            action: ProjectAction::Create { code, .. },
        })) = cli.command
        else {
            panic!("expected project create");
        };
        assert_eq!(code, "WEB");
    }

    #[test]
    fn test_parse_project_role_rejects_creator() {
        let result = Cli::try_parse_from([
            "primebug",
            "project",
            "add-member",
            "web",
            "bob",
            "--role",
            "creator",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_notifications_read_needs_id_or_all() {
        assert!(Cli::try_parse_from(["primebug", "notifications", "read"]).is_err());
        assert!(Cli::try_parse_from(["primebug", "notifications", "read", "--all"]).is_ok());
        assert!(Cli::try_parse_from(["primebug", "notifications", "read", "n1"]).is_ok());
    }

    #[test]
    fn test_parse_report_dates() {
        let cli = Cli::try_parse_from([
            "primebug",
            "report",
            "--team",
            "core",
            "--from",
            "2024-01-01",
        ])
        .unwrap();
        let Some(Commands::Report(args)) = cli.command else {
            panic!("expected report");
        };
        assert!(args.from.is_some());
        assert!(args.to.is_none());

        assert!(Cli::try_parse_from(["primebug", "report", "--team", "core", "--to", "soon"])
            .is_err());
    }
}
