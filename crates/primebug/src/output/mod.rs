//! Output formatting for CLI commands.
//!
//! Every printer comes in two flavors selected by [`OutputMode`]:
//! human-readable text (colored, wrapped to the terminal) and pretty JSON
//! for programmatic use.
//!
//! Submodules:
//! - [`color`]: Color and styling helpers (semantic colors, icons)

pub mod color;

use crate::domain::{ActivityEntry, Bug, Comment, Notification, Project, Team, UserProfile};
use crate::services::reports::BugSummary;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::env;
use std::fmt::Display;
use std::io::{self, Write};

pub use color::{error, info, success, warning};

use color::{
    accent, bold, colored_status_icon, colorize_id, colorize_priority, colorize_status, dimmed,
    unread_marker,
};

// ============================================================================
// Output Configuration
// ============================================================================

const DEFAULT_TERMINAL_WIDTH: u16 = 80;
const DEFAULT_MAX_CONTENT_WIDTH: usize = 80;
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Configuration for output formatting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputConfig {
    /// Maximum content width for text wrapping.
    pub max_width: usize,
    /// Whether to use ASCII-only icons instead of Unicode.
    pub use_ascii: bool,
    /// Whether to use colors in output.
    pub use_colors: bool,
}

impl OutputConfig {
    /// Create a new OutputConfig with explicit values.
    pub fn new(max_width: usize, use_ascii: bool, use_colors: bool) -> Self {
        Self {
            max_width,
            use_ascii,
            use_colors,
        }
    }

    /// Create an OutputConfig by reading from environment variables.
    ///
    /// Reads:
    /// - `PRIMEBUG_MAX_WIDTH`: Maximum content width (default: 80)
    /// - `PRIMEBUG_ASCII`: Set to "1" or "true" for ASCII-only icons (default: false)
    /// - `NO_COLOR`: Standard env var to disable colors (any value disables colors)
    /// - `PRIMEBUG_COLOR`: Set to "0" or "false" to disable colors (default: true)
    pub fn from_env() -> Self {
        let max_width = match env::var("PRIMEBUG_MAX_WIDTH") {
            Ok(s) if !s.is_empty() => match s.parse() {
                Ok(width) => width,
                Err(_) => {
                    tracing::warn!(
                        env_var = "PRIMEBUG_MAX_WIDTH",
                        value = %s,
                        default = DEFAULT_MAX_CONTENT_WIDTH,
                        "Invalid value, using default"
                    );
                    DEFAULT_MAX_CONTENT_WIDTH
                }
            },
            _ => DEFAULT_MAX_CONTENT_WIDTH,
        };

        let use_ascii = match env::var("PRIMEBUG_ASCII") {
            Ok(v) if v == "1" || v.eq_ignore_ascii_case("true") => true,
            Ok(v) if v == "0" || v.eq_ignore_ascii_case("false") || v.is_empty() => false,
            Ok(v) => {
                tracing::warn!(
                    env_var = "PRIMEBUG_ASCII",
                    value = %v,
                    "Invalid value (expected '1', 'true', '0', or 'false'), using default"
                );
                false
            }
            Err(_) => false,
        };

        // https://no-color.org/
        let use_colors = env::var("NO_COLOR").is_err()
            && env::var("PRIMEBUG_COLOR")
                .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
                .unwrap_or(true);

        Self {
            max_width,
            use_ascii,
            use_colors,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_MAX_CONTENT_WIDTH,
            use_ascii: false,
            use_colors: true,
        }
    }
}

/// Output format mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable text format
    Text,
    /// JSON format for programmatic use
    Json,
}

// ============================================================================
// Terminal Width Detection
// ============================================================================

/// Get the current terminal width, falling back to default if detection fails.
fn get_terminal_width() -> usize {
    terminal_size::terminal_size()
        .map(|(w, _)| w.0 as usize)
        .unwrap_or(DEFAULT_TERMINAL_WIDTH as usize)
}

fn content_width(config: &OutputConfig) -> usize {
    get_terminal_width().min(config.max_width)
}

/// Wrap text to fit within a given width, preserving existing line breaks.
fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    text.lines()
        .flat_map(|line| {
            if line.trim().is_empty() {
                vec![String::new()]
            } else {
                textwrap::wrap(line, max_width.max(1))
                    .into_iter()
                    .map(|s| s.into_owned())
                    .collect()
            }
        })
        .collect()
}

/// Print a text section with a bold title and wrapped, indented content.
fn print_text_section<W: Write>(
    w: &mut W,
    title: &str,
    content: &str,
    width: usize,
    config: &OutputConfig,
) -> io::Result<()> {
    if content.trim().is_empty() {
        return Ok(());
    }
    writeln!(w)?;
    writeln!(w, "{}:", bold(title, config))?;
    for line in wrap_text(content, width.saturating_sub(2)) {
        writeln!(w, "  {line}")?;
    }
    Ok(())
}

// ============================================================================
// Public Dispatch Functions
// ============================================================================

/// Run `text` against a locked stdout with the environment's config, or
/// print `value` as JSON.
fn dispatch<T, F>(value: &T, mode: OutputMode, text: F) -> io::Result<()>
where
    T: Serialize + ?Sized,
    F: FnOnce(&mut io::StdoutLock<'static>, &OutputConfig) -> io::Result<()>,
{
    match mode {
        OutputMode::Json => print_json(value),
        OutputMode::Text => {
            let mut handle = io::stdout().lock();
            text(&mut handle, &OutputConfig::from_env())
        }
    }
}

/// Print a bug summary line
pub fn print_bug(bug: &Bug, mode: OutputMode) -> io::Result<()> {
    dispatch(bug, mode, |w, config| print_bug_text(w, bug, config))
}

/// Print a list of bugs
pub fn print_bugs(bugs: &[Bug], mode: OutputMode) -> io::Result<()> {
    dispatch(bugs, mode, |w, config| print_bugs_text(w, bugs, config))
}

/// Print a bug with its history and comments (for `bug show`)
pub fn print_bug_details(
    bug: &Bug,
    activity: &[ActivityEntry],
    comments: &[Comment],
    mode: OutputMode,
) -> io::Result<()> {
    let value = json!({
        "bug": bug,
        "activity": activity,
        "comments": comments,
    });
    dispatch(&value, mode, |w, config| {
        print_bug_details_text(w, bug, activity, comments, config)
    })
}

/// Print a list of projects
pub fn print_projects(projects: &[Project], mode: OutputMode) -> io::Result<()> {
    dispatch(projects, mode, |w, config| {
        print_projects_text(w, projects, config)
    })
}

/// Print a project with its members
pub fn print_project_details(project: &Project, mode: OutputMode) -> io::Result<()> {
    dispatch(project, mode, |w, config| {
        print_project_details_text(w, project, config)
    })
}

/// Print a list of teams
pub fn print_teams(teams: &[Team], mode: OutputMode) -> io::Result<()> {
    dispatch(teams, mode, |w, config| print_teams_text(w, teams, config))
}

/// Print a team with its members
pub fn print_team_details(team: &Team, mode: OutputMode) -> io::Result<()> {
    dispatch(team, mode, |w, config| {
        print_team_details_text(w, team, config)
    })
}

/// Print a bug's comments
pub fn print_comments(comments: &[Comment], mode: OutputMode) -> io::Result<()> {
    dispatch(comments, mode, |w, config| {
        print_comments_text(w, comments, config)
    })
}

/// Print an inbox
pub fn print_notifications(notifications: &[Notification], mode: OutputMode) -> io::Result<()> {
    dispatch(notifications, mode, |w, config| {
        print_notifications_text(w, notifications, config)
    })
}

/// Print a user profile
pub fn print_profile(profile: &UserProfile, mode: OutputMode) -> io::Result<()> {
    dispatch(profile, mode, |w, config| {
        print_profile_text(w, profile, config)
    })
}

/// Print dashboard counts
pub fn print_summary(summary: &BugSummary, mode: OutputMode) -> io::Result<()> {
    dispatch(summary, mode, |w, config| {
        print_summary_text(w, summary, config)
    })
}

/// Print a simple message
pub fn print_message(msg: &str) -> io::Result<()> {
    let mut handle = io::stdout().lock();
    writeln!(handle, "{msg}")
}

/// Print a JSON-formatted result for any serializable value
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> io::Result<()> {
    let mut handle = io::stdout().lock();
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(handle, "{json}")
}

// ============================================================================
// Text Formatting
// ============================================================================

fn print_bug_text<W: Write>(w: &mut W, bug: &Bug, config: &OutputConfig) -> io::Result<()> {
    writeln!(
        w,
        "{} {} {}  {}",
        colored_status_icon(bug.status, config),
        colorize_id(bug.ticket_number.as_str(), config),
        colorize_priority(bug.priority, config),
        bug.title
    )?;
    writeln!(w, "  {} {}", dimmed("Id:", config), bug.id)?;
    if let Some(assignee) = bug.assigned_to() {
        writeln!(w, "  {} {}", dimmed("Assignee:", config), assignee)?;
    }
    Ok(())
}

fn print_bugs_text<W: Write>(w: &mut W, bugs: &[Bug], config: &OutputConfig) -> io::Result<()> {
    if bugs.is_empty() {
        writeln!(w, "No bugs found.")?;
        return Ok(());
    }

    writeln!(w, "Found {} bug(s):", bugs.len())?;
    writeln!(w)?;

    for bug in bugs {
        writeln!(
            w,
            "{} {}  {}  {}  {}  {}",
            colored_status_icon(bug.status, config),
            colorize_id(bug.ticket_number.as_str(), config),
            accent(&bug.category.to_string(), config),
            colorize_priority(bug.priority, config),
            bug.title,
            dimmed(&format!("({})", bug.id), config)
        )?;
    }

    Ok(())
}

fn print_bug_details_text<W: Write>(
    w: &mut W,
    bug: &Bug,
    activity: &[ActivityEntry],
    comments: &[Comment],
    config: &OutputConfig,
) -> io::Result<()> {
    let width = content_width(config);

    writeln!(
        w,
        "{} {}: {}",
        colored_status_icon(bug.status, config),
        colorize_id(bug.ticket_number.as_str(), config),
        bug.title
    )?;
    writeln!(
        w,
        "{}  {}    {}  {}    {}  {}",
        dimmed("Status:", config),
        colorize_status(bug.status, config),
        dimmed("Priority:", config),
        colorize_priority(bug.priority, config),
        dimmed("Category:", config),
        accent(&bug.category.to_string(), config)
    )?;
    writeln!(w, "{} {}", dimmed("Id:", config), bug.id)?;
    writeln!(w, "{} {}", dimmed("Project:", config), bug.project_id)?;
    writeln!(w, "{} {}", dimmed("Reporter:", config), bug.created_by)?;
    if let Some(assignee) = bug.assigned_to() {
        writeln!(w, "{} {}", dimmed("Assignee:", config), assignee)?;
    }
    if let Some(resolution) = bug.resolution {
        writeln!(w, "{} {}", dimmed("Resolution:", config), resolution)?;
    }
    if let Some(reference) = &bug.commit_reference {
        writeln!(w, "{} {}", dimmed("Commit:", config), reference)?;
    }
    writeln!(
        w,
        "{} {}    {} {}",
        dimmed("Created:", config),
        bug.created_at.format(TIMESTAMP_FORMAT),
        dimmed("Updated:", config),
        bug.updated_at.format(TIMESTAMP_FORMAT)
    )?;

    print_text_section(w, "Description", &bug.description, width, config)?;

    if !bug.attachments.is_empty() {
        writeln!(w)?;
        writeln!(
            w,
            "{} ({}):",
            bold("Attachments", config),
            bug.attachments.len()
        )?;
        for attachment in &bug.attachments {
            writeln!(
                w,
                "  {} {}",
                attachment.name,
                dimmed(&format!("({} bytes, {})", attachment.size, attachment.mime_type), config)
            )?;
        }
    }

    if !activity.is_empty() {
        writeln!(w)?;
        writeln!(w, "{} ({}):", bold("History", config), activity.len())?;
        for entry in activity {
            writeln!(
                w,
                "  {} {} {}",
                dimmed(&entry.timestamp.format(TIMESTAMP_FORMAT).to_string(), config),
                entry.description,
                dimmed(&format!("- {}", entry.actor.display_name), config)
            )?;
        }
    }

    if !comments.is_empty() {
        writeln!(w)?;
        writeln!(w, "{} ({}):", bold("Comments", config), comments.len())?;
        write_comments(w, comments, width, config)?;
    }

    Ok(())
}

fn write_comments<W: Write>(
    w: &mut W,
    comments: &[Comment],
    width: usize,
    config: &OutputConfig,
) -> io::Result<()> {
    for comment in comments {
        let author = if comment.system {
            format!("{} (system)", comment.author.display_name)
        } else {
            comment.author.display_name.clone()
        };
        writeln!(
            w,
            "  {} {}",
            bold(&author, config),
            dimmed(&comment.created_at.format(TIMESTAMP_FORMAT).to_string(), config)
        )?;
        if let Some(text) = &comment.text {
            for line in wrap_text(text, width.saturating_sub(4)) {
                writeln!(w, "    {line}")?;
            }
        }
        for attachment in &comment.attachments {
            writeln!(w, "    {} {}", dimmed("Attachment:", config), attachment.name)?;
        }
    }
    Ok(())
}

fn print_comments_text<W: Write>(
    w: &mut W,
    comments: &[Comment],
    config: &OutputConfig,
) -> io::Result<()> {
    if comments.is_empty() {
        writeln!(w, "No comments yet.")?;
        return Ok(());
    }
    write_comments(w, comments, content_width(config), config)
}

fn print_projects_text<W: Write>(
    w: &mut W,
    projects: &[Project],
    config: &OutputConfig,
) -> io::Result<()> {
    if projects.is_empty() {
        writeln!(w, "No projects found.")?;
        return Ok(());
    }

    writeln!(w, "Found {} project(s):", projects.len())?;
    writeln!(w)?;

    for project in projects {
        writeln!(
            w,
            "{}  {}  {}  {}",
            colorize_id(&project.code, config),
            project.name,
            accent(&project.status.to_string(), config),
            dimmed(&format!("({})", project.id), config)
        )?;
    }
    Ok(())
}

fn print_project_details_text<W: Write>(
    w: &mut W,
    project: &Project,
    config: &OutputConfig,
) -> io::Result<()> {
    writeln!(
        w,
        "{}: {}",
        colorize_id(&project.code, config),
        project.name
    )?;
    writeln!(w, "{} {}", dimmed("Id:", config), project.id)?;
    writeln!(w, "{} {}", dimmed("Team:", config), project.team_id)?;
    writeln!(
        w,
        "{} {}    {} {}",
        dimmed("Status:", config),
        accent(&project.status.to_string(), config),
        dimmed("Tickets issued:", config),
        project.last_ticket_sequence
    )?;
    print_text_section(
        w,
        "Description",
        &project.description,
        content_width(config),
        config,
    )?;
    write_members(
        w,
        project
            .members
            .iter()
            .map(|m| (m, project.role_of(m).map(|r| r.to_string()))),
        project.members.len(),
        config,
    )
}

fn print_teams_text<W: Write>(w: &mut W, teams: &[Team], config: &OutputConfig) -> io::Result<()> {
    if teams.is_empty() {
        writeln!(w, "No teams found.")?;
        return Ok(());
    }
    for team in teams {
        writeln!(
            w,
            "{}  {}  {}",
            colorize_id(team.id.as_str(), config),
            team.name,
            dimmed(&format!("{} member(s)", team.members.len()), config)
        )?;
    }
    Ok(())
}

fn print_team_details_text<W: Write>(
    w: &mut W,
    team: &Team,
    config: &OutputConfig,
) -> io::Result<()> {
    writeln!(w, "{}: {}", colorize_id(team.id.as_str(), config), team.name)?;
    writeln!(
        w,
        "{} {}",
        dimmed("Created:", config),
        team.created_at.format(TIMESTAMP_FORMAT)
    )?;
    write_members(
        w,
        team.members
            .iter()
            .map(|m| (m, team.role_of(m).map(|r| r.to_string()))),
        team.members.len(),
        config,
    )
}

fn write_members<'a, W, I, D>(
    w: &mut W,
    members: I,
    count: usize,
    config: &OutputConfig,
) -> io::Result<()>
where
    W: Write,
    I: Iterator<Item = (&'a D, Option<String>)>,
    D: Display + 'a,
{
    writeln!(w)?;
    writeln!(w, "{} ({count}):", bold("Members", config))?;
    for (member, role) in members {
        let role = role.unwrap_or_else(|| "-".to_string());
        writeln!(w, "  {member}  {}", accent(&role, config))?;
    }
    Ok(())
}

fn print_notifications_text<W: Write>(
    w: &mut W,
    notifications: &[Notification],
    config: &OutputConfig,
) -> io::Result<()> {
    if notifications.is_empty() {
        writeln!(w, "No notifications.")?;
        return Ok(());
    }
    for notification in notifications {
        writeln!(
            w,
            "{} {}  {}  {}",
            unread_marker(notification.read, config),
            dimmed(
                &notification.created_at.format(TIMESTAMP_FORMAT).to_string(),
                config
            ),
            bold(&notification.title, config),
            dimmed(&format!("({})", notification.id), config)
        )?;
        writeln!(
            w,
            "    {} {}",
            notification.message,
            dimmed(&format!("- {}", notification.sender_name), config)
        )?;
    }
    Ok(())
}

fn print_profile_text<W: Write>(
    w: &mut W,
    profile: &UserProfile,
    config: &OutputConfig,
) -> io::Result<()> {
    writeln!(
        w,
        "{} {}",
        colorize_id(profile.id.as_str(), config),
        profile.display_name
    )?;
    if let Some(email) = &profile.email {
        writeln!(w, "  {} {}", dimmed("Email:", config), email)?;
    }
    if let Some(photo) = &profile.photo_url {
        writeln!(w, "  {} {}", dimmed("Photo:", config), photo)?;
    }
    Ok(())
}

fn print_summary_text<W: Write>(
    w: &mut W,
    summary: &BugSummary,
    config: &OutputConfig,
) -> io::Result<()> {
    writeln!(
        w,
        "{} {} total, {} resolved, {} open critical",
        bold("Bugs:", config),
        summary.total,
        summary.resolved,
        summary.open_critical
    )?;
    write_counts(w, "By status", &summary.by_status, config)?;
    write_counts(w, "By priority", &summary.by_priority, config)?;
    write_counts(w, "By category", &summary.by_category, config)?;
    write_counts(w, "By assignee", &summary.by_assignee, config)
}

fn write_counts<W: Write, K: Display>(
    w: &mut W,
    title: &str,
    counts: &BTreeMap<K, usize>,
    config: &OutputConfig,
) -> io::Result<()> {
    if counts.is_empty() {
        return Ok(());
    }
    writeln!(w)?;
    writeln!(w, "{}:", bold(title, config))?;
    for (key, count) in counts {
        writeln!(w, "  {:<16} {count}", key.to_string())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        Actor, BugId, BugStatus, Category, CommentId, Priority, ProjectId, TicketNumber, UserId,
    };
    use chrono::Utc;

    fn plain() -> OutputConfig {
        OutputConfig::new(80, true, false)
    }

    fn render<F>(f: F) -> String
    where
        F: FnOnce(&mut Vec<u8>) -> io::Result<()>,
    {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    fn test_bug() -> Bug {
        let now = Utc::now();
        Bug {
            id: BugId::new("bug123"),
            project_id: ProjectId::new("web-a1b2"),
            ticket_number: TicketNumber::new("WEB", 6),
            title: "Login fails".to_string(),
            description: "Steps to reproduce".to_string(),
            category: Category::Bug,
            priority: Priority::High,
            status: BugStatus::InProgress,
            resolution: None,
            assignee: Some(UserId::new("bob")),
            created_by: UserId::new("alice"),
            attachments: vec![],
            commit_reference: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_wrap_text_preserves_blank_lines() {
        let lines = wrap_text("first paragraph\n\nsecond", 80);
        assert_eq!(lines, vec!["first paragraph", "", "second"]);
    }

    #[test]
    fn test_wrap_text_breaks_long_lines() {
        let lines = wrap_text("one two three four five", 10);
        assert!(lines.len() > 1);
        assert!(lines.iter().all(|l| l.len() <= 10));
    }

    #[test]
    fn test_print_bugs_text_empty() {
        let out = render(|w| print_bugs_text(w, &[], &plain()));
        assert_eq!(out, "No bugs found.\n");
    }

    #[test]
    fn test_print_bugs_text_lists_ticket_numbers() {
        let out = render(|w| print_bugs_text(w, &[test_bug()], &plain()));
        assert!(out.contains("Found 1 bug(s):"));
        assert!(out.contains("> WEB-6"));
        assert!(out.contains("Login fails"));
        assert!(out.contains("(bug123)"));
        assert!(!out.contains("\x1b["));
    }

    #[test]
    fn test_print_bug_details_text_sections() {
        let bug = test_bug();
        let comment = Comment {
            id: CommentId::new("c1"),
            bug_id: bug.id.clone(),
            project_id: bug.project_id.clone(),
            text: Some("Closed by Alice on 2024-01-01".to_string()),
            attachments: vec![],
            author: Actor {
                id: UserId::new("alice"),
                display_name: "Alice".to_string(),
            },
            system: true,
            created_at: Utc::now(),
        };
        let out = render(|w| print_bug_details_text(w, &bug, &[], &[comment], &plain()));

        assert!(out.starts_with("> WEB-6: Login fails"));
        assert!(out.contains("Status:  InProgress"));
        assert!(out.contains("Assignee: bob"));
        assert!(out.contains("Description:"));
        assert!(out.contains("Comments (1):"));
        assert!(out.contains("Alice (system)"));
        assert!(!out.contains("History"));
    }

    #[test]
    fn test_print_summary_text() {
        let mut summary = BugSummary {
            total: 2,
            resolved: 1,
            ..BugSummary::default()
        };
        summary.by_status.insert(BugStatus::Open, 1);
        summary.by_status.insert(BugStatus::Resolved, 1);

        let out = render(|w| print_summary_text(w, &summary, &plain()));
        assert!(out.contains("2 total, 1 resolved, 0 open critical"));
        assert!(out.contains("By status:"));
        assert!(out.contains("Resolved"));
        assert!(!out.contains("By priority:"));
    }

    #[test]
    fn test_output_config_default() {
        let config = OutputConfig::default();
        assert_eq!(config.max_width, 80);
        assert!(!config.use_ascii);
        assert!(config.use_colors);
    }
}
