//! Color and styling helpers for CLI output.
//!
//! Semantic Color Theme:
//!   - Success/Done:   green   (resolved and closed bugs, completed actions)
//!   - Warning/Active: yellow  (in-progress bugs, high priority)
//!   - Error/Alert:    red     (reopened bugs, critical priority)
//!   - Info/Reference: cyan    (ids and ticket numbers)
//!   - Accent:         magenta (categories, roles)
//!   - Muted:          dimmed  (field labels, low priority, read notifications)
//!   - Emphasis:       bold    (section headers)

use crate::domain::{BugStatus, Priority};
use colored::Colorize;

use super::OutputConfig;

/// Apply semantic "success" color (green) to text.
pub fn success(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.green().to_string()
}

/// Apply semantic "error" color (red) to text.
pub fn error(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.red().to_string()
}

/// Apply semantic "warning" color (yellow) to text.
pub fn warning(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.yellow().to_string()
}

/// Apply semantic "info" color (cyan) to text.
pub fn info(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.cyan().to_string()
}

/// Apply color to status text based on bug status.
pub(crate) fn colorize_status(status: BugStatus, config: &OutputConfig) -> String {
    let text = status.to_string();
    if !config.use_colors {
        return text;
    }
    match status {
        BugStatus::Open => text.white().to_string(),
        BugStatus::InProgress => text.yellow().to_string(),
        BugStatus::Resolved => text.green().to_string(),
        BugStatus::Closed => text.green().dimmed().to_string(),
        BugStatus::Reopened => text.red().to_string(),
    }
}

/// Apply color to priority text based on priority level.
pub(crate) fn colorize_priority(priority: Priority, config: &OutputConfig) -> String {
    let text = priority.to_string();
    if !config.use_colors {
        return text;
    }
    match priority {
        Priority::Critical => text.red().bold().to_string(),
        Priority::High => text.yellow().to_string(),
        Priority::Medium => text,
        Priority::Low => text.dimmed().to_string(),
    }
}

/// Colorize an id or ticket number (cyan).
pub(crate) fn colorize_id(id: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return id.to_string();
    }
    id.cyan().to_string()
}

/// Get a colored status icon, with ASCII fallback support.
pub(crate) fn colored_status_icon(status: BugStatus, config: &OutputConfig) -> String {
    let icon = if config.use_ascii {
        match status {
            BugStatus::Open => "o",
            BugStatus::InProgress => ">",
            BugStatus::Resolved => "+",
            BugStatus::Closed => "#",
            BugStatus::Reopened => "!",
        }
    } else {
        match status {
            BugStatus::Open => "○",
            BugStatus::InProgress => "▶",
            BugStatus::Resolved => "✓",
            BugStatus::Closed => "■",
            BugStatus::Reopened => "↺",
        }
    };

    if !config.use_colors {
        return icon.to_string();
    }

    match status {
        BugStatus::Open => icon.white().to_string(),
        BugStatus::InProgress => icon.yellow().to_string(),
        BugStatus::Resolved => icon.green().to_string(),
        BugStatus::Closed => icon.green().dimmed().to_string(),
        BugStatus::Reopened => icon.red().to_string(),
    }
}

/// Apply dimmed style to text (for labels/field names).
pub(crate) fn dimmed(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.dimmed().to_string()
}

/// Apply bold style to text (for section headers).
pub(crate) fn bold(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.bold().to_string()
}

/// Apply magenta to text (for categories and roles).
pub(crate) fn accent(text: &str, config: &OutputConfig) -> String {
    if !config.use_colors {
        return text.to_string();
    }
    text.magenta().to_string()
}

/// Marker for unread notifications.
pub(crate) fn unread_marker(read: bool, config: &OutputConfig) -> String {
    let marker = match (read, config.use_ascii) {
        (true, _) => " ",
        (false, true) => "*",
        (false, false) => "•",
    };
    if read || !config.use_colors {
        return marker.to_string();
    }
    marker.yellow().bold().to_string()
}
