//! Command execution logic.
//!
//! This module contains the implementation of all CLI commands. Each
//! `execute_*` function runs against an opened [`App`]; flushing
//! notifications and saving happen in the caller.

use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::Utc;

use super::args::{
    BugAction, BugArgs, CommentAction, CommentArgs, InitArgs, NotificationsAction,
    NotificationsArgs, ProjectAction, ProjectArgs, ReportArgs, TeamAction, TeamArgs, UserAction,
    UserArgs,
};
use super::USER_ENV_VAR;
use crate::app::App;
use crate::blob::BlobKind;
use crate::domain::{
    ActingUser, BugEdit, BugFilter, BugId, BugStatus, NewBug, NewComment, NewProject,
    NotificationId, ProjectId, ProjectUpdate, TeamId, UserId, UserProfile,
};
use crate::output::{self, OutputConfig, OutputMode};
use crate::services::reports::ReportFilter;
use crate::services::{
    attachments, bugs, comments, notifications, profiles, projects, reports, teams, traceability,
};

/// Resolve the acting user from `--as` / `PRIMEBUG_USER`.
///
/// The display name comes from the user's profile, falling back to the id.
async fn acting_user(app: &App, user: Option<&str>) -> Result<ActingUser> {
    let Some(id) = user.map(str::trim).filter(|id| !id.is_empty()) else {
        bail!("No acting user. Pass --as <user> or set {USER_ENV_VAR}");
    };
    let id = UserId::new(id);
    let name = profiles::display_name(app.backend(), &id).await?;
    Ok(ActingUser::new(id, name))
}

/// Print `value` as JSON or `message` as colored text.
fn report<T: serde::Serialize + ?Sized>(
    value: &T,
    message: &str,
    output_mode: OutputMode,
) -> Result<()> {
    match output_mode {
        OutputMode::Json => output::print_json(value)?,
        OutputMode::Text => {
            let config = OutputConfig::from_env();
            output::print_message(&output::success(message, &config))?;
        }
    }
    Ok(())
}

/// Read an attachment from disk: (file name, MIME type, bytes).
async fn read_upload(path: &Path, mime: Option<&str>) -> Result<(String, String, Vec<u8>)> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Invalid file name: {}", path.display()))?
        .to_string();
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let mime = mime.map_or_else(|| guess_mime(path).to_string(), ToString::to_string);
    Ok((file_name, mime, bytes))
}

fn guess_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("pdf") => "application/pdf",
        Some("txt" | "log") => "text/plain",
        Some("json") => "application/json",
        Some("csv") => "text/csv",
        Some("zip") => "application/zip",
        _ => "application/octet-stream",
    }
}

/// Execute the init command
pub async fn execute_init(args: &InitArgs) -> Result<()> {
    use crate::commands::init;

    let current_dir = std::env::current_dir()?;
    let result = init::init(&current_dir, args.backend.into()).await?;

    if !args.quiet {
        println!(
            "Initialized primebug in {}",
            result.primebug_dir.display()
        );
        println!("  Config: {}", result.config_file.display());
        if let Some(data_file) = &result.data_file {
            println!("  Documents: {}", data_file.display());
        }
        println!("  Attachments: {}", result.blob_dir.display());
    }

    Ok(())
}

/// Execute the user command
pub async fn execute_user(
    app: &App,
    user: Option<&str>,
    args: &UserArgs,
    output_mode: OutputMode,
) -> Result<()> {
    match &args.action {
        UserAction::Add {
            id,
            name,
            email,
            photo_url,
        } => {
            let profile = profiles::upsert_profile(
                app.backend(),
                UserProfile {
                    id: UserId::new(id.as_str()),
                    display_name: name.clone(),
                    email: email.clone(),
                    photo_url: photo_url.clone(),
                },
            )
            .await?;
            report(
                &profile,
                &format!("Saved profile {} ({})", profile.id, profile.display_name),
                output_mode,
            )
        }
        UserAction::Show { id } => {
            let id = match id {
                Some(id) => UserId::new(id.as_str()),
                None => acting_user(app, user).await?.id,
            };
            let profile = profiles::get_profile(app.backend(), &id).await?;
            output::print_profile(&profile, output_mode)?;
            Ok(())
        }
    }
}

/// Execute the team command
pub async fn execute_team(
    app: &App,
    user: Option<&str>,
    args: &TeamArgs,
    output_mode: OutputMode,
) -> Result<()> {
    let actor = acting_user(app, user).await?;
    let backend = app.backend();

    match &args.action {
        TeamAction::Create { name } => {
            let team = teams::create_team(backend, name, &actor).await?;
            report(
                &team,
                &format!("Created team {} ({})", team.name, team.id),
                output_mode,
            )
        }
        TeamAction::List => {
            let teams = teams::get_teams_for_user(backend, &actor.id).await?;
            output::print_teams(&teams, output_mode)?;
            Ok(())
        }
        TeamAction::Show { team } => {
            let team = teams::get_team(backend, &TeamId::new(team.as_str())).await?;
            output::print_team_details(&team, output_mode)?;
            Ok(())
        }
        TeamAction::AddMember { team, user, role } => {
            let user = UserId::new(user.as_str());
            let team =
                teams::add_member(backend, &TeamId::new(team.as_str()), &user, (*role).into(), &actor)
                    .await?;
            report(
                &team,
                &format!("Added {user} to {}", team.name),
                output_mode,
            )
        }
        TeamAction::RemoveMember { team, user } => {
            let user = UserId::new(user.as_str());
            let team =
                teams::remove_member(backend, &TeamId::new(team.as_str()), &user, &actor).await?;
            report(
                &team,
                &format!("Removed {user} from {}", team.name),
                output_mode,
            )
        }
        TeamAction::SetRole { team, user, role } => {
            let user = UserId::new(user.as_str());
            let team = teams::set_member_role(
                backend,
                &TeamId::new(team.as_str()),
                &user,
                (*role).into(),
                &actor,
            )
            .await?;
            report(
                &team,
                &format!("{user} is now {} of {}", crate::domain::TeamRole::from(*role), team.name),
                output_mode,
            )
        }
    }
}

/// Execute the project command
pub async fn execute_project(
    app: &App,
    user: Option<&str>,
    args: &ProjectArgs,
    output_mode: OutputMode,
) -> Result<()> {
    let actor = acting_user(app, user).await?;
    let backend = app.backend();

    match &args.action {
        ProjectAction::Create {
            team,
            name,
            code,
            description,
        } => {
            let new = NewProject {
                name: name.clone(),
                code: code.clone(),
                description: description.clone(),
                team_id: TeamId::new(team.as_str()),
            };
            let project = projects::create_project(backend, new, &actor).await?;
            report(
                &project,
                &format!(
                    "Created project {} [{}] ({})",
                    project.name, project.code, project.id
                ),
                output_mode,
            )
        }
        ProjectAction::List { team } => {
            let projects =
                projects::get_projects_for_user(backend, &TeamId::new(team.as_str()), &actor.id)
                    .await?;
            output::print_projects(&projects, output_mode)?;
            Ok(())
        }
        ProjectAction::Show { project } => {
            let project = projects::get_project(backend, &ProjectId::new(project.as_str())).await?;
            output::print_project_details(&project, output_mode)?;
            Ok(())
        }
        ProjectAction::Update {
            project,
            name,
            description,
            status,
        } => {
            let update = ProjectUpdate {
                name: name.clone(),
                description: description.clone(),
                status: status.map(Into::into),
            };
            let project =
                projects::update_project(backend, &ProjectId::new(project.as_str()), update, &actor)
                    .await?;
            report(
                &project,
                &format!("Updated project {}", project.id),
                output_mode,
            )
        }
        ProjectAction::AddMember {
            project,
            user,
            role,
        } => {
            let user = UserId::new(user.as_str());
            let project = projects::add_member(
                backend,
                &ProjectId::new(project.as_str()),
                &user,
                (*role).into(),
                &actor,
            )
            .await?;
            report(
                &project,
                &format!("Added {user} to {}", project.name),
                output_mode,
            )
        }
        ProjectAction::RemoveMember { project, user } => {
            let user = UserId::new(user.as_str());
            let project = projects::remove_member(
                backend,
                &ProjectId::new(project.as_str()),
                &user,
                &actor,
            )
            .await?;
            report(
                &project,
                &format!("Removed {user} from {}", project.name),
                output_mode,
            )
        }
        ProjectAction::SetRole {
            project,
            user,
            role,
        } => {
            let user = UserId::new(user.as_str());
            let project = projects::update_member_role(
                backend,
                &ProjectId::new(project.as_str()),
                &user,
                (*role).into(),
                &actor,
            )
            .await?;
            report(
                &project,
                &format!("Updated role of {user} in {}", project.name),
                output_mode,
            )
        }
        ProjectAction::Delete { project, force } => {
            if !force {
                bail!("Deleting a project removes all its bugs. Re-run with --force to confirm");
            }
            let id = ProjectId::new(project.as_str());
            let cascade = projects::delete_project(backend, &id, &actor).await?;
            report(
                &cascade,
                &format!(
                    "Deleted project {id}: {} bug(s), {} comment(s), {} history entr(ies), {} file(s)",
                    cascade.bugs, cascade.comments, cascade.activity, cascade.blobs
                ),
                output_mode,
            )
        }
    }
}

/// Execute the bug command
pub async fn execute_bug(
    app: &App,
    user: Option<&str>,
    args: &BugArgs,
    output_mode: OutputMode,
) -> Result<()> {
    let backend = app.backend();

    match &args.action {
        BugAction::Create {
            project,
            title,
            description,
            category,
            priority,
            assignee,
            attachments: files,
        } => {
            let actor = acting_user(app, user).await?;
            let new = NewBug {
                description: description.clone(),
                priority: priority.map(Into::into),
                assignee: assignee.as_deref().map(UserId::new),
                ..NewBug::new(title.clone(), (*category).into())
            };
            let mut bug =
                bugs::create_bug(backend, &ProjectId::new(project.as_str()), new, &actor).await?;
            for path in files {
                let (name, mime, bytes) = read_upload(path, None).await?;
                bug = attachments::attach_to_bug(backend, &bug.id, &name, &mime, &bytes, &actor)
                    .await?;
            }
            output::print_bug(&bug, output_mode)?;
            Ok(())
        }
        BugAction::List {
            project,
            status,
            assignee,
            priority,
            category,
        } => {
            let filter = BugFilter {
                status: status.map(Into::into),
                assignee: assignee.as_deref().map(UserId::new),
                priority: priority.map(Into::into),
                category: category.map(Into::into),
            };
            let bugs =
                bugs::list_bugs(backend, &ProjectId::new(project.as_str()), &filter).await?;
            output::print_bugs(&bugs, output_mode)?;
            Ok(())
        }
        BugAction::Show { bug } => {
            let id = BugId::new(bug.as_str());
            let bug = bugs::get_bug(backend, &id).await?;
            let activity = bugs::bug_activity(backend, &id).await?;
            let comments = comments::list_comments(backend, &id).await?;
            output::print_bug_details(&bug, &activity, &comments, output_mode)?;
            Ok(())
        }
        BugAction::Status {
            bug,
            status,
            from,
            resolution,
        } => {
            let actor = acting_user(app, user).await?;
            let id = BugId::new(bug.as_str());
            let old_status = match from {
                Some(from) => (*from).into(),
                None => bugs::get_bug(backend, &id).await?.status,
            };
            let new_status: BugStatus = (*status).into();
            let updated = bugs::update_bug_status(
                backend,
                &id,
                new_status,
                old_status,
                resolution.map(Into::into),
                &actor,
            )
            .await?;

            if new_status == BugStatus::Closed {
                let note = format!(
                    "Closed by {} on {}",
                    actor.display_name,
                    Utc::now().format("%Y-%m-%d")
                );
                comments::add_system_comment(backend, &id, &note, &actor).await?;
            }

            output::print_bug(&updated, output_mode)?;
            Ok(())
        }
        BugAction::Edit {
            bug,
            title,
            description,
            category,
            priority,
            assignee,
            unassign,
        } => {
            let actor = acting_user(app, user).await?;
            let assignee = if *unassign {
                Some(None)
            } else {
                assignee.as_deref().map(|a| Some(UserId::new(a)))
            };
            let edit = BugEdit {
                title: title.clone(),
                description: description.clone(),
                category: category.map(Into::into),
                attachments: None,
                added_attachments: Vec::new(),
                priority: priority.map(Into::into),
                assignee,
            };
            let bug = bugs::edit_bug(backend, &BugId::new(bug.as_str()), edit, &actor).await?;
            output::print_bug(&bug, output_mode)?;
            Ok(())
        }
        BugAction::Attach { bug, file, mime } => {
            let actor = acting_user(app, user).await?;
            let (name, mime, bytes) = read_upload(file, mime.as_deref()).await?;
            let bug = attachments::attach_to_bug(
                backend,
                &BugId::new(bug.as_str()),
                &name,
                &mime,
                &bytes,
                &actor,
            )
            .await?;
            output::print_bug(&bug, output_mode)?;
            Ok(())
        }
        BugAction::Delete { bug } => {
            let actor = acting_user(app, user).await?;
            let id = BugId::new(bug.as_str());
            let cascade = bugs::delete_bug(backend, &id, &actor).await?;
            report(
                &cascade,
                &format!(
                    "Deleted bug {id}: {} comment(s), {} history entr(ies), {} file(s)",
                    cascade.comments, cascade.activity, cascade.blobs
                ),
                output_mode,
            )
        }
        BugAction::Trace {
            reference,
            bugs: ids,
        } => {
            let actor = acting_user(app, user).await?;
            let ids: Vec<BugId> = ids.iter().map(|id| BugId::new(id.as_str())).collect();
            let result =
                traceability::assign_commit_reference(backend, &ids, reference, &actor).await?;

            let mut message = format!(
                "Recorded {reference} on {} bug(s)",
                result.updated.len()
            );
            if !result.skipped.is_empty() {
                let skipped: Vec<&str> = result.skipped.iter().map(BugId::as_str).collect();
                message.push_str(&format!("; not found: {}", skipped.join(", ")));
            }
            report(&result, &message, output_mode)
        }
    }
}

/// Execute the comment command
pub async fn execute_comment(
    app: &App,
    user: Option<&str>,
    args: &CommentArgs,
    output_mode: OutputMode,
) -> Result<()> {
    let backend = app.backend();

    match &args.action {
        CommentAction::Add {
            bug,
            text,
            attachments: files,
        } => {
            let actor = acting_user(app, user).await?;
            let bug = bugs::get_bug(backend, &BugId::new(bug.as_str())).await?;

            let mut uploaded = Vec::with_capacity(files.len());
            for path in files {
                let (name, mime, bytes) = read_upload(path, None).await?;
                let attachment = attachments::upload_attachment(
                    backend,
                    &bug.project_id,
                    bug.id.as_str(),
                    BlobKind::Comment,
                    &name,
                    &mime,
                    &bytes,
                )
                .await?;
                uploaded.push(attachment);
            }

            let new = NewComment {
                text: text.clone(),
                attachments: uploaded.clone(),
            };
            match comments::add_comment(backend, &bug.id, new, &actor).await {
                Ok(comment) => {
                    report(
                        &comment,
                        &format!("Commented on {}", bug.ticket_number),
                        output_mode,
                    )
                }
                Err(e) => {
                    for attachment in &uploaded {
                        if let Err(cleanup) = attachments::remove_attachment(backend, attachment).await
                        {
                            tracing::warn!(path = %attachment.storage_path, error = %cleanup, "Failed to remove orphaned upload");
                        }
                    }
                    Err(e.into())
                }
            }
        }
        CommentAction::List { bug } => {
            let comments = comments::list_comments(backend, &BugId::new(bug.as_str())).await?;
            output::print_comments(&comments, output_mode)?;
            Ok(())
        }
    }
}

/// Execute the notifications command
pub async fn execute_notifications(
    app: &App,
    user: Option<&str>,
    args: &NotificationsArgs,
    output_mode: OutputMode,
) -> Result<()> {
    let actor = acting_user(app, user).await?;
    let backend = app.backend();

    match &args.action {
        NotificationsAction::List { unread } => {
            let inbox = notifications::list_notifications(backend, &actor.id, *unread).await?;
            output::print_notifications(&inbox, output_mode)?;
            Ok(())
        }
        NotificationsAction::Read { id, all } => {
            if *all {
                let count = notifications::mark_all_read(backend, &actor).await?;
                return report(
                    &serde_json::json!({ "marked_read": count }),
                    &format!("Marked {count} notification(s) as read"),
                    output_mode,
                );
            }
            let Some(id) = id else {
                bail!("Pass a notification id or --all");
            };
            let notification =
                notifications::mark_read(backend, &NotificationId::new(id.as_str()), &actor)
                    .await?;
            report(
                &notification,
                &format!("Marked {} as read", notification.id),
                output_mode,
            )
        }
    }
}

/// Execute the report command
pub async fn execute_report(
    app: &App,
    user: Option<&str>,
    args: &ReportArgs,
    output_mode: OutputMode,
) -> Result<()> {
    let actor = acting_user(app, user).await?;
    let filter = ReportFilter {
        from: args.from,
        to: args.to,
        project: args.project.as_deref().map(ProjectId::new),
    };
    let summary =
        reports::dashboard(app.backend(), &TeamId::new(args.team.as_str()), &actor, &filter)
            .await?;
    output::print_summary(&summary, output_mode)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::png("shot.PNG", "image/png")]
    #[case::log("server.log", "text/plain")]
    #[case::none("README", "application/octet-stream")]
    fn test_guess_mime(#[case] file: &str, #[case] expected: &str) {
        assert_eq!(guess_mime(Path::new(file)), expected);
    }
}
