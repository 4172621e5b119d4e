//! Bug lifecycle: ticket numbering, the status workflow and edits.
//!
//! Creating a bug is one optimistic transaction over the project document
//! and the reserved bug document. It writes the bug, bumps the project's
//! `last_ticket_sequence` by exactly one and appends the creation activity
//! entry; either all three land or none do. Concurrent creators conflict on
//! the project version and the loser retries from a fresh read, so no two
//! bugs in a project share a ticket number.

use super::projects::{get_project, read_project};
use super::{Backend, CascadeReport};
use crate::domain::{
    collections, validate_description, validate_title, ActingUser, ActivityEntry, Bug, BugEdit,
    BugFilter, BugId, BugStatus, Comment, NewBug, NotificationIntent, NotificationKind, Project,
    ProjectId, Resolution, UserId,
};
use crate::error::{Error, Result};
use crate::id_generation::generate_id;
use chrono::Utc;
use primebug_docstore::store::{fetch, fetch_all};
use primebug_docstore::{delete_batches, DocKey, Query, TxSnapshot};
use serde_json::json;
use tracing::{debug, info};

/// Report a bug in `project`.
///
/// The bug always starts Open; priority defaults to Medium. If it is
/// assigned to someone other than `actor`, they are notified after the
/// commit.
///
/// # Errors
///
/// - `Error::Validation` for a bad title/description or an assignee who is
///   not a project member
/// - `Error::ProjectNotFound` if the project does not exist
/// - `Error::Permission` if `actor` is not a project member
/// - `Error::TransactionConflict` if contention outlasted the retry budget
pub async fn create_bug(
    backend: &Backend,
    project_id: &ProjectId,
    new: NewBug,
    actor: &ActingUser,
) -> Result<Bug> {
    let title = new.validate()?;
    let assignee = new.assignee.filter(|a| !a.is_empty());
    let bug_id = BugId::new(generate_id("bug", project_id.as_str()));
    let (project_key, bug_key) = (project_id.key(), bug_id.key());

    let (bug, project) = backend
        .transact(&[project_key.clone(), bug_key.clone()], |snapshot, batch| {
            let project = read_project(snapshot.get(&project_key)?, project_id)?;
            require_member(&project, &actor.id)?;
            if let Some(assignee) = &assignee {
                require_assignable(&project, assignee)?;
            }
            if snapshot.get_raw(&bug_key).is_some() {
                return Err(Error::Validation(format!("Bug id {bug_id} is already in use")));
            }

            let (sequence, ticket_number) = project.next_ticket();
            let now = Utc::now();
            let bug = Bug {
                id: bug_id.clone(),
                project_id: project_id.clone(),
                ticket_number,
                title: title.clone(),
                description: new.description.clone(),
                category: new.category,
                priority: new.priority.unwrap_or_default(),
                status: BugStatus::Open,
                resolution: None,
                assignee: assignee.clone(),
                created_by: actor.id.clone(),
                attachments: new.attachments.clone(),
                commit_reference: None,
                created_at: now,
                updated_at: now,
            };
            let entry = ActivityEntry::creation(&bug, actor.actor(), now);

            batch.update(&project_key, &json!({ "last_ticket_sequence": sequence }))?;
            batch.set(&bug_key, &bug)?;
            batch.set(&entry.id.key(), &entry)?;
            debug!(project = %project_id, sequence, "Staged ticket");
            Ok((bug, project))
        })
        .await?;

    info!(bug = %bug.id, ticket = %bug.ticket_number, project = %project_id, "Created bug");

    if let Some(assignee) = bug.assigned_to().filter(|a| **a != actor.id) {
        backend
            .notify([assignment_notice(backend, &bug, &project, assignee, actor)])
            .await;
    }
    Ok(bug)
}

/// Look up a bug.
///
/// # Errors
///
/// Returns `Error::BugNotFound` if it does not exist.
pub async fn get_bug(backend: &Backend, id: &BugId) -> Result<Bug> {
    fetch(backend.store(), &id.key())
        .await?
        .ok_or_else(|| Error::BugNotFound(id.clone()))
}

/// Bugs of `project` matching `filter`, in ticket order.
///
/// # Errors
///
/// Returns `Error::ProjectNotFound` if the project does not exist.
pub async fn list_bugs(
    backend: &Backend,
    project: &ProjectId,
    filter: &BugFilter,
) -> Result<Vec<Bug>> {
    get_project(backend, project).await?;

    let mut query = Query::collection(collections::BUGS).eq("proyecto_id", project.as_str());
    if let Some(status) = filter.status {
        query = query.eq("status", status.as_str());
    }
    let mut bugs: Vec<Bug> = fetch_all(backend.store(), &query).await?;
    bugs.retain(|bug| filter.matches(bug));
    bugs.sort_by_key(|bug| bug.ticket_number.sequence());
    Ok(bugs)
}

/// Move a bug along the status workflow.
///
/// `old_status` is the status the caller saw; if the stored status differs
/// the call fails with `Error::StaleStatus` and writes nothing. Moving to
/// Resolved requires a `resolution`; any other target clears it (a
/// resolution passed with another target is ignored). Assignee and creator
/// are notified, never the actor and never twice.
///
/// # Errors
///
/// - `Error::BugNotFound` if the bug does not exist
/// - `Error::InvalidTransition` for `new_status == old_status` or a move
///   that is not a workflow edge
/// - `Error::StaleStatus` if the bug is no longer in `old_status`
/// - `Error::Permission` unless `actor` is the creator, the assignee or a
///   project manager
/// - `Error::Validation` for a move to Resolved without a resolution
pub async fn update_bug_status(
    backend: &Backend,
    bug_id: &BugId,
    new_status: BugStatus,
    old_status: BugStatus,
    resolution: Option<Resolution>,
    actor: &ActingUser,
) -> Result<Bug> {
    let project_id = get_bug(backend, bug_id).await?.project_id;
    if new_status == old_status {
        return Err(Error::InvalidTransition {
            from: old_status,
            to: new_status,
        });
    }

    let (bug, project) = backend
        .transact(&keys(bug_id, &project_id), |snapshot, batch| {
            let (mut bug, project) = read_bug_and_project(snapshot, bug_id, &project_id)?;
            if bug.status != old_status {
                return Err(Error::StaleStatus {
                    expected: old_status,
                    actual: bug.status,
                });
            }
            if !bug.is_participant(&actor.id) && !project.can_manage(&actor.id) {
                return Err(Error::Permission(format!(
                    "Only the reporter, the assignee or a project manager can change the status of {}",
                    bug.ticket_number
                )));
            }
            if !bug.status.can_transition_to(new_status) {
                return Err(Error::InvalidTransition {
                    from: bug.status,
                    to: new_status,
                });
            }
            let resolution = if new_status == BugStatus::Resolved {
                Some(resolution.ok_or_else(|| {
                    Error::Validation("A resolution is required to resolve a bug".to_string())
                })?)
            } else {
                None
            };

            let now = Utc::now();
            let entry = ActivityEntry::status_change(
                &bug,
                bug.status,
                new_status,
                resolution,
                actor.actor(),
                now,
            );
            bug.status = new_status;
            bug.resolution = resolution;
            bug.updated_at = now;

            batch.set(&bug.id.key(), &bug)?;
            batch.set(&entry.id.key(), &entry)?;
            Ok((bug, project))
        })
        .await?;

    info!(bug = %bug.id, from = %old_status, to = %new_status, "Changed bug status");

    let recipients = followers(&bug, &actor.id);
    let intents = recipients.into_iter().map(|recipient| NotificationIntent {
        recipient,
        sender_name: actor.display_name.clone(),
        kind: NotificationKind::BugStatusChanged,
        title: format!("{} is now {new_status}", bug.ticket_number),
        message: format!(
            "{} moved {} \"{}\" from {old_status} to {new_status}",
            actor.display_name, bug.ticket_number, bug.title
        ),
        link: bug_link(backend, &project, &bug),
    });
    backend.notify(intents.collect::<Vec<_>>()).await;
    Ok(bug)
}

/// Apply content and/or triage edits.
///
/// Content (title, description, category, attachments) may only change
/// while the bug is Open; priority and assignee may change in any status
/// but Closed. Both require the creator or the assignee. A new assignee is
/// notified.
///
/// # Errors
///
/// - `Error::BugNotFound` if the bug does not exist
/// - `Error::Permission` unless `actor` is the creator or the assignee
/// - `Error::Validation` for an empty edit, an edit the current status does
///   not allow, bad field values or an assignee outside the project
pub async fn edit_bug(
    backend: &Backend,
    bug_id: &BugId,
    edit: BugEdit,
    actor: &ActingUser,
) -> Result<Bug> {
    if edit.is_empty() {
        return Err(Error::Validation("Nothing to update".to_string()));
    }
    let title = edit.title.as_deref().map(validate_title).transpose()?;
    if let Some(description) = &edit.description {
        validate_description(description)?;
    }
    let new_assignee = edit.assignee.clone().map(|a| a.filter(|id| !id.is_empty()));
    let project_id = get_bug(backend, bug_id).await?.project_id;

    let (bug, previous_assignee, project) = backend
        .transact(&keys(bug_id, &project_id), |snapshot, batch| {
            let (mut bug, project) = read_bug_and_project(snapshot, bug_id, &project_id)?;
            if !bug.is_participant(&actor.id) {
                return Err(Error::Permission(format!(
                    "Only the reporter or the assignee can edit {}",
                    bug.ticket_number
                )));
            }
            if edit.touches_content() && bug.status != BugStatus::Open {
                return Err(Error::Validation(format!(
                    "Title, description, category and attachments can only change while the bug is Open ({} is {})",
                    bug.ticket_number, bug.status
                )));
            }
            if edit.touches_triage() && bug.status == BugStatus::Closed {
                return Err(Error::Validation(format!(
                    "{} is Closed; reopen it first",
                    bug.ticket_number
                )));
            }
            if let Some(Some(assignee)) = &new_assignee {
                require_assignable(&project, assignee)?;
            }

            let previous = bug.assignee.clone();
            if let Some(title) = &title {
                bug.title.clone_from(title);
            }
            if let Some(description) = &edit.description {
                bug.description.clone_from(description);
            }
            if let Some(category) = edit.category {
                bug.category = category;
            }
            if let Some(attachments) = &edit.attachments {
                bug.attachments.clone_from(attachments);
            }
            bug.attachments.extend(edit.added_attachments.iter().cloned());
            if let Some(priority) = edit.priority {
                bug.priority = priority;
            }
            if let Some(assignee) = &new_assignee {
                bug.assignee.clone_from(assignee);
            }
            bug.updated_at = Utc::now();

            batch.set(&bug.id.key(), &bug)?;
            Ok((bug, previous, project))
        })
        .await?;

    info!(bug = %bug.id, "Edited bug");

    let newly_assigned = bug
        .assigned_to()
        .filter(|a| previous_assignee.as_ref() != Some(*a) && **a != actor.id);
    if let Some(assignee) = newly_assigned {
        backend
            .notify([assignment_notice(backend, &bug, &project, assignee, actor)])
            .await;
    }
    Ok(bug)
}

/// Activity entries of a bug, oldest first.
///
/// # Errors
///
/// Returns `Error::BugNotFound` if the bug does not exist.
pub async fn bug_activity(backend: &Backend, bug_id: &BugId) -> Result<Vec<ActivityEntry>> {
    get_bug(backend, bug_id).await?;
    let query = Query::collection(collections::ACTIVITY).eq("bug_id", bug_id.as_str());
    let mut entries: Vec<ActivityEntry> = fetch_all(backend.store(), &query).await?;
    entries.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
    Ok(entries)
}

/// Hard-delete a bug with its activity, comments and attachment blobs.
///
/// The ticket number is not reused: the project's sequence is untouched.
///
/// # Errors
///
/// - `Error::BugNotFound` if the bug does not exist
/// - `Error::Permission` unless `actor` is the creator or a project manager
pub async fn delete_bug(
    backend: &Backend,
    bug_id: &BugId,
    actor: &ActingUser,
) -> Result<CascadeReport> {
    let bug = get_bug(backend, bug_id).await?;
    let project = get_project(backend, &bug.project_id).await?;
    if bug.created_by != actor.id && !project.can_manage(&actor.id) {
        return Err(Error::Permission(format!(
            "Only the reporter or a project manager can delete {}",
            bug.ticket_number
        )));
    }

    let activity: Vec<DocKey> = backend
        .store()
        .query(&Query::collection(collections::ACTIVITY).eq("bug_id", bug_id.as_str()))
        .await?
        .into_iter()
        .map(|doc| doc.key)
        .collect();
    let comments: Vec<Comment> = fetch_all(
        backend.store(),
        &Query::collection(collections::COMMENTS).eq("bug_id", bug_id.as_str()),
    )
    .await?;

    let mut report = CascadeReport {
        bugs: 1,
        activity: activity.len(),
        comments: comments.len(),
        ..CascadeReport::default()
    };
    let keys = activity
        .into_iter()
        .chain(comments.iter().map(|c| c.id.key()))
        .chain(std::iter::once(bug_id.key()));
    report.batches = backend.commit_sequentially(delete_batches(keys)).await?;

    let paths = bug
        .attachments
        .iter()
        .chain(comments.iter().flat_map(|c| c.attachments.iter()))
        .map(|a| a.storage_path.as_str());
    report.blobs = backend.remove_blobs(paths).await;

    info!(bug = %bug_id, ticket = %bug.ticket_number, "Deleted bug");
    Ok(report)
}

fn keys(bug: &BugId, project: &ProjectId) -> [DocKey; 2] {
    [bug.key(), project.key()]
}

fn read_bug_and_project(
    snapshot: &TxSnapshot,
    bug_id: &BugId,
    project_id: &ProjectId,
) -> Result<(Bug, Project)> {
    let bug: Bug = snapshot
        .get(&bug_id.key())?
        .ok_or_else(|| Error::BugNotFound(bug_id.clone()))?;
    let project = read_project(snapshot.get(&project_id.key())?, project_id)?;
    Ok((bug, project))
}

fn require_member(project: &Project, user: &UserId) -> Result<()> {
    if project.is_member(user) {
        Ok(())
    } else {
        Err(Error::Permission(format!(
            "{user} is not a member of {}",
            project.name
        )))
    }
}

fn require_assignable(project: &Project, assignee: &UserId) -> Result<()> {
    if project.is_member(assignee) {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "Cannot assign to {assignee}: not a member of {}",
            project.name
        )))
    }
}

/// Assignee and creator of `bug`, without `actor` and without duplicates.
pub(crate) fn followers(bug: &Bug, actor: &UserId) -> Vec<UserId> {
    let mut recipients = Vec::with_capacity(2);
    if let Some(assignee) = bug.assigned_to() {
        if assignee != actor {
            recipients.push(assignee.clone());
        }
    }
    if bug.created_by != *actor && !recipients.contains(&bug.created_by) {
        recipients.push(bug.created_by.clone());
    }
    recipients
}

pub(crate) fn bug_link(backend: &Backend, project: &Project, bug: &Bug) -> String {
    backend
        .settings()
        .link(&format!("projects/{}/bugs/{}", project.id, bug.id))
}

fn assignment_notice(
    backend: &Backend,
    bug: &Bug,
    project: &Project,
    assignee: &UserId,
    actor: &ActingUser,
) -> NotificationIntent {
    NotificationIntent {
        recipient: assignee.clone(),
        sender_name: actor.display_name.clone(),
        kind: NotificationKind::BugAssigned,
        title: format!("{} assigned to you", bug.ticket_number),
        message: format!(
            "{} assigned you {} \"{}\" in {}",
            actor.display_name, bug.ticket_number, bug.title, project.name
        ),
        link: bug_link(backend, project, bug),
    }
}
