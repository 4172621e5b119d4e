//! Comments on bugs.

use super::bugs::{bug_link, followers, get_bug};
use super::projects::get_project;
use super::Backend;
use crate::domain::{
    collections, require_text, ActingUser, BugId, Comment, CommentId, NewComment,
    NotificationIntent, NotificationKind,
};
use crate::error::{Error, Result};
use crate::id_generation::generate_id;
use chrono::Utc;
use primebug_docstore::store::fetch_all;
use primebug_docstore::{Query, WriteBatch};
use tracing::info;

/// Comment on a bug as a project member.
///
/// The bug's creator and assignee are notified (never the author, never
/// twice).
///
/// # Errors
///
/// - `Error::Validation` if both text and attachments are empty
/// - `Error::BugNotFound` if the bug does not exist
/// - `Error::Permission` if `actor` is not a project member
pub async fn add_comment(
    backend: &Backend,
    bug_id: &BugId,
    new: NewComment,
    actor: &ActingUser,
) -> Result<Comment> {
    if new.is_empty() {
        return Err(Error::Validation(
            "A comment needs text or at least one attachment".to_string(),
        ));
    }
    let bug = get_bug(backend, bug_id).await?;
    let project = get_project(backend, &bug.project_id).await?;
    if !project.is_member(&actor.id) {
        return Err(Error::Permission(format!(
            "Only members of {} can comment on {}",
            project.name, bug.ticket_number
        )));
    }

    let comment = Comment {
        id: CommentId::new(generate_id("comment", bug_id.as_str())),
        bug_id: bug_id.clone(),
        project_id: bug.project_id.clone(),
        text: new.normalized_text(),
        attachments: new.attachments,
        author: actor.actor(),
        system: false,
        created_at: Utc::now(),
    };
    insert(backend, &comment).await?;
    info!(bug = %bug_id, comment = %comment.id, "Added comment");

    let link = bug_link(backend, &project, &bug);
    let intents: Vec<NotificationIntent> = followers(&bug, &actor.id)
        .into_iter()
        .map(|recipient| NotificationIntent {
            recipient,
            sender_name: actor.display_name.clone(),
            kind: NotificationKind::BugCommented,
            title: format!("New comment on {}", bug.ticket_number),
            message: format!(
                "{} commented on {} \"{}\"",
                actor.display_name, bug.ticket_number, bug.title
            ),
            link: link.clone(),
        })
        .collect();
    backend.notify(intents).await;
    Ok(comment)
}

/// Record a system-authored comment, e.g. who closed a bug and when.
/// No notifications are sent.
///
/// # Errors
///
/// - `Error::Validation` for blank text
/// - `Error::BugNotFound` if the bug does not exist
pub async fn add_system_comment(
    backend: &Backend,
    bug_id: &BugId,
    text: &str,
    actor: &ActingUser,
) -> Result<Comment> {
    let text = require_text("Comment", text)?;
    let bug = get_bug(backend, bug_id).await?;
    let comment = Comment {
        id: CommentId::new(generate_id("comment", bug_id.as_str())),
        bug_id: bug_id.clone(),
        project_id: bug.project_id,
        text: Some(text),
        attachments: Vec::new(),
        author: actor.actor(),
        system: true,
        created_at: Utc::now(),
    };
    insert(backend, &comment).await?;
    info!(bug = %bug_id, comment = %comment.id, "Added system comment");
    Ok(comment)
}

/// Comments of a bug, oldest first.
///
/// # Errors
///
/// Returns `Error::BugNotFound` if the bug does not exist.
pub async fn list_comments(backend: &Backend, bug_id: &BugId) -> Result<Vec<Comment>> {
    get_bug(backend, bug_id).await?;
    let query = Query::collection(collections::COMMENTS).eq("bug_id", bug_id.as_str());
    let mut comments: Vec<Comment> = fetch_all(backend.store(), &query).await?;
    comments.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    Ok(comments)
}

async fn insert(backend: &Backend, comment: &Comment) -> Result<()> {
    let key = comment.id.key();
    let mut batch = WriteBatch::new();
    batch.require_absent(&key).set(&key, comment)?;
    backend.store().commit(batch).await?;
    Ok(())
}
