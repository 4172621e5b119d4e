//! Bulk association of a commit or external ticket with bugs.

use super::bugs::bug_link;
use super::projects::get_project;
use super::Backend;
use crate::domain::{
    require_text, ActingUser, ActivityEntry, Bug, BugId, NotificationIntent, NotificationKind,
    Project, ProjectId,
};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use primebug_docstore::{WriteBatch, MAX_BATCH_WRITES};
use serde::Serialize;
use serde_json::json;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};

/// Writes staged per bug: the bug update and its activity entry.
const WRITES_PER_BUG: usize = 2;

/// Which bugs received the reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TraceabilityReport {
    /// Bugs now carrying the reference.
    pub updated: Vec<BugId>,
    /// Requested ids with no bug behind them.
    pub skipped: Vec<BugId>,
}

/// A bug and the version it was read at.
#[derive(Debug, Clone)]
struct Tracked {
    bug: Bug,
    version: u64,
}

async fn load(backend: &Backend, id: &BugId) -> Result<Option<Tracked>> {
    let Some(doc) = backend.store().get(&id.key()).await? else {
        return Ok(None);
    };
    Ok(Some(Tracked {
        bug: doc.decode()?,
        version: doc.version,
    }))
}

/// Set `reference` as the commit reference of every bug in `bug_ids`.
///
/// Unknown ids are skipped and reported, including bugs deleted while the
/// update runs. Every updated bug gets a traceability activity entry, and
/// its creator (unless that is `actor`) is notified after the writes
/// commit.
///
/// # Errors
///
/// - `Error::Validation` for a blank reference
/// - `Error::Permission`, before anything is written, if `actor` is not a
///   member of some found bug's project
/// - `Error::TransactionConflict` if a chunk of bugs kept changing
/// - Store failures; batches committed before a failure stay committed
pub async fn assign_commit_reference(
    backend: &Backend,
    bug_ids: &[BugId],
    reference: &str,
    actor: &ActingUser,
) -> Result<TraceabilityReport> {
    let reference = require_text("Reference", reference)?;

    let mut seen = HashSet::new();
    let mut report = TraceabilityReport::default();
    let mut tracked = Vec::new();
    for id in bug_ids.iter().filter(|id| seen.insert(*id)) {
        match load(backend, id).await? {
            Some(found) => tracked.push(found),
            None => {
                warn!(bug = %id, "Skipping unknown bug in traceability update");
                report.skipped.push(id.clone());
            }
        }
    }

    let mut projects: BTreeMap<ProjectId, Project> = BTreeMap::new();
    for Tracked { bug, .. } in &tracked {
        if !projects.contains_key(&bug.project_id) {
            let project = get_project(backend, &bug.project_id).await?;
            projects.insert(project.id.clone(), project);
        }
    }
    if let Some(project) = projects.values().find(|p| !p.is_member(&actor.id)) {
        return Err(Error::Permission(format!(
            "{} is not a member of {}",
            actor.id, project.name
        )));
    }

    let now = Utc::now();
    let attempts = backend.settings().max_transaction_attempts.max(1);
    let mut bugs: Vec<Bug> = Vec::with_capacity(tracked.len());
    for chunk in tracked.chunks(MAX_BATCH_WRITES / WRITES_PER_BUG) {
        let mut pending = chunk.to_vec();
        for attempt in 1..=attempts {
            if pending.is_empty() {
                break;
            }
            let batch = reference_batch(&pending, &reference, actor, now)?;
            match backend.store().commit(batch).await {
                Ok(()) => {
                    bugs.extend(pending.drain(..).map(|t| t.bug));
                    break;
                }
                Err(e) if e.is_conflict() && attempt < attempts => {
                    debug!(attempt, "Bugs changed during traceability update, re-reading");
                    pending = refresh(backend, pending, &mut report.skipped).await?;
                }
                Err(e) if e.is_conflict() => {
                    return Err(Error::TransactionConflict { attempts });
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
    report.updated = bugs.iter().map(|bug| bug.id.clone()).collect();
    info!(
        reference = %reference,
        updated = report.updated.len(),
        skipped = report.skipped.len(),
        "Attached commit reference"
    );

    let intents: Vec<NotificationIntent> = bugs
        .iter()
        .filter(|bug| bug.created_by != actor.id)
        .filter_map(|bug| {
            let project = projects.get(&bug.project_id)?;
            Some(NotificationIntent {
                recipient: bug.created_by.clone(),
                sender_name: actor.display_name.clone(),
                kind: NotificationKind::BugReferenceAttached,
                title: format!("Reference added to {}", bug.ticket_number),
                message: format!(
                    "{} linked {reference} to {} \"{}\"",
                    actor.display_name, bug.ticket_number, bug.title
                ),
                link: bug_link(backend, project, bug),
            })
        })
        .collect();
    backend.notify(intents).await;
    Ok(report)
}

/// One batch writing the reference and an activity entry per bug, each
/// pinned to the version it was read at.
fn reference_batch(
    pending: &[Tracked],
    reference: &str,
    actor: &ActingUser,
    now: DateTime<Utc>,
) -> Result<WriteBatch> {
    let mut batch = WriteBatch::new();
    for Tracked { bug, version } in pending {
        let entry = ActivityEntry::traceability(bug, reference, actor.actor(), now);
        batch
            .require_version(&bug.id.key(), *version)
            .update(
                &bug.id.key(),
                &json!({ "commit_id": reference, "updated_at": now }),
            )?;
        batch.set(&entry.id.key(), &entry)?;
    }
    Ok(batch)
}

/// Re-read `stale` bugs. Deleted ones move to `skipped`.
async fn refresh(
    backend: &Backend,
    stale: Vec<Tracked>,
    skipped: &mut Vec<BugId>,
) -> Result<Vec<Tracked>> {
    let mut fresh = Vec::with_capacity(stale.len());
    for Tracked { bug, .. } in stale {
        match load(backend, &bug.id).await? {
            Some(current) => fresh.push(current),
            None => {
                warn!(bug = %bug.id, "Bug deleted during traceability update");
                skipped.push(bug.id);
            }
        }
    }
    Ok(fresh)
}
