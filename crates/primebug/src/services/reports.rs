//! Dashboard aggregation over bug documents.
//!
//! [`dashboard`] fans out one bug query per visible project and hands the
//! result to [`summarize`], which does the grouping in memory.

use super::projects::get_projects_for_user;
use super::teams::get_team;
use super::Backend;
use crate::domain::{collections, ActingUser, Bug, BugStatus, Category, Priority, ProjectId, TeamId};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use primebug_docstore::store::fetch_all;
use primebug_docstore::Query;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Key used in [`BugSummary::by_assignee`] for bugs nobody owns.
pub const UNASSIGNED: &str = "unassigned";

/// Restricts which bugs a report counts.
#[derive(Debug, Clone, Default)]
pub struct ReportFilter {
    /// Only bugs created at or after this instant.
    pub from: Option<DateTime<Utc>>,
    /// Only bugs created at or before this instant.
    pub to: Option<DateTime<Utc>>,
    /// Only this project.
    pub project: Option<ProjectId>,
}

impl ReportFilter {
    fn admits(&self, bug: &Bug) -> bool {
        self.from.is_none_or(|from| bug.created_at >= from)
            && self.to.is_none_or(|to| bug.created_at <= to)
            && self.project.as_ref().is_none_or(|p| bug.project_id == *p)
    }
}

/// Aggregated counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BugSummary {
    /// Bugs counted.
    pub total: usize,
    /// Count per status.
    pub by_status: BTreeMap<BugStatus, usize>,
    /// Count per priority.
    pub by_priority: BTreeMap<Priority, usize>,
    /// Count per category.
    pub by_category: BTreeMap<Category, usize>,
    /// Count per assignee id, [`UNASSIGNED`] for none.
    pub by_assignee: BTreeMap<String, usize>,
    /// Critical bugs not yet Resolved or Closed.
    pub open_critical: usize,
    /// Bugs Resolved or Closed.
    pub resolved: usize,
}

/// Group `bugs` admitted by `filter`.
#[must_use]
pub fn summarize(bugs: &[Bug], filter: &ReportFilter) -> BugSummary {
    let mut summary = BugSummary::default();
    for bug in bugs.iter().filter(|bug| filter.admits(bug)) {
        summary.total += 1;
        *summary.by_status.entry(bug.status).or_default() += 1;
        *summary.by_priority.entry(bug.priority).or_default() += 1;
        *summary.by_category.entry(bug.category).or_default() += 1;
        let assignee = bug
            .assigned_to()
            .map_or_else(|| UNASSIGNED.to_string(), ToString::to_string);
        *summary.by_assignee.entry(assignee).or_default() += 1;

        let done = matches!(bug.status, BugStatus::Resolved | BugStatus::Closed);
        if done {
            summary.resolved += 1;
        } else if bug.priority == Priority::Critical {
            summary.open_critical += 1;
        }
    }
    summary
}

/// Summarize the bugs of every project in `team` that `actor` belongs to.
///
/// # Errors
///
/// - `Error::TeamNotFound` if the team does not exist
/// - `Error::Permission` if `actor` is not a team member
pub async fn dashboard(
    backend: &Backend,
    team: &TeamId,
    actor: &ActingUser,
    filter: &ReportFilter,
) -> Result<BugSummary> {
    let team = get_team(backend, team).await?;
    if !team.is_member(&actor.id) {
        return Err(Error::Permission(format!(
            "Only members of {} can see its dashboard",
            team.name
        )));
    }

    let projects = get_projects_for_user(backend, &team.id, &actor.id).await?;
    let mut bugs = Vec::new();
    for project in projects
        .iter()
        .filter(|p| filter.project.as_ref().is_none_or(|id| p.id == *id))
    {
        let query = Query::collection(collections::BUGS).eq("proyecto_id", project.id.as_str());
        let found: Vec<Bug> = fetch_all(backend.store(), &query).await?;
        debug!(project = %project.id, bugs = found.len(), "Loaded bugs for dashboard");
        bugs.extend(found);
    }
    Ok(summarize(&bugs, filter))
}
