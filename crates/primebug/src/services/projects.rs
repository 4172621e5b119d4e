//! Project lifecycle, membership and cascade delete.

use super::{teams, Backend, CascadeReport};
use crate::blob::project_prefix;
use crate::domain::{
    collections, require_text, ActingUser, NewProject, NotificationIntent, NotificationKind,
    Project, ProjectId, ProjectRole, ProjectStatus, ProjectUpdate, Team, TeamId, UserId,
};
use crate::error::{Error, Result};
use crate::id_generation::project_slug;
use chrono::Utc;
use primebug_docstore::store::{fetch, fetch_all};
use primebug_docstore::{delete_batches, DocKey, Query, WriteBatch};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Slug suffixes tried before giving up on a name.
pub const MAX_SLUG_ATTEMPTS: u32 = 8;

/// Create a project in `team`; `actor` becomes its Creator.
///
/// # Errors
///
/// - `Error::Validation` for an empty name or malformed code
/// - `Error::TeamNotFound` if the team does not exist
/// - `Error::Permission` if `actor` is not a member of the team
/// - `Error::TransactionConflict` if no free slug was found
pub async fn create_project(
    backend: &Backend,
    new: NewProject,
    actor: &ActingUser,
) -> Result<Project> {
    let (name, code) = new.validated()?;
    let team = teams::get_team(backend, &new.team_id).await?;
    if !team.is_member(&actor.id) {
        return Err(Error::Permission(format!(
            "Only members of {} can create projects in it",
            team.name
        )));
    }

    let now = Utc::now();
    let mut project = Project {
        id: ProjectId::new(String::new()),
        name,
        code,
        description: new.description.trim().to_string(),
        team_id: team.id,
        status: ProjectStatus::default(),
        last_ticket_sequence: 0,
        members: vec![actor.id.clone()],
        roles: BTreeMap::from([(actor.id.clone(), ProjectRole::Creator)]),
        created_by: actor.id.clone(),
        created_at: now,
        updated_at: now,
    };

    for attempt in 0..MAX_SLUG_ATTEMPTS {
        project.id = ProjectId::new(project_slug(&project.name, attempt));
        let key = project.id.key();
        let mut batch = WriteBatch::new();
        batch.require_absent(&key).set(&key, &project)?;

        match backend.store().commit(batch).await {
            Ok(()) => {
                info!(project = %project.id, code = %project.code, creator = %actor.id, "Created project");
                return Ok(project);
            }
            Err(e) if e.is_conflict() => {
                debug!(slug = %project.id, attempt, "Project slug taken, retrying");
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(Error::TransactionConflict {
        attempts: MAX_SLUG_ATTEMPTS,
    })
}

/// Look up a project.
///
/// # Errors
///
/// Returns `Error::ProjectNotFound` if it does not exist.
pub async fn get_project(backend: &Backend, id: &ProjectId) -> Result<Project> {
    fetch(backend.store(), &id.key())
        .await?
        .ok_or_else(|| Error::ProjectNotFound(id.clone()))
}

/// Projects of `team` that `user` is a member of, by name.
///
/// # Errors
///
/// Propagates store failures.
pub async fn get_projects_for_user(
    backend: &Backend,
    team: &TeamId,
    user: &UserId,
) -> Result<Vec<Project>> {
    let query = Query::collection(collections::PROJECTS)
        .eq("team_id", team.as_str())
        .array_contains("members", user.as_str());
    let mut projects: Vec<Project> = fetch_all(backend.store(), &query).await?;
    projects.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(projects)
}

/// Change project settings. Requires Creator or Admin.
///
/// # Errors
///
/// - `Error::ProjectNotFound` if it does not exist
/// - `Error::Permission` if `actor` cannot manage the project
/// - `Error::Validation` for an empty update or blank name
pub async fn update_project(
    backend: &Backend,
    id: &ProjectId,
    update: ProjectUpdate,
    actor: &ActingUser,
) -> Result<Project> {
    if update.is_empty() {
        return Err(Error::Validation("Nothing to update".to_string()));
    }
    let name = update
        .name
        .as_deref()
        .map(|n| require_text("Project name", n))
        .transpose()?;

    let project = mutate_project(backend, id, actor, |project| {
        if let Some(name) = &name {
            project.name.clone_from(name);
        }
        if let Some(description) = &update.description {
            project.description = description.trim().to_string();
        }
        if let Some(status) = update.status {
            project.status = status;
        }
        Ok(())
    })
    .await?;
    info!(project = %id, "Updated project");
    Ok(project)
}

/// Add a member of the project's team to the project.
///
/// The new member receives a `ProjectAssigned` notification.
///
/// # Errors
///
/// - `Error::Permission` if `actor` cannot manage the project
/// - `Error::Validation` for the Creator role, a user outside the team or
///   an existing member
pub async fn add_member(
    backend: &Backend,
    id: &ProjectId,
    user: &UserId,
    role: ProjectRole,
    actor: &ActingUser,
) -> Result<Project> {
    if role == ProjectRole::Creator {
        return Err(Error::Validation(
            "The Creator role cannot be granted".to_string(),
        ));
    }
    let team_id = get_project(backend, id).await?.team_id;
    let (project_key, team_key) = (id.key(), team_id.key());

    let project = backend
        .transact(&[project_key.clone(), team_key.clone()], |snapshot, batch| {
            let mut project = read_project(snapshot.get(&project_key)?, id)?;
            require_manager(&project, actor)?;
            let team: Team = snapshot
                .get(&team_key)?
                .ok_or_else(|| Error::TeamNotFound(team_id.clone()))?;
            if !team.is_member(user) {
                return Err(Error::Validation(format!(
                    "{user} must join team {} before joining its projects",
                    team.name
                )));
            }
            if project.is_member(user) {
                return Err(Error::Validation(format!(
                    "{user} is already a member of {}",
                    project.name
                )));
            }
            project.members.push(user.clone());
            project.roles.insert(user.clone(), role);
            project.updated_at = Utc::now();
            batch.set(&project_key, &project)?;
            Ok(project)
        })
        .await?;
    info!(project = %id, user = %user, %role, "Added project member");

    if *user != actor.id {
        backend
            .notify([NotificationIntent {
                recipient: user.clone(),
                sender_name: actor.display_name.clone(),
                kind: NotificationKind::ProjectAssigned,
                title: format!("Added to {}", project.name),
                message: format!(
                    "{} added you to project {} as {role}",
                    actor.display_name, project.name
                ),
                link: backend.settings().link(&format!("projects/{}", project.id)),
            }])
            .await;
    }
    Ok(project)
}

/// Remove a member. Bugs assigned to them keep their assignee.
///
/// # Errors
///
/// - `Error::Permission` if `actor` cannot manage the project
/// - `Error::Validation` for the Creator or a non-member
pub async fn remove_member(
    backend: &Backend,
    id: &ProjectId,
    user: &UserId,
    actor: &ActingUser,
) -> Result<Project> {
    let project = mutate_project(backend, id, actor, |project| {
        require_non_creator_member(project, user)?;
        project.members.retain(|m| m != user);
        project.roles.remove(user);
        Ok(())
    })
    .await?;
    info!(project = %id, user = %user, "Removed project member");
    Ok(project)
}

/// Change a member's role.
///
/// # Errors
///
/// - `Error::Permission` if `actor` cannot manage the project
/// - `Error::Validation` for the Creator role, the Creator or a non-member
pub async fn update_member_role(
    backend: &Backend,
    id: &ProjectId,
    user: &UserId,
    role: ProjectRole,
    actor: &ActingUser,
) -> Result<Project> {
    if role == ProjectRole::Creator {
        return Err(Error::Validation(
            "The Creator role cannot be granted".to_string(),
        ));
    }
    let project = mutate_project(backend, id, actor, |project| {
        require_non_creator_member(project, user)?;
        project.roles.insert(user.clone(), role);
        Ok(())
    })
    .await?;
    info!(project = %id, user = %user, %role, "Changed project role");
    Ok(project)
}

/// Delete a project with every bug, activity entry and comment it owns.
///
/// Children go first, in sequential batches within the write limit, then
/// the project document, then the project's blobs (best effort). A failed
/// batch aborts the delete and leaves earlier batches committed; the
/// project document is still present, so the delete can be retried.
///
/// The project document is deleted only at the version read before the
/// sweep. Creating a bug bumps that version, so a bug filed while the
/// children were being removed sends the delete back for another sweep.
///
/// # Errors
///
/// - `Error::ProjectNotFound` if it does not exist
/// - `Error::Permission` unless `actor` is the Creator
/// - `Error::TransactionConflict` if the project kept changing
/// - Store failures from any batch
pub async fn delete_project(
    backend: &Backend,
    id: &ProjectId,
    actor: &ActingUser,
) -> Result<CascadeReport> {
    let attempts = backend.settings().max_transaction_attempts.max(1);
    let mut report = CascadeReport::default();

    for attempt in 1..=attempts {
        let doc = backend
            .store()
            .get(&id.key())
            .await?
            .ok_or_else(|| Error::ProjectNotFound(id.clone()))?;
        let project: Project = doc.decode()?;
        if !project.is_creator(&actor.id) {
            return Err(Error::Permission(
                "Only the project creator can delete it".to_string(),
            ));
        }

        let bugs = child_keys(backend, collections::BUGS, id).await?;
        let activity = child_keys(backend, collections::ACTIVITY, id).await?;
        let comments = child_keys(backend, collections::COMMENTS, id).await?;
        report.bugs += bugs.len();
        report.activity += activity.len();
        report.comments += comments.len();

        let batches = delete_batches(activity.into_iter().chain(comments).chain(bugs));
        debug!(project = %id, attempt, batches = batches.len(), "Deleting project children");
        report.batches += backend.commit_sequentially(batches).await?;

        let mut batch = WriteBatch::new();
        batch.require_version(&id.key(), doc.version).delete(&id.key());
        match backend.store().commit(batch).await {
            Ok(()) => {
                report.batches += 1;
                return Ok(finish_project_delete(backend, id, report).await);
            }
            Err(e) if e.is_conflict() => {
                debug!(project = %id, attempt, "Project changed during delete, sweeping again");
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(Error::TransactionConflict { attempts })
}

async fn finish_project_delete(
    backend: &Backend,
    id: &ProjectId,
    mut report: CascadeReport,
) -> CascadeReport {
    match backend.blobs().delete_prefix(&project_prefix(id)).await {
        Ok(removed) => report.blobs = removed,
        Err(e) => warn!(project = %id, error = %e, "Failed to remove project attachments"),
    }

    info!(
        project = %id,
        bugs = report.bugs,
        activity = report.activity,
        comments = report.comments,
        "Deleted project"
    );
    report
}

/// Keys of every document in `collection` belonging to `project`.
async fn child_keys(
    backend: &Backend,
    collection: &str,
    project: &ProjectId,
) -> Result<Vec<DocKey>> {
    let query = Query::collection(collection).eq("proyecto_id", project.as_str());
    Ok(backend
        .store()
        .query(&query)
        .await?
        .into_iter()
        .map(|doc| doc.key)
        .collect())
}

pub(crate) fn read_project(project: Option<Project>, id: &ProjectId) -> Result<Project> {
    project.ok_or_else(|| Error::ProjectNotFound(id.clone()))
}

fn require_manager(project: &Project, actor: &ActingUser) -> Result<()> {
    if project.can_manage(&actor.id) {
        Ok(())
    } else {
        Err(Error::Permission(format!(
            "Only the creator or an admin can manage {}",
            project.name
        )))
    }
}

fn require_non_creator_member(project: &Project, user: &UserId) -> Result<()> {
    if !project.is_member(user) {
        return Err(Error::Validation(format!(
            "{user} is not a member of {}",
            project.name
        )));
    }
    if project.is_creator(user) {
        return Err(Error::Validation(
            "The project creator cannot be removed or change role".to_string(),
        ));
    }
    Ok(())
}

/// Read-modify-write a project as one of its managers.
async fn mutate_project<F>(
    backend: &Backend,
    id: &ProjectId,
    actor: &ActingUser,
    mut change: F,
) -> Result<Project>
where
    F: FnMut(&mut Project) -> Result<()> + Send,
{
    let key = id.key();
    backend
        .transact(std::slice::from_ref(&key), |snapshot, batch| {
            let mut project = read_project(snapshot.get(&key)?, id)?;
            require_manager(&project, actor)?;
            change(&mut project)?;
            project.updated_at = Utc::now();
            batch.set(&key, &project)?;
            Ok(project)
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceSettings;
    use crate::domain::TeamRole;

    fn ana() -> ActingUser {
        ActingUser::new("ana", "Ana")
    }

    fn ben() -> ActingUser {
        ActingUser::new("ben", "Ben")
    }

    async fn setup() -> (Backend, Project) {
        let backend = Backend::in_memory(ServiceSettings::default()).await.unwrap();
        let team = teams::create_team(&backend, "Core", &ana()).await.unwrap();
        teams::add_member(&backend, &team.id, &ben().id, TeamRole::Member, &ana())
            .await
            .unwrap();
        let project = create_project(
            &backend,
            NewProject {
                name: "Web Shop".to_string(),
                code: "web".to_string(),
                description: String::new(),
                team_id: team.id,
            },
            &ana(),
        )
        .await
        .unwrap();
        (backend, project)
    }

    #[tokio::test]
    async fn test_create_project_defaults() {
        let (_, project) = setup().await;
        assert!(project.id.as_str().starts_with("web-shop-"));
        assert_eq!(project.code, "WEB");
        assert_eq!(project.last_ticket_sequence, 0);
        assert_eq!(project.members, vec![ana().id]);
        assert!(project.is_creator(&ana().id));
        assert_eq!(project.status, ProjectStatus::Active);
    }

    #[tokio::test]
    async fn test_same_name_gets_distinct_slugs() {
        let (backend, first) = setup().await;
        let second = create_project(
            &backend,
            NewProject {
                name: "Web Shop".to_string(),
                code: "WEB2".to_string(),
                description: String::new(),
                team_id: first.team_id.clone(),
            },
            &ana(),
        )
        .await
        .unwrap();
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_outsider_cannot_create_project() {
        let (backend, project) = setup().await;
        let err = create_project(
            &backend,
            NewProject {
                name: "Side".to_string(),
                code: "SD".to_string(),
                description: String::new(),
                team_id: project.team_id,
            },
            &ActingUser::new("zed", "Zed"),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Permission(_)));
    }

    #[tokio::test]
    async fn test_add_member_requires_team_membership_and_notifies() {
        let (backend, project) = setup().await;

        let err = add_member(&backend, &project.id, &UserId::new("zed"), ProjectRole::Member, &ana())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let project = add_member(&backend, &project.id, &ben().id, ProjectRole::Member, &ana())
            .await
            .unwrap();
        assert!(project.is_member(&ben().id));

        let inbox = crate::services::notifications::list_notifications(&backend, &ben().id, false)
            .await
            .unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].kind, NotificationKind::ProjectAssigned);
    }

    #[tokio::test]
    async fn test_creator_cannot_be_removed_or_demoted() {
        let (backend, project) = setup().await;
        add_member(&backend, &project.id, &ben().id, ProjectRole::Admin, &ana())
            .await
            .unwrap();

        let err = remove_member(&backend, &project.id, &ana().id, &ben())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let err = update_member_role(&backend, &project.id, &ana().id, ProjectRole::Member, &ben())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_members_cannot_update_settings() {
        let (backend, project) = setup().await;
        add_member(&backend, &project.id, &ben().id, ProjectRole::Member, &ana())
            .await
            .unwrap();

        let update = ProjectUpdate {
            status: Some(ProjectStatus::Standby),
            ..ProjectUpdate::default()
        };
        let err = update_project(&backend, &project.id, update.clone(), &ben())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Permission(_)));

        let updated = update_project(&backend, &project.id, update, &ana()).await.unwrap();
        assert_eq!(updated.status, ProjectStatus::Standby);
    }

    #[tokio::test]
    async fn test_only_creator_deletes() {
        let (backend, project) = setup().await;
        add_member(&backend, &project.id, &ben().id, ProjectRole::Admin, &ana())
            .await
            .unwrap();

        let err = delete_project(&backend, &project.id, &ben()).await.unwrap_err();
        assert!(matches!(err, Error::Permission(_)));

        let report = delete_project(&backend, &project.id, &ana()).await.unwrap();
        assert_eq!(report.bugs, 0);
        assert!(get_project(&backend, &project.id).await.unwrap_err().is_not_found());
    }
}
