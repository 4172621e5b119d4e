//! Team membership and roles.
//!
//! Only Owners change membership, and a team always keeps at least one
//! Owner.

use super::Backend;
use crate::domain::{collections, require_text, ActingUser, Team, TeamId, TeamRole, UserId};
use crate::error::{Error, Result};
use crate::id_generation::generate_id;
use chrono::Utc;
use primebug_docstore::store::{fetch, fetch_all};
use primebug_docstore::{Query, WriteBatch};
use std::collections::BTreeMap;
use tracing::info;

/// Create a team; `actor` becomes its Owner.
///
/// # Errors
///
/// Returns `Error::Validation` for an empty name.
pub async fn create_team(backend: &Backend, name: &str, actor: &ActingUser) -> Result<Team> {
    let name = require_text("Team name", name)?;
    let team = Team {
        id: TeamId::new(generate_id("team", &name)),
        name,
        members: vec![actor.id.clone()],
        roles: BTreeMap::from([(actor.id.clone(), TeamRole::Owner)]),
        created_by: actor.id.clone(),
        created_at: Utc::now(),
    };

    let key = team.id.key();
    let mut batch = WriteBatch::new();
    batch.require_absent(&key).set(&key, &team)?;
    backend.store().commit(batch).await?;
    info!(team = %team.id, owner = %actor.id, "Created team");
    Ok(team)
}

/// Look up a team.
///
/// # Errors
///
/// Returns `Error::TeamNotFound` if it does not exist.
pub async fn get_team(backend: &Backend, id: &TeamId) -> Result<Team> {
    fetch(backend.store(), &id.key())
        .await?
        .ok_or_else(|| Error::TeamNotFound(id.clone()))
}

/// Teams `user` belongs to, by name.
///
/// # Errors
///
/// Propagates store failures.
pub async fn get_teams_for_user(backend: &Backend, user: &UserId) -> Result<Vec<Team>> {
    let query = Query::collection(collections::TEAMS).array_contains("members", user.as_str());
    let mut teams: Vec<Team> = fetch_all(backend.store(), &query).await?;
    teams.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(teams)
}

/// Add `user` to the team with `role`.
///
/// # Errors
///
/// - `Error::TeamNotFound` if the team does not exist
/// - `Error::Permission` unless `actor` is an Owner
/// - `Error::Validation` if `user` is already a member
pub async fn add_member(
    backend: &Backend,
    team: &TeamId,
    user: &UserId,
    role: TeamRole,
    actor: &ActingUser,
) -> Result<Team> {
    if user.is_empty() {
        return Err(Error::Validation("User id cannot be empty".to_string()));
    }
    let updated = mutate_team(backend, team, actor, |team| {
        if team.is_member(user) {
            return Err(Error::Validation(format!(
                "{user} is already a member of {}",
                team.name
            )));
        }
        team.members.push(user.clone());
        team.roles.insert(user.clone(), role);
        Ok(())
    })
    .await?;
    info!(team = %team, user = %user, %role, "Added team member");
    Ok(updated)
}

/// Remove `user` from the team.
///
/// # Errors
///
/// - `Error::Permission` unless `actor` is an Owner
/// - `Error::Validation` if `user` is not a member or is the last Owner
pub async fn remove_member(
    backend: &Backend,
    team: &TeamId,
    user: &UserId,
    actor: &ActingUser,
) -> Result<Team> {
    let updated = mutate_team(backend, team, actor, |team| {
        if !team.is_member(user) {
            return Err(Error::Validation(format!(
                "{user} is not a member of {}",
                team.name
            )));
        }
        if team.is_owner(user) && team.owner_count() == 1 {
            return Err(Error::Validation(
                "Cannot remove the last owner of a team".to_string(),
            ));
        }
        team.members.retain(|m| m != user);
        team.roles.remove(user);
        Ok(())
    })
    .await?;
    info!(team = %team, user = %user, "Removed team member");
    Ok(updated)
}

/// Change the role of a member.
///
/// # Errors
///
/// - `Error::Permission` unless `actor` is an Owner
/// - `Error::Validation` if `user` is not a member or would demote the
///   last Owner
pub async fn set_member_role(
    backend: &Backend,
    team: &TeamId,
    user: &UserId,
    role: TeamRole,
    actor: &ActingUser,
) -> Result<Team> {
    let updated = mutate_team(backend, team, actor, |team| {
        if !team.is_member(user) {
            return Err(Error::Validation(format!(
                "{user} is not a member of {}",
                team.name
            )));
        }
        if role != TeamRole::Owner && team.is_owner(user) && team.owner_count() == 1 {
            return Err(Error::Validation(
                "Cannot demote the last owner of a team".to_string(),
            ));
        }
        team.roles.insert(user.clone(), role);
        Ok(())
    })
    .await?;
    info!(team = %team, user = %user, %role, "Changed team role");
    Ok(updated)
}

/// Read-modify-write a team as one of its Owners.
async fn mutate_team<F>(
    backend: &Backend,
    id: &TeamId,
    actor: &ActingUser,
    mut change: F,
) -> Result<Team>
where
    F: FnMut(&mut Team) -> Result<()> + Send,
{
    let key = id.key();
    backend
        .transact(std::slice::from_ref(&key), |snapshot, batch| {
            let mut team: Team = snapshot
                .get(&key)?
                .ok_or_else(|| Error::TeamNotFound(id.clone()))?;
            if !team.is_owner(&actor.id) {
                return Err(Error::Permission(format!(
                    "Only team owners can change the membership of {}",
                    team.name
                )));
            }
            change(&mut team)?;
            batch.set(&key, &team)?;
            Ok(team)
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceSettings;
    use rstest::rstest;

    fn ana() -> ActingUser {
        ActingUser::new("ana", "Ana")
    }

    async fn setup() -> (Backend, Team) {
        let backend = Backend::in_memory(ServiceSettings::default()).await.unwrap();
        let team = create_team(&backend, "Core", &ana()).await.unwrap();
        (backend, team)
    }

    #[tokio::test]
    async fn test_creator_is_owner() {
        let (backend, team) = setup().await;
        assert!(team.is_owner(&ana().id));

        let teams = get_teams_for_user(&backend, &ana().id).await.unwrap();
        assert_eq!(teams.len(), 1);
        assert!(get_teams_for_user(&backend, &UserId::new("ben"))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_members_cannot_manage_membership() {
        let (backend, team) = setup().await;
        add_member(&backend, &team.id, &UserId::new("ben"), TeamRole::Member, &ana())
            .await
            .unwrap();

        let err = add_member(
            &backend,
            &team.id,
            &UserId::new("carla"),
            TeamRole::Member,
            &ActingUser::new("ben", "Ben"),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Permission(_)));
    }

    #[rstest]
    #[case::remove(true)]
    #[case::demote(false)]
    #[tokio::test]
    async fn test_last_owner_is_protected(#[case] remove: bool) {
        let (backend, team) = setup().await;
        let result = if remove {
            remove_member(&backend, &team.id, &ana().id, &ana()).await
        } else {
            set_member_role(&backend, &team.id, &ana().id, TeamRole::Member, &ana()).await
        };
        assert!(matches!(result, Err(Error::Validation(_))));
        assert!(get_team(&backend, &team.id).await.unwrap().is_owner(&ana().id));
    }

    #[tokio::test]
    async fn test_owner_can_step_down_once_another_owner_exists() {
        let (backend, team) = setup().await;
        let ben = UserId::new("ben");
        add_member(&backend, &team.id, &ben, TeamRole::Owner, &ana())
            .await
            .unwrap();

        let team = remove_member(&backend, &team.id, &ana().id, &ana()).await.unwrap();
        assert!(!team.is_member(&ana().id));
        assert!(team.is_owner(&ben));
    }

    #[tokio::test]
    async fn test_duplicate_member_rejected() {
        let (backend, team) = setup().await;
        let err = add_member(&backend, &team.id, &ana().id, TeamRole::Member, &ana())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_unknown_team() {
        let (backend, _) = setup().await;
        let err = remove_member(&backend, &TeamId::new("nope"), &ana().id, &ana())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TeamNotFound(_)));
    }
}
