//! Identity and profile lookup.

use super::Backend;
use crate::domain::{collections, require_text, UserId, UserProfile};
use crate::error::{Error, Result};
use primebug_docstore::store::{fetch, fetch_all};
use primebug_docstore::{Query, WriteBatch, MAX_IN_FILTER_VALUES};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Create or replace a profile.
///
/// # Errors
///
/// Returns `Error::Validation` for an empty id or display name.
pub async fn upsert_profile(backend: &Backend, profile: UserProfile) -> Result<UserProfile> {
    if profile.id.is_empty() {
        return Err(Error::Validation("User id cannot be empty".to_string()));
    }
    let profile = UserProfile {
        display_name: require_text("Display name", &profile.display_name)?,
        ..profile
    };

    let mut batch = WriteBatch::new();
    batch.set(&profile.id.key(), &profile)?;
    backend.store().commit(batch).await?;
    info!(user = %profile.id, "Saved profile");
    Ok(profile)
}

/// Look up one profile.
///
/// # Errors
///
/// Returns `Error::ProfileNotFound` if there is none.
pub async fn get_profile(backend: &Backend, id: &UserId) -> Result<UserProfile> {
    fetch(backend.store(), &id.key())
        .await?
        .ok_or_else(|| Error::ProfileNotFound(id.clone()))
}

/// Look up several profiles in request order, silently omitting unknown ids.
///
/// Lookups are chunked so no `in` filter exceeds the engine limit.
///
/// # Errors
///
/// Propagates store failures.
pub async fn get_profiles(backend: &Backend, ids: &[UserId]) -> Result<Vec<UserProfile>> {
    let mut seen = HashSet::new();
    let unique: Vec<&UserId> = ids.iter().filter(|id| seen.insert(*id)).collect();

    let mut found: HashMap<UserId, UserProfile> = HashMap::with_capacity(unique.len());
    for chunk in unique.chunks(MAX_IN_FILTER_VALUES) {
        let query = Query::collection(collections::PROFILES)
            .is_in("id", chunk.iter().map(|id| id.as_str()));
        let profiles: Vec<UserProfile> = fetch_all(backend.store(), &query).await?;
        debug!(requested = chunk.len(), found = profiles.len(), "Profile chunk fetched");
        found.extend(profiles.into_iter().map(|p| (p.id.clone(), p)));
    }

    Ok(unique
        .into_iter()
        .filter_map(|id| found.remove(id))
        .collect())
}

/// Display name for `id`, falling back to the raw id.
///
/// # Errors
///
/// Propagates store failures; a missing profile is not an error.
pub async fn display_name(backend: &Backend, id: &UserId) -> Result<String> {
    Ok(fetch::<UserProfile>(backend.store(), &id.key())
        .await?
        .map_or_else(|| id.to_string(), |p| p.display_name))
}
