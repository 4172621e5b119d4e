//! Common test utilities shared across integration tests.
//!
//! Not every test binary uses every helper.
#![allow(dead_code)]

use primebug::blob::{FsBlobStore, MemoryBlobStore};
use primebug::config::ServiceSettings;
use primebug::domain::{
    ActingUser, Bug, Category, NewBug, NewProject, Project, Team, TeamRole, UserProfile,
};
use primebug::services::{bugs, profiles, projects, teams, Backend};
use primebug_docstore::testing::FaultyStore;
use primebug_docstore::{open_store, StoreBackend};
use std::path::Path;
use std::process::{Command, Output};
use std::sync::Arc;

pub fn ana() -> ActingUser {
    ActingUser::new("ana", "Ana")
}

pub fn ben() -> ActingUser {
    ActingUser::new("ben", "Ben")
}

pub fn carla() -> ActingUser {
    ActingUser::new("carla", "Carla")
}

/// A user in the team but not in the project.
pub fn dario() -> ActingUser {
    ActingUser::new("dario", "Dario")
}

/// A team with one project:
///
/// - `ana` owns the team and created project WEB
/// - `ben` is a team and project member
/// - `carla` is a team and project member
/// - `dario` is a team member only
pub struct Fixture {
    pub backend: Backend,
    pub team: Team,
    pub project: Project,
}

impl Fixture {
    pub async fn new() -> Self {
        Self::with_settings(ServiceSettings::default()).await
    }

    pub async fn with_settings(settings: ServiceSettings) -> Self {
        let backend = Backend::in_memory(settings).await.unwrap();
        Self::populate(backend).await
    }

    /// Fixture over a fault-injecting store; faults are registered by the
    /// test after setup.
    pub async fn faulty(settings: ServiceSettings) -> (Self, Arc<FaultyStore>) {
        let inner = open_store(StoreBackend::InMemory).await.unwrap();
        let store = Arc::new(FaultyStore::new(inner));
        let backend = Backend::new(store.clone(), Arc::new(MemoryBlobStore::new()), settings);
        (Self::populate(backend).await, store)
    }

    /// Fixture whose attachments are written under `dir`.
    pub async fn with_blob_dir(dir: &Path) -> Self {
        let store = open_store(StoreBackend::InMemory).await.unwrap();
        let backend = Backend::new(
            store,
            Arc::new(FsBlobStore::new(dir)),
            ServiceSettings::default(),
        );
        Self::populate(backend).await
    }

    async fn populate(backend: Backend) -> Self {
        for user in [ana(), ben(), carla(), dario()] {
            profiles::upsert_profile(
                &backend,
                UserProfile {
                    id: user.id.clone(),
                    display_name: user.display_name.clone(),
                    email: None,
                    photo_url: None,
                },
            )
            .await
            .unwrap();
        }

        let team = teams::create_team(&backend, "Core", &ana()).await.unwrap();
        for user in [ben(), carla(), dario()] {
            teams::add_member(&backend, &team.id, &user.id, TeamRole::Member, &ana())
                .await
                .unwrap();
        }

        let project = projects::create_project(
            &backend,
            NewProject {
                name: "Web Portal".to_string(),
                code: "WEB".to_string(),
                description: "Customer portal".to_string(),
                team_id: team.id.clone(),
            },
            &ana(),
        )
        .await
        .unwrap();
        for user in [ben(), carla()] {
            projects::add_member(
                &backend,
                &project.id,
                &user.id,
                primebug::domain::ProjectRole::Member,
                &ana(),
            )
            .await
            .unwrap();
        }
        let team = teams::get_team(&backend, &team.id).await.unwrap();
        let project = projects::get_project(&backend, &project.id).await.unwrap();

        Self {
            backend,
            team,
            project,
        }
    }

    /// Report a bug in the fixture project.
    pub async fn bug(&self, title: &str, reporter: &ActingUser) -> Bug {
        bugs::create_bug(
            &self.backend,
            &self.project.id,
            NewBug::new(title, Category::Bug),
            reporter,
        )
        .await
        .unwrap()
    }

    /// Report a bug assigned to `assignee`.
    pub async fn assigned_bug(
        &self,
        title: &str,
        reporter: &ActingUser,
        assignee: &ActingUser,
    ) -> Bug {
        let new = NewBug {
            assignee: Some(assignee.id.clone()),
            ..NewBug::new(title, Category::Bug)
        };
        bugs::create_bug(&self.backend, &self.project.id, new, reporter)
            .await
            .unwrap()
    }

    /// Fresh copy of the fixture project.
    pub async fn project(&self) -> Project {
        projects::get_project(&self.backend, &self.project.id)
            .await
            .unwrap()
    }
}

/// Run the primebug binary in `dir`.
pub fn run_primebug_in_dir(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_primebug"))
        .args(args)
        .current_dir(dir)
        .env_remove("PRIMEBUG_USER")
        .env("NO_COLOR", "1")
        .env("RUST_LOG", "off")
        .output()
        .expect("Failed to execute primebug binary")
}

/// Run the primebug binary in `dir` as `user`, asserting success.
pub fn run_as(dir: &Path, user: &str, args: &[&str]) -> String {
    let mut full = vec!["--as", user];
    full.extend_from_slice(args);
    let output = run_primebug_in_dir(dir, &full);
    assert!(
        output.status.success(),
        "primebug {:?} failed: {}",
        full,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Run the primebug binary with `--json` as `user` and parse stdout.
pub fn run_json(dir: &Path, user: &str, args: &[&str]) -> serde_json::Value {
    let mut full = vec!["--json"];
    full.extend_from_slice(args);
    let stdout = run_as(dir, user, &full);
    serde_json::from_str(&stdout).unwrap_or_else(|e| panic!("invalid JSON ({e}): {stdout}"))
}
