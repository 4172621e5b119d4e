//! CLI value enums and domain type conversions.
//!
//! This module contains the value enums used for CLI argument parsing
//! and their conversions to domain types.

use clap::ValueEnum;

use crate::config::BackendKind;
use crate::domain::{
    BugStatus, Category, Priority, ProjectRole, ProjectStatus, Resolution, TeamRole,
};

// ============================================================================
// Value Enums
// ============================================================================

/// Storage backend for `init`
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendArg {
    /// Documents persisted to a JSONL snapshot
    #[default]
    Jsonl,
    /// Ephemeral, nothing survives the process
    Memory,
}

/// Bug category for CLI arguments
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryArg {
    /// Defect
    Bug,
    /// Enhancement
    Improvement,
    /// Plain task
    Task,
    /// Visual-only issue
    Cosmetic,
    /// Concern spanning several areas
    #[value(name = "cross-cutting", alias = "cross_cutting")]
    CrossCutting,
}

/// Bug priority for CLI arguments
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorityArg {
    /// Low
    Low,
    /// Medium
    Medium,
    /// High
    High,
    /// Critical
    Critical,
}

/// Bug status for CLI arguments
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BugStatusArg {
    /// Newly reported
    Open,
    /// Being worked on
    #[value(name = "in_progress", alias = "in-progress")]
    InProgress,
    /// Fixed, awaiting verification
    Resolved,
    /// Verified and closed
    Closed,
    /// Came back after being resolved or closed
    Reopened,
}

/// Resolution recorded when a bug is resolved
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionArg {
    /// The work is done
    Completed,
    /// Turned into a new requirement
    #[value(name = "new-requirement", alias = "new_requirement")]
    NewRequirement,
    /// Duplicate of another bug
    Duplicate,
    /// Not applicable
    #[value(name = "not-applicable", alias = "not_applicable")]
    NotApplicable,
}

/// Project lifecycle status for CLI arguments
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectStatusArg {
    /// Work in progress
    Active,
    /// Paused
    Standby,
    /// Finished
    Closed,
}

/// Assignable project role; the creator role is never granted
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProjectRoleArg {
    /// May manage members and settings
    Admin,
    /// Regular member
    #[default]
    Member,
}

/// Team role for CLI arguments
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TeamRoleArg {
    /// May manage the team
    Owner,
    /// Regular member
    #[default]
    Member,
}

// ============================================================================
// Domain Type Conversions
// ============================================================================

impl From<BackendArg> for BackendKind {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Jsonl => BackendKind::Jsonl,
            BackendArg::Memory => BackendKind::Memory,
        }
    }
}

impl From<CategoryArg> for Category {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::Bug => Category::Bug,
            CategoryArg::Improvement => Category::Improvement,
            CategoryArg::Task => Category::Task,
            CategoryArg::Cosmetic => Category::Cosmetic,
            CategoryArg::CrossCutting => Category::CrossCutting,
        }
    }
}

impl From<PriorityArg> for Priority {
    fn from(arg: PriorityArg) -> Self {
        match arg {
            PriorityArg::Low => Priority::Low,
            PriorityArg::Medium => Priority::Medium,
            PriorityArg::High => Priority::High,
            PriorityArg::Critical => Priority::Critical,
        }
    }
}

impl From<BugStatusArg> for BugStatus {
    fn from(arg: BugStatusArg) -> Self {
        match arg {
            BugStatusArg::Open => BugStatus::Open,
            BugStatusArg::InProgress => BugStatus::InProgress,
            BugStatusArg::Resolved => BugStatus::Resolved,
            BugStatusArg::Closed => BugStatus::Closed,
            BugStatusArg::Reopened => BugStatus::Reopened,
        }
    }
}

impl From<ResolutionArg> for Resolution {
    fn from(arg: ResolutionArg) -> Self {
        match arg {
            ResolutionArg::Completed => Resolution::Completed,
            ResolutionArg::NewRequirement => Resolution::NewRequirement,
            ResolutionArg::Duplicate => Resolution::Duplicate,
            ResolutionArg::NotApplicable => Resolution::NotApplicable,
        }
    }
}

impl From<ProjectStatusArg> for ProjectStatus {
    fn from(arg: ProjectStatusArg) -> Self {
        match arg {
            ProjectStatusArg::Active => ProjectStatus::Active,
            ProjectStatusArg::Standby => ProjectStatus::Standby,
            ProjectStatusArg::Closed => ProjectStatus::Closed,
        }
    }
}

impl From<ProjectRoleArg> for ProjectRole {
    fn from(arg: ProjectRoleArg) -> Self {
        match arg {
            ProjectRoleArg::Admin => ProjectRole::Admin,
            ProjectRoleArg::Member => ProjectRole::Member,
        }
    }
}

impl From<TeamRoleArg> for TeamRole {
    fn from(arg: TeamRoleArg) -> Self {
        match arg {
            TeamRoleArg::Owner => TeamRole::Owner,
            TeamRoleArg::Member => TeamRole::Member,
        }
    }
}
