//! Error types for PrimeBug services.
//!
//! Every service call returns [`Result`]. Callers show the message and
//! leave their own state untouched on failure.

use crate::domain::{BugId, BugStatus, NotificationId, ProjectId, TeamId, UserId};
use std::io;
use thiserror::Error;

/// The error type for PrimeBug operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Project not found.
    #[error("Project not found: {0}")]
    ProjectNotFound(ProjectId),

    /// Bug not found.
    #[error("Bug not found: {0}")]
    BugNotFound(BugId),

    /// Team not found.
    #[error("Team not found: {0}")]
    TeamNotFound(TeamId),

    /// User profile not found.
    #[error("User not found: {0}")]
    ProfileNotFound(UserId),

    /// Notification not found.
    #[error("Notification not found: {0}")]
    NotificationNotFound(NotificationId),

    /// Missing or malformed input.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The requested status change is not an edge of the workflow.
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        /// Current status.
        from: BugStatus,
        /// Requested status.
        to: BugStatus,
    },

    /// The caller's view of the bug's status is out of date.
    #[error("Bug status changed concurrently: expected {expected}, found {actual}")]
    StaleStatus {
        /// Status the caller believed the bug had.
        expected: BugStatus,
        /// Status actually stored.
        actual: BugStatus,
    },

    /// The acting user may not perform this mutation.
    #[error("Permission denied: {0}")]
    Permission(String),

    /// Blob or document storage failure.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// An optimistic transaction kept conflicting past its retry budget.
    #[error("Transaction conflict: gave up after {attempts} attempts")]
    TransactionConflict {
        /// Attempts made before giving up.
        attempts: u32,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error occurred.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns `true` for the "referenced entity does not exist" family.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::ProjectNotFound(_)
                | Error::BugNotFound(_)
                | Error::TeamNotFound(_)
                | Error::ProfileNotFound(_)
                | Error::NotificationNotFound(_)
        )
    }
}

/// Storage-specific errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Attachment exceeds the configured size limit.
    #[error("File '{name}' is {size} bytes; the limit is {limit} bytes")]
    FileTooLarge {
        /// File name.
        name: String,
        /// Actual size.
        size: u64,
        /// Configured limit.
        limit: u64,
    },

    /// Blob upload failed.
    #[error("Upload of '{path}' failed: {reason}")]
    Upload {
        /// Target blob path.
        path: String,
        /// Underlying failure.
        reason: String,
    },

    /// Blob deletion failed.
    #[error("Deletion of '{path}' failed: {reason}")]
    Delete {
        /// Blob path.
        path: String,
        /// Underlying failure.
        reason: String,
    },

    /// The document store rejected the operation.
    #[error("Document store error: {0}")]
    Backend(primebug_docstore::Error),
}

impl From<primebug_docstore::Error> for Error {
    fn from(err: primebug_docstore::Error) -> Self {
        match err {
            primebug_docstore::Error::TransactionExhausted { attempts } => {
                Error::TransactionConflict { attempts }
            }
            primebug_docstore::Error::Json(e) => Error::Json(e),
            primebug_docstore::Error::Io(e) => Error::Io(e),
            other => Error::Storage(StorageError::Backend(other)),
        }
    }
}

/// A specialized Result type for PrimeBug operations.
pub type Result<T> = std::result::Result<T, Error>;
