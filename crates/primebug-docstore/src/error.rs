//! Error types for document store operations.

use crate::document::DocKey;
use std::io;
use thiserror::Error;

/// The error type for document store operations.
#[derive(Debug, Error)]
pub enum Error {
    /// IO error occurred while reading or writing a snapshot file.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON parsing or serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A precondition of a commit did not hold.
    ///
    /// `expected == None` means the document was required to be absent.
    #[error("Write conflict on {key}: expected version {expected:?}, found {actual:?}")]
    Conflict {
        /// The document whose version changed.
        key: DocKey,
        /// The version the writer observed.
        expected: Option<u64>,
        /// The version currently stored.
        actual: Option<u64>,
    },

    /// A transaction kept conflicting until its attempt budget ran out.
    #[error("Transaction aborted after {attempts} conflicting attempts")]
    TransactionExhausted {
        /// Number of attempts made.
        attempts: u32,
    },

    /// A batch holds more write operations than a single commit accepts.
    #[error("Batch holds {count} writes; at most {limit} are allowed per commit")]
    BatchTooLarge {
        /// Number of operations in the batch.
        count: usize,
        /// The per-commit limit.
        limit: usize,
    },

    /// An `in` filter lists more values than the query engine accepts.
    #[error("Filter on '{field}' lists {count} values; at most {limit} are allowed")]
    InFilterTooLarge {
        /// The filtered field.
        field: String,
        /// Number of values supplied.
        count: usize,
        /// The per-filter limit.
        limit: usize,
    },

    /// A partial update targeted a document that does not exist.
    #[error("Document not found: {0}")]
    MissingDocument(DocKey),

    /// A value could not be stored as a document (documents must be JSON objects).
    #[error("Invalid document {key}: {reason}")]
    InvalidDocument {
        /// The document key.
        key: DocKey,
        /// Why the value was rejected.
        reason: String,
    },

    /// The backend refused the request.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

impl Error {
    /// Returns `true` if this error is an optimistic-concurrency conflict
    /// that a transaction may retry.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict { .. })
    }
}

/// A specialized Result type for document store operations.
pub type Result<T> = std::result::Result<T, Error>;
