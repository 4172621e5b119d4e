//! Batched writes.
//!
//! A [`WriteBatch`] groups write operations that commit together: either
//! every operation lands or none does. Preconditions pin the versions the
//! writer observed, which is how transactions detect concurrent writers.

use crate::document::{encode, DocKey};
use crate::error::Result;
use serde::Serialize;
use serde_json::{Map, Value};

/// Maximum number of write operations a single commit accepts.
pub const MAX_BATCH_WRITES: usize = 500;

/// One write inside a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Create or replace a document.
    Set {
        /// Target document.
        key: DocKey,
        /// Full document body.
        data: Map<String, Value>,
    },
    /// Merge top-level fields into an existing document.
    Update {
        /// Target document; must exist at commit time.
        key: DocKey,
        /// Fields to overwrite.
        fields: Map<String, Value>,
    },
    /// Remove a document. Deleting an absent document is not an error.
    Delete {
        /// Target document.
        key: DocKey,
    },
}

impl WriteOp {
    /// The document this operation writes.
    #[must_use]
    pub fn key(&self) -> &DocKey {
        match self {
            WriteOp::Set { key, .. } | WriteOp::Update { key, .. } | WriteOp::Delete { key } => key,
        }
    }
}

/// A version requirement checked atomically with the commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Precondition {
    /// Guarded document.
    pub key: DocKey,
    /// Required version; `None` requires the document to be absent.
    pub expected: Option<u64>,
}

/// An all-or-nothing group of writes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
    preconditions: Vec<Precondition>,
}

impl WriteBatch {
    /// Create an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace `key` with the serialized `value`.
    ///
    /// # Errors
    ///
    /// Fails if `value` does not serialize to a JSON object.
    pub fn set<T: Serialize>(&mut self, key: &DocKey, value: &T) -> Result<&mut Self> {
        let data = encode(key, value)?;
        self.ops.push(WriteOp::Set {
            key: key.clone(),
            data,
        });
        Ok(self)
    }

    /// Create or replace `key` with a raw JSON value.
    ///
    /// # Errors
    ///
    /// Fails if `value` is not a JSON object.
    pub fn set_raw(&mut self, key: &DocKey, value: Value) -> Result<&mut Self> {
        self.set(key, &value)
    }

    /// Merge `fields` into the existing document at `key`.
    ///
    /// # Errors
    ///
    /// Fails if `fields` does not serialize to a JSON object.
    pub fn update<T: Serialize>(&mut self, key: &DocKey, fields: &T) -> Result<&mut Self> {
        let fields = encode(key, fields)?;
        self.ops.push(WriteOp::Update {
            key: key.clone(),
            fields,
        });
        Ok(self)
    }

    /// Delete `key`.
    pub fn delete(&mut self, key: &DocKey) -> &mut Self {
        self.ops.push(WriteOp::Delete { key: key.clone() });
        self
    }

    /// Require `key` to still be at `version` when the batch commits.
    pub fn require_version(&mut self, key: &DocKey, version: u64) -> &mut Self {
        self.require(key, Some(version))
    }

    /// Require `key` to not exist when the batch commits.
    pub fn require_absent(&mut self, key: &DocKey) -> &mut Self {
        self.require(key, None)
    }

    fn require(&mut self, key: &DocKey, expected: Option<u64>) -> &mut Self {
        self.preconditions.push(Precondition {
            key: key.clone(),
            expected,
        });
        self
    }

    /// Write operations in submission order.
    #[must_use]
    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    /// Preconditions in submission order.
    #[must_use]
    pub fn preconditions(&self) -> &[Precondition] {
        &self.preconditions
    }

    /// Number of write operations (preconditions are not counted).
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns `true` if the batch has no write operations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Returns `true` if any operation writes to `collection`.
    #[must_use]
    pub fn touches(&self, collection: &str) -> bool {
        self.ops.iter().any(|op| op.key().collection == collection)
    }
}

/// Split deletions of `keys` into batches of at most [`MAX_BATCH_WRITES`].
///
/// The caller commits the returned batches sequentially. There is no
/// rollback across batches: if one fails, earlier batches stay committed.
pub fn delete_batches(keys: impl IntoIterator<Item = DocKey>) -> Vec<WriteBatch> {
    let mut batches = Vec::new();
    let mut current = WriteBatch::new();
    for key in keys {
        if current.len() == MAX_BATCH_WRITES {
            batches.push(std::mem::take(&mut current));
        }
        current.delete(&key);
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}
