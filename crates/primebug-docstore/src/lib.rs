//! Versioned JSON document store for PrimeBug.
//!
//! This crate is the backing-store contract the bug tracker is written
//! against: schemaless documents grouped in collections, equality and
//! membership queries, size-limited write batches and optimistic
//! multi-document transactions.
//!
//! # Example
//!
//! ```
//! use primebug_docstore::{open_store, run_transaction, DocKey, StoreBackend};
//! use serde_json::json;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> primebug_docstore::Result<()> {
//!     let store = open_store(StoreBackend::InMemory).await?;
//!     let counter = DocKey::new("counters", "tickets");
//!
//!     let next = run_transaction(store.as_ref(), &[counter.clone()], 5, |snapshot, batch| {
//!         let current = snapshot
//!             .get_raw(&counter)
//!             .and_then(|doc| doc.data.get("value").and_then(|v| v.as_u64()))
//!             .unwrap_or(0);
//!         batch.set_raw(&counter, json!({ "value": current + 1 }))?;
//!         Ok::<_, primebug_docstore::Error>(current + 1)
//!     })
//!     .await?;
//!
//!     assert_eq!(next, 1);
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod batch;
pub mod document;
pub mod error;
pub mod jsonl;
pub mod memory;
pub mod query;
pub mod store;
pub mod transaction;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use batch::{delete_batches, Precondition, WriteBatch, WriteOp, MAX_BATCH_WRITES};
pub use document::{DocKey, VersionedDocument};
pub use error::{Error, Result};
pub use query::{Filter, Order, Query, MAX_IN_FILTER_VALUES};
pub use store::{open_store, DocumentStore, StoreBackend};
pub use transaction::{run_transaction, TxSnapshot};
