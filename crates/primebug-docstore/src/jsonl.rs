//! JSONL snapshot persistence for the in-memory engine.
//!
//! Each line of a snapshot file is one serialized [`VersionedDocument`].
//! Loading is resilient: malformed lines are skipped and reported as
//! [`LoadWarning`]s instead of failing the whole load. Saving is atomic:
//! the snapshot is written to a temporary file which is then renamed over
//! the target.

use crate::document::{DocKey, VersionedDocument};
use crate::error::Result;
use crate::memory::MemoryState;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};

/// Non-fatal problems found while loading a snapshot.
///
/// The load continues past every warning; the affected line is skipped or
/// superseded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadWarning {
    /// Line could not be parsed as a versioned document.
    ///
    /// **Effect**: the line is skipped.
    MalformedJson {
        /// 1-based line number.
        line_number: usize,
        /// Parser message.
        error: String,
    },

    /// The same key appears more than once.
    ///
    /// **Effect**: the later line wins.
    DuplicateKey {
        /// The repeated key.
        key: DocKey,
        /// 1-based line number of the later occurrence.
        line_number: usize,
    },
}

/// Read a snapshot file into engine state.
///
/// The write counter resumes from the highest version found so versions
/// stay unique after a restart.
///
/// # Errors
///
/// Returns `Error::Io` if the file cannot be opened or read.
pub(crate) async fn load_snapshot(path: &Path) -> Result<(MemoryState, Vec<LoadWarning>)> {
    let file = File::open(path).await?;
    let mut lines = BufReader::new(file).lines();

    let mut state = MemoryState::default();
    let mut warnings = Vec::new();
    let mut line_number = 0;

    while let Some(line) = lines.next_line().await? {
        line_number += 1;
        if line.trim().is_empty() {
            continue;
        }

        let doc: VersionedDocument = match serde_json::from_str(&line) {
            Ok(doc) => doc,
            Err(e) => {
                warnings.push(LoadWarning::MalformedJson {
                    line_number,
                    error: e.to_string(),
                });
                continue;
            }
        };

        state.last_version = state.last_version.max(doc.version);
        if let Some(previous) = state.docs.insert(doc.key.clone(), doc) {
            warnings.push(LoadWarning::DuplicateKey {
                key: previous.key,
                line_number,
            });
        }
    }

    Ok((state, warnings))
}

/// Write engine state to a snapshot file atomically.
///
/// Documents are written in key order so repeated saves of the same
/// state produce identical files.
///
/// # Errors
///
/// Returns `Error::Io` or `Error::Json` if writing fails; the previous
/// snapshot (if any) is left untouched.
pub(crate) async fn save_snapshot(state: &MemoryState, path: &Path) -> Result<()> {
    let temp_path = path.with_extension("tmp");

    let file = File::create(&temp_path).await?;
    let mut writer = BufWriter::new(file);

    for doc in state.docs.values() {
        let json = serde_json::to_string(doc)?;
        writer.write_all(json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
    }

    writer.flush().await?;
    tokio::fs::rename(&temp_path, path).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::WriteBatch;
    use crate::memory::MemoryStore;
    use crate::store::DocumentStore;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_skips_malformed_lines() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("documents.jsonl");
        let good = json!({
            "key": { "collection": "bugs", "id": "b1" },
            "version": 7,
            "data": { "title": "ok" }
        });
        let content = format!("{good}\n{{not json\n\n");
        tokio::fs::write(&path, content).await.unwrap();

        let (state, warnings) = load_snapshot(&path).await.unwrap();

        assert_eq!(state.docs.len(), 1);
        assert_eq!(state.last_version, 7);
        assert_eq!(warnings.len(), 1);
        assert!(matches!(
            warnings[0],
            LoadWarning::MalformedJson { line_number: 2, .. }
        ));
    }

    #[tokio::test]
    async fn test_load_reports_duplicate_keys() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("documents.jsonl");
        let first = json!({
            "key": { "collection": "bugs", "id": "b1" },
            "version": 1,
            "data": { "title": "old" }
        });
        let second = json!({
            "key": { "collection": "bugs", "id": "b1" },
            "version": 2,
            "data": { "title": "new" }
        });
        tokio::fs::write(&path, format!("{first}\n{second}\n"))
            .await
            .unwrap();

        let (state, warnings) = load_snapshot(&path).await.unwrap();

        let doc = &state.docs[&DocKey::new("bugs", "b1")];
        assert_eq!(doc.data["title"], json!("new"));
        assert!(matches!(
            warnings[0],
            LoadWarning::DuplicateKey { line_number: 2, .. }
        ));
    }

    #[tokio::test]
    async fn test_saved_snapshot_reopens_with_same_documents() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("documents.jsonl");

        let store = MemoryStore::open(path.clone()).await.unwrap();
        let mut batch = WriteBatch::new();
        batch
            .set_raw(&DocKey::new("projects", "web"), json!({ "sigla": "WEB" }))
            .unwrap();
        batch
            .set_raw(&DocKey::new("bugs", "b1"), json!({ "numero_bug": "WEB-1" }))
            .unwrap();
        store.commit(batch).await.unwrap();
        store.save().await.unwrap();
        assert!(!path.with_extension("tmp").exists());

        let reopened = MemoryStore::open(path).await.unwrap();
        assert_eq!(
            reopened.export_all().await.unwrap(),
            store.export_all().await.unwrap()
        );
    }
}
