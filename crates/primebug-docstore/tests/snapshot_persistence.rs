//! JSONL-backed stores survive restarts and tolerate damaged snapshots.

use primebug_docstore::{open_store, DocKey, Query, StoreBackend, WriteBatch};
use serde_json::json;
use std::path::Path;
use tempfile::TempDir;

async fn open(path: &Path) -> std::sync::Arc<dyn primebug_docstore::DocumentStore> {
    open_store(StoreBackend::Jsonl(path.to_path_buf()))
        .await
        .unwrap()
}

fn bug(id: &str) -> DocKey {
    DocKey::new("bugs", id)
}

#[tokio::test]
async fn test_saved_documents_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("documents.jsonl");

    let store = open(&path).await;
    let mut batch = WriteBatch::new();
    batch
        .set_raw(&bug("b1"), json!({ "title": "Crash", "proyecto_id": "web" }))
        .unwrap()
        .set_raw(&bug("b2"), json!({ "title": "Typo", "proyecto_id": "api" }))
        .unwrap();
    store.commit(batch).await.unwrap();
    store.save().await.unwrap();
    let saved_version = store.get(&bug("b2")).await.unwrap().unwrap().version;

    let reopened = open(&path).await;
    let web = reopened
        .query(&Query::collection("bugs").eq("proyecto_id", "web"))
        .await
        .unwrap();
    assert_eq!(web.len(), 1);
    assert_eq!(web[0].data["title"], "Crash");

    // The write counter resumes past every loaded version.
    let mut batch = WriteBatch::new();
    batch.set_raw(&bug("b3"), json!({ "title": "New" })).unwrap();
    reopened.commit(batch).await.unwrap();
    let fresh = reopened.get(&bug("b3")).await.unwrap().unwrap();
    assert!(fresh.version > saved_version);
}

#[tokio::test]
async fn test_missing_and_empty_files_open_empty() {
    let dir = TempDir::new().unwrap();

    let missing = open(&dir.path().join("absent.jsonl")).await;
    assert!(missing.export_all().await.unwrap().is_empty());

    let empty_path = dir.path().join("empty.jsonl");
    tokio::fs::write(&empty_path, "").await.unwrap();
    let empty = open(&empty_path).await;
    assert!(empty.export_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_malformed_lines_are_skipped() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("documents.jsonl");
    let good = json!({
        "key": { "collection": "bugs", "id": "b1" },
        "version": 7,
        "data": { "title": "Survivor" }
    });
    let contents = format!("{good}\nnot json at all\n\n{{\"key\": 1}}\n");
    tokio::fs::write(&path, contents).await.unwrap();

    let store = open(&path).await;
    let docs = store.export_all().await.unwrap();

    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].key, bug("b1"));
    assert_eq!(docs[0].version, 7);
}

#[tokio::test]
async fn test_reload_discards_unsaved_writes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("documents.jsonl");
    let store = open(&path).await;

    let mut batch = WriteBatch::new();
    batch.set_raw(&bug("kept"), json!({ "n": 1 })).unwrap();
    store.commit(batch).await.unwrap();
    store.save().await.unwrap();

    let mut batch = WriteBatch::new();
    batch.set_raw(&bug("dropped"), json!({ "n": 2 })).unwrap();
    store.commit(batch).await.unwrap();
    store.reload().await.unwrap();

    assert!(store.get(&bug("kept")).await.unwrap().is_some());
    assert!(store.get(&bug("dropped")).await.unwrap().is_none());
}

#[tokio::test]
async fn test_repeated_saves_are_identical() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("documents.jsonl");
    let store = open(&path).await;

    let mut batch = WriteBatch::new();
    for id in ["c", "a", "b"] {
        batch.set_raw(&bug(id), json!({ "id": id })).unwrap();
    }
    store.commit(batch).await.unwrap();

    store.save().await.unwrap();
    let first = tokio::fs::read_to_string(&path).await.unwrap();
    store.save().await.unwrap();
    let second = tokio::fs::read_to_string(&path).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.lines().count(), 3);
    assert!(!path.with_extension("tmp").exists());
}
