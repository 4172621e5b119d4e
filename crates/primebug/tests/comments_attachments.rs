//! Comments, system comments and attachment handling.

mod common;

use common::{ana, ben, carla, dario, Fixture};
use primebug::blob::BlobKind;
use primebug::config::ServiceSettings;
use primebug::domain::{BugStatus, NewComment, NotificationKind};
use primebug::error::StorageError;
use primebug::services::{attachments, bugs, comments, notifications};
use primebug::Error;

#[tokio::test]
async fn test_empty_comment_is_rejected() {
    let fixture = Fixture::new().await;
    let bug = fixture.bug("Crash on save", &ana()).await;

    for new in [NewComment::default(), NewComment::text("   \n ")] {
        let err = comments::add_comment(&fixture.backend, &bug.id, new, &ben())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)), "got {err:?}");
    }
    assert!(comments::list_comments(&fixture.backend, &bug.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_only_project_members_comment() {
    let fixture = Fixture::new().await;
    let bug = fixture.bug("Crash on save", &ana()).await;
    let err = comments::add_comment(&fixture.backend, &bug.id, NewComment::text("Hi"), &dario())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Permission(_)));
}

#[tokio::test]
async fn test_comment_notifies_creator_and_assignee() {
    let fixture = Fixture::new().await;
    let bug = fixture.assigned_bug("Crash on save", &ana(), &carla()).await;

    let comment = comments::add_comment(
        &fixture.backend,
        &bug.id,
        NewComment::text("  Reproduced on staging  "),
        &ben(),
    )
    .await
    .unwrap();
    assert_eq!(comment.text.as_deref(), Some("Reproduced on staging"));
    assert_eq!(comment.author.id, ben().id);
    assert!(!comment.system);

    for (user, expected) in [(ana(), 1), (carla(), 1), (ben(), 0)] {
        let count = notifications::list_notifications(&fixture.backend, &user.id, false)
            .await
            .unwrap()
            .iter()
            .filter(|n| n.kind == NotificationKind::BugCommented)
            .count();
        assert_eq!(count, expected, "{}", user.id);
    }
}

#[tokio::test]
async fn test_system_comment_is_flagged_and_silent() {
    let fixture = Fixture::new().await;
    let bug = fixture.bug("Closing soon", &ben()).await;

    comments::add_comment(&fixture.backend, &bug.id, NewComment::text("First"), &ben())
        .await
        .unwrap();
    let system = comments::add_system_comment(
        &fixture.backend,
        &bug.id,
        "Closed by Ana on 2026-10-19",
        &ana(),
    )
    .await
    .unwrap();
    assert!(system.system);

    let listed = comments::list_comments(&fixture.backend, &bug.id).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[1].id, system.id);

    let commented = notifications::list_notifications(&fixture.backend, &ben().id, false)
        .await
        .unwrap()
        .iter()
        .filter(|n| n.kind == NotificationKind::BugCommented)
        .count();
    assert_eq!(commented, 0);
}

#[tokio::test]
async fn test_attachment_size_limit() {
    let settings = ServiceSettings {
        max_attachment_bytes: 16,
        ..ServiceSettings::default()
    };
    let fixture = Fixture::with_settings(settings).await;
    let bug = fixture.bug("Big file", &ana()).await;

    let err = attachments::upload_attachment(
        &fixture.backend,
        &fixture.project.id,
        bug.id.as_str(),
        BlobKind::Bug,
        "dump.bin",
        "application/octet-stream",
        &[0u8; 17],
    )
    .await
    .unwrap_err();

    assert!(
        matches!(
            err,
            Error::Storage(StorageError::FileTooLarge { size: 17, limit: 16, .. })
        ),
        "got {err:?}"
    );

    let exact = attachments::upload_attachment(
        &fixture.backend,
        &fixture.project.id,
        bug.id.as_str(),
        BlobKind::Bug,
        "dump.bin",
        "application/octet-stream",
        &[0u8; 16],
    )
    .await
    .unwrap();
    assert_eq!(exact.size, 16);
}

#[tokio::test]
async fn test_attach_to_open_bug_and_remove() {
    let fixture = Fixture::new().await;
    let bug = fixture.bug("Screenshot", &ben()).await;

    let updated = attachments::attach_to_bug(
        &fixture.backend,
        &bug.id,
        "screen.png",
        "image/png",
        b"\x89PNG",
        &ben(),
    )
    .await
    .unwrap();

    assert_eq!(updated.attachments.len(), 1);
    let attachment = &updated.attachments[0];
    assert_eq!(attachment.name, "screen.png");
    assert!(attachment
        .storage_path
        .starts_with(&format!("projects/{}/bugs/", fixture.project.id)));
    let stored = fixture
        .backend
        .blobs()
        .read(&attachment.storage_path)
        .await
        .unwrap();
    assert_eq!(stored.as_deref(), Some(&b"\x89PNG"[..]));

    attachments::remove_attachment(&fixture.backend, attachment)
        .await
        .unwrap();
    assert!(fixture
        .backend
        .blobs()
        .read(&attachment.storage_path)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_concurrent_attaches_keep_both_files() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = Fixture::with_blob_dir(dir.path()).await;
    let bug = fixture.bug("Two screenshots", &ben()).await;
    let author = ben();

    let (first, second) = tokio::join!(
        attachments::attach_to_bug(
            &fixture.backend,
            &bug.id,
            "before.png",
            "image/png",
            b"one",
            &author,
        ),
        attachments::attach_to_bug(
            &fixture.backend,
            &bug.id,
            "after.png",
            "image/png",
            b"two",
            &author,
        ),
    );
    first.unwrap();
    second.unwrap();

    let stored = bugs::get_bug(&fixture.backend, &bug.id).await.unwrap();
    let mut names: Vec<_> = stored.attachments.iter().map(|a| a.name.as_str()).collect();
    names.sort_unstable();
    assert_eq!(names, ["after.png", "before.png"]);
}

#[tokio::test]
async fn test_attach_after_open_is_rejected() {
    let fixture = Fixture::new().await;
    let bug = fixture.bug("Too late", &ben()).await;
    bugs::update_bug_status(
        &fixture.backend,
        &bug.id,
        BugStatus::InProgress,
        BugStatus::Open,
        None,
        &ben(),
    )
    .await
    .unwrap();

    let err = attachments::attach_to_bug(
        &fixture.backend,
        &bug.id,
        "late.txt",
        "text/plain",
        b"late",
        &ben(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::Validation(_)));
    let stored = bugs::get_bug(&fixture.backend, &bug.id).await.unwrap();
    assert!(stored.attachments.is_empty());
}
