//! Notifications follow primary writes and never fail them.

mod common;

use common::{ana, ben, carla, Fixture};
use primebug::config::ServiceSettings;
use primebug::domain::{
    BugEdit, BugStatus, NotificationId, NotificationIntent, NotificationKind, UserId,
};
use primebug::services::{bugs, notifications};
use primebug::Error;

async fn of_kind(fixture: &Fixture, user: &UserId, kind: NotificationKind) -> usize {
    notifications::list_notifications(&fixture.backend, user, false)
        .await
        .unwrap()
        .iter()
        .filter(|n| n.kind == kind)
        .count()
}

#[tokio::test]
async fn test_project_members_are_told_they_joined() {
    let fixture = Fixture::new().await;
    assert_eq!(
        of_kind(&fixture, &ben().id, NotificationKind::ProjectAssigned).await,
        1
    );
    // The creator added themselves implicitly.
    assert_eq!(
        of_kind(&fixture, &ana().id, NotificationKind::ProjectAssigned).await,
        0
    );
}

#[tokio::test]
async fn test_assignment_notifies_assignee_only() {
    let fixture = Fixture::new().await;
    let bug = fixture.assigned_bug("Broken cart", &ana(), &ben()).await;

    let inbox = notifications::list_notifications(&fixture.backend, &ben().id, true)
        .await
        .unwrap();
    let assigned: Vec<_> = inbox
        .iter()
        .filter(|n| n.kind == NotificationKind::BugAssigned)
        .collect();
    assert_eq!(assigned.len(), 1);
    assert_eq!(assigned[0].sender_name, "Ana");
    assert!(assigned[0].title.contains(bug.ticket_number.as_str()));
    assert!(assigned[0].link.contains(bug.id.as_str()));
    assert!(!assigned[0].read);

    assert_eq!(
        of_kind(&fixture, &ana().id, NotificationKind::BugAssigned).await,
        0
    );
}

#[tokio::test]
async fn test_self_assignment_is_silent() {
    let fixture = Fixture::new().await;
    fixture.assigned_bug("Mine", &ben(), &ben()).await;
    assert_eq!(
        of_kind(&fixture, &ben().id, NotificationKind::BugAssigned).await,
        0
    );
}

#[tokio::test]
async fn test_status_change_notifies_followers_but_not_actor() {
    let fixture = Fixture::new().await;
    let bug = fixture.assigned_bug("Flaky test", &ana(), &ben()).await;

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

    assert_eq!(
        of_kind(&fixture, &ana().id, NotificationKind::BugStatusChanged).await,
        1
    );
    assert_eq!(
        of_kind(&fixture, &ben().id, NotificationKind::BugStatusChanged).await,
        0
    );
    assert_eq!(
        of_kind(&fixture, &carla().id, NotificationKind::BugStatusChanged).await,
        0
    );
}

#[tokio::test]
async fn test_reassignment_notifies_new_assignee() {
    let fixture = Fixture::new().await;
    let bug = fixture.assigned_bug("Handover", &ana(), &ben()).await;

    bugs::edit_bug(
        &fixture.backend,
        &bug.id,
        BugEdit {
            assignee: Some(Some(carla().id)),
            ..BugEdit::default()
        },
        &ana(),
    )
    .await
    .unwrap();

    assert_eq!(
        of_kind(&fixture, &carla().id, NotificationKind::BugAssigned).await,
        1
    );
    assert_eq!(
        of_kind(&fixture, &ben().id, NotificationKind::BugAssigned).await,
        1
    );
}

#[tokio::test]
async fn test_empty_recipient_is_a_no_op() {
    let fixture = Fixture::new().await;
    let queued = fixture.backend.outbox().enqueue(NotificationIntent {
        recipient: UserId::new(""),
        sender_name: "Ana".to_string(),
        kind: NotificationKind::BugAssigned,
        title: "Nobody".to_string(),
        message: "Nobody".to_string(),
        link: String::new(),
    });

    assert!(!queued);
    assert_eq!(fixture.backend.outbox().pending(), 0);
    let report = fixture.backend.flush_notifications().await;
    assert_eq!(report.delivered, 0);
}

#[tokio::test]
async fn test_delivery_failure_does_not_fail_the_operation() {
    let settings = ServiceSettings {
        max_delivery_attempts: 3,
        ..ServiceSettings::default()
    };
    let (fixture, store) = Fixture::faulty(settings).await;
    store.fail_commits_touching("notifications");

    let bug = fixture.assigned_bug("Outage", &ana(), &ben()).await;

    bugs::get_bug(&fixture.backend, &bug.id).await.unwrap();
    assert_eq!(
        of_kind(&fixture, &ben().id, NotificationKind::BugAssigned).await,
        0
    );
    assert_eq!(fixture.backend.outbox().pending(), 1);

    store.clear();
    let report = fixture.backend.flush_notifications().await;
    assert_eq!(report.delivered, 1);
    assert_eq!(
        of_kind(&fixture, &ben().id, NotificationKind::BugAssigned).await,
        1
    );
}

#[tokio::test]
async fn test_undeliverable_notification_is_dropped() {
    let settings = ServiceSettings {
        max_delivery_attempts: 2,
        ..ServiceSettings::default()
    };
    let (fixture, store) = Fixture::faulty(settings).await;
    store.fail_commits_touching("notifications");

    fixture.assigned_bug("Outage", &ana(), &ben()).await;
    let report = fixture.backend.flush_notifications().await;

    assert_eq!(report.dropped, 1);
    assert_eq!(fixture.backend.outbox().pending(), 0);
}

#[tokio::test]
async fn test_mark_read_rules() {
    let fixture = Fixture::new().await;
    fixture.assigned_bug("Read me", &ana(), &ben()).await;
    let inbox = notifications::list_notifications(&fixture.backend, &ben().id, true)
        .await
        .unwrap();
    assert_eq!(inbox.len(), 2);

    let err = notifications::mark_read(&fixture.backend, &inbox[0].id, &carla())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Permission(_)));

    let read = notifications::mark_read(&fixture.backend, &inbox[0].id, &ben())
        .await
        .unwrap();
    assert!(read.read);
    assert_eq!(
        notifications::unread_count(&fixture.backend, &ben().id)
            .await
            .unwrap(),
        1
    );

    let marked = notifications::mark_all_read(&fixture.backend, &ben())
        .await
        .unwrap();
    assert_eq!(marked, 1);
    assert_eq!(
        notifications::unread_count(&fixture.backend, &ben().id)
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn test_mark_read_unknown_id() {
    let fixture = Fixture::new().await;
    let err = notifications::mark_read(
        &fixture.backend,
        &NotificationId::new("missing"),
        &ben(),
    )
    .await
    .unwrap_err();
    assert!(err.is_not_found());
}
