// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Send behavior of the Dispatcher against the in-memory store and mock notifier.

use std::collections::HashSet;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, TimeZone, Utc};

use cadence_core::QueueRepository;
use cadence_core::types::{AssignmentStatus, Channel, Payload, QueueItem, QueueStatus, TemplateSlug};
use cadence_test_utils::TestHarness;
use cadence_test_utils::fixtures;

/// Wednesday 10:00 UTC, inside the default 09:00-20:00 Mon-Fri window.
fn wednesday_10am() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 14, 10, 0, 0).unwrap()
}

/// Seed an assignment and an in-flight queue item that already failed `attempts` times.
async fn seed_retrying(harness: &TestHarness, id: &str, attempts: u32, now: DateTime<Utc>) -> String {
    let assignment = fixtures::assignment(id, Some(now - Duration::hours(1)));
    harness.store.put_assignment(assignment.clone()).await;
    let mut item = QueueItem::scheduled(
        &assignment,
        Channel::Whatsapp,
        TemplateSlug::Overdue,
        Payload::new(),
        now,
        now - Duration::hours(1),
    );
    if attempts > 0 {
        item.status = QueueStatus::Retrying;
        item.attempt_count = attempts;
        item.last_error = Some("earlier failure".into());
    }
    let id = item.id.clone();
    harness.store.insert_raw(item).await;
    id
}

#[tokio::test]
async fn ready_items_are_sent_and_marked_sent() {
    let harness = TestHarness::builder().build();
    let now = wednesday_10am();
    harness
        .store
        .put_assignment(fixtures::assignment("a1", Some(now + Duration::hours(2))))
        .await;
    harness
        .store
        .put_assignment(fixtures::assignment("a2", Some(now - Duration::hours(2))))
        .await;
    harness.run_build(now).await.unwrap();

    let report = harness.run_dispatch(now, 50).await.unwrap();

    assert_eq!(report.processed, 2);
    assert_eq!(report.sent, 2);
    assert_eq!(report.failed, 0);
    assert_eq!(harness.notifier.sent_count().await, 2);

    for item in harness.store.items().await {
        assert_eq!(item.status, QueueStatus::Sent);
        assert_eq!(item.attempt_count, 1);
        assert_eq!(item.sent_at, Some(now));
        assert_eq!(item.last_error, None);
    }

    let overdue = harness
        .notifier
        .sent_messages()
        .await
        .into_iter()
        .find(|m| m.recipient.patient_id == "pat-a2")
        .unwrap();
    assert!(overdue.body.starts_with("Action needed"));
    assert!(overdue.body.contains("Exercise a2"));
}

#[tokio::test]
async fn items_not_yet_due_are_left_alone() {
    let harness = TestHarness::builder().build();
    // Saturday: the item is scheduled for Monday 09:00.
    let now = Utc.with_ymd_and_hms(2026, 10, 17, 10, 0, 0).unwrap();
    harness
        .store
        .put_assignment(fixtures::assignment("a1", Some(now)))
        .await;
    harness.run_build(now).await.unwrap();

    let report = harness.run_dispatch(now, 50).await.unwrap();
    assert_eq!(report.processed, 0);
    assert_eq!(harness.notifier.call_count(), 0);

    let monday = Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap();
    let report = harness.run_dispatch(monday, 50).await.unwrap();
    assert_eq!(report.sent, 1);
}

#[tokio::test]
async fn inactive_assignments_are_canceled_without_sending() {
    let harness = TestHarness::builder().build();
    let now = wednesday_10am();
    for id in ["paused", "completed", "canceled", "deleted"] {
        harness
            .store
            .put_assignment(fixtures::assignment(id, Some(now)))
            .await;
    }
    harness.run_build(now).await.unwrap();

    harness
        .store
        .set_assignment_status("paused", AssignmentStatus::Paused)
        .await;
    harness
        .store
        .set_assignment_status("completed", AssignmentStatus::Completed)
        .await;
    harness
        .store
        .set_assignment_status("canceled", AssignmentStatus::Canceled)
        .await;
    harness.store.remove_assignment("deleted").await;

    let report = harness.run_dispatch(now, 50).await.unwrap();

    assert_eq!(report.processed, 4);
    assert_eq!(report.canceled, 4);
    assert_eq!(report.sent, 0);
    assert_eq!(harness.notifier.call_count(), 0);
    for item in harness.store.items().await {
        assert_eq!(item.status, QueueStatus::Canceled);
        assert_eq!(item.attempt_count, 0);
    }
}

#[tokio::test]
async fn second_failure_retries_after_twice_the_backoff() {
    let harness = TestHarness::builder().build();
    let now = wednesday_10am();
    let id = seed_retrying(&harness, "a1", 1, now).await;
    harness.notifier.fail_always("gateway returned 503").await;

    let report = harness.run_dispatch(now, 50).await.unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(report.retried, 1);
    let item = harness.store.get_item(&id).await.unwrap().unwrap();
    assert_eq!(item.status, QueueStatus::Retrying);
    assert_eq!(item.attempt_count, 2);
    assert_eq!(item.next_attempt_at, now + Duration::minutes(60));
    assert_eq!(
        item.last_error.as_deref(),
        Some("delivery via whatsapp failed: gateway returned 503")
    );
}

#[tokio::test]
async fn retry_that_would_leave_the_window_waits_for_the_next_one() {
    let harness = TestHarness::builder().build();
    // Friday 19:50 + 30 minutes is past the 20:00 window end.
    let now = Utc.with_ymd_and_hms(2026, 10, 16, 19, 50, 0).unwrap();
    let id = seed_retrying(&harness, "a1", 0, now).await;
    harness.notifier.fail_always("timeout from carrier").await;

    harness.run_dispatch(now, 50).await.unwrap();

    let item = harness.store.get_item(&id).await.unwrap().unwrap();
    assert_eq!(item.status, QueueStatus::Retrying);
    assert_eq!(item.attempt_count, 1);
    assert_eq!(
        item.next_attempt_at,
        Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap()
    );
}

#[tokio::test]
async fn exhausted_retries_mark_the_item_failed() {
    let harness = TestHarness::builder().build();
    let now = wednesday_10am();
    let id = seed_retrying(&harness, "a1", 3, now).await;
    harness.notifier.fail_always("number unreachable").await;

    let report = harness.run_dispatch(now, 50).await.unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(report.retried, 0);
    let item = harness.store.get_item(&id).await.unwrap().unwrap();
    assert_eq!(item.status, QueueStatus::Failed);
    assert_eq!(item.attempt_count, 4);
    assert_eq!(item.next_attempt_at, now, "no further attempt is scheduled");
    assert!(item.last_error.unwrap().contains("number unreachable"));

    // Terminal items are never claimed again.
    let later = harness.run_dispatch(now + Duration::days(1), 50).await.unwrap();
    assert_eq!(later.processed, 0);
}

#[tokio::test(start_paused = true)]
async fn hanging_notifier_is_cut_off_and_retried() {
    let harness = TestHarness::builder()
        .with_send_timeout(StdDuration::from_secs(5))
        .build();
    let now = wednesday_10am();
    let id = seed_retrying(&harness, "a1", 0, now).await;
    harness.notifier.hang_always().await;

    let report = harness.run_dispatch(now, 50).await.unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(report.retried, 1);
    let item = harness.store.get_item(&id).await.unwrap().unwrap();
    assert_eq!(item.status, QueueStatus::Retrying);
    assert!(item.last_error.unwrap().contains("timed out"));
}

#[tokio::test]
async fn one_bad_item_does_not_affect_the_rest_of_the_batch() {
    let harness = TestHarness::builder().build();
    let now = wednesday_10am();
    for id in ["ok", "undeliverable", "unrecordable"] {
        harness
            .store
            .put_assignment(fixtures::assignment(id, Some(now)))
            .await;
    }
    harness.run_build(now).await.unwrap();
    harness
        .notifier
        .fail_for_patient("pat-undeliverable", "no phone on file")
        .await;
    let unrecordable = harness
        .store
        .items()
        .await
        .into_iter()
        .find(|item| item.assignment_id == "unrecordable")
        .unwrap();
    harness.store.fail_updates_for(&unrecordable.id).await;

    let report = harness.run_dispatch(now, 50).await.unwrap();

    assert_eq!(report.processed, 3);
    assert_eq!(report.sent, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.retried, 1);
    assert_eq!(report.errors, 1);

    let status_of = |items: &[QueueItem], id: &str| {
        items
            .iter()
            .find(|item| item.assignment_id == id)
            .map(|item| item.status)
    };
    let items = harness.store.items().await;
    assert_eq!(status_of(&items, "ok"), Some(QueueStatus::Sent));
    assert_eq!(status_of(&items, "undeliverable"), Some(QueueStatus::Retrying));
    assert_eq!(status_of(&items, "unrecordable"), Some(QueueStatus::Scheduled));
}

#[tokio::test]
async fn failed_claim_is_a_hard_error() {
    let harness = TestHarness::builder().build();
    harness.store.fail_claims(true).await;
    assert!(harness.run_dispatch(wednesday_10am(), 50).await.is_err());
}

#[tokio::test]
async fn unreadable_preference_falls_back_to_defaults() {
    let harness = TestHarness::builder().build();
    let now = wednesday_10am();
    let id = seed_retrying(&harness, "a1", 0, now).await;
    harness.store.fail_preferences(true).await;
    harness.notifier.fail_always("busy").await;

    harness.run_dispatch(now, 50).await.unwrap();

    let item = harness.store.get_item(&id).await.unwrap().unwrap();
    assert_eq!(item.status, QueueStatus::Retrying);
    assert_eq!(item.next_attempt_at, now + Duration::minutes(30));
}

#[tokio::test]
async fn batch_limit_takes_the_oldest_items_first() {
    let harness = TestHarness::builder().build();
    let now = wednesday_10am();
    for (offset, id) in [(3, "newest"), (9, "oldest"), (6, "middle")] {
        let assignment = fixtures::assignment(id, Some(now));
        harness.store.put_assignment(assignment.clone()).await;
        let created = now - Duration::minutes(offset);
        let item = QueueItem::scheduled(
            &assignment,
            Channel::Sms,
            TemplateSlug::Due,
            Payload::new(),
            created,
            created,
        );
        harness.store.insert(&item).await.unwrap();
    }

    let report = harness.run_dispatch(now, 2).await.unwrap();
    assert_eq!(report.processed, 2);

    let sent: HashSet<String> = harness
        .notifier
        .sent_messages()
        .await
        .into_iter()
        .map(|m| m.recipient.patient_id)
        .collect();
    assert_eq!(
        sent,
        HashSet::from(["pat-oldest".to_string(), "pat-middle".to_string()])
    );
}

#[tokio::test]
async fn zero_batch_limit_claims_nothing() {
    let harness = TestHarness::builder().build();
    let now = wednesday_10am();
    seed_retrying(&harness, "a1", 0, now).await;

    let report = harness.run_dispatch(now, 0).await.unwrap();
    assert_eq!(report.processed, 0);
    assert_eq!(harness.store.active_items().await.len(), 1);
}

#[tokio::test]
async fn abandoned_claims_are_picked_up_after_the_lease() {
    let harness = TestHarness::builder()
        .with_claim_lease(Duration::minutes(5))
        .build();
    let now = wednesday_10am();
    seed_retrying(&harness, "a1", 0, now).await;

    // A dispatcher claims the item and then dies.
    let abandoned = harness.store.claim_batch(now, 50).await.unwrap();
    assert_eq!(abandoned.len(), 1);

    let during_lease = harness.run_dispatch(now + Duration::minutes(1), 50).await.unwrap();
    assert_eq!(during_lease.processed, 0);

    let after_lease = harness.run_dispatch(now + Duration::minutes(5), 50).await.unwrap();
    assert_eq!(after_lease.sent, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_dispatchers_never_send_twice() {
    let harness = TestHarness::builder().with_max_concurrency(4).build();
    let now = wednesday_10am();
    for n in 0..40 {
        harness
            .store
            .put_assignment(fixtures::assignment(&format!("a{n}"), Some(now)))
            .await;
    }
    harness.run_build(now).await.unwrap();
    harness.notifier.set_delay(StdDuration::from_millis(5)).await;

    let first = harness.dispatcher();
    let second = harness.dispatcher();
    let third = harness.dispatcher();
    let (a, b, c) = tokio::join!(
        first.dispatch(now, 15),
        second.dispatch(now, 15),
        third.dispatch(now, 15),
    );
    let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());
    let drained = harness.run_dispatch(now, 50).await.unwrap();

    assert_eq!(a.processed + b.processed + c.processed + drained.processed, 40);
    assert_eq!(a.sent + b.sent + c.sent + drained.sent, 40);

    let sent = harness.notifier.sent_messages().await;
    assert_eq!(sent.len(), 40);
    let unique: HashSet<_> = sent.iter().map(|m| m.recipient.patient_id.clone()).collect();
    assert_eq!(unique.len(), 40);
    assert!(
        harness
            .store
            .items()
            .await
            .iter()
            .all(|item| item.status == QueueStatus::Sent && item.attempt_count == 1)
    );
}

/// Four ready items for four patients, built at `now`.
async fn seed_four(harness: &TestHarness, now: DateTime<Utc>) {
    for n in 1..=4 {
        harness
            .store
            .put_assignment(fixtures::assignment(&format!("a{n}"), Some(now)))
            .await;
    }
    assert_eq!(harness.run_build(now).await.unwrap().created, 4);
}

#[tokio::test(start_paused = true)]
async fn later_run_takes_over_an_expired_lease_without_a_second_send() {
    // One send at a time, two minutes each: the fourth item's lease runs out
    // at 10:05 while the first run is still busy with the third.
    let harness = TestHarness::builder()
        .with_claim_lease(Duration::minutes(5))
        .with_max_concurrency(1)
        .with_send_timeout(StdDuration::from_secs(180))
        .build();
    let start = wednesday_10am();
    seed_four(&harness, start).await;
    harness.notifier.set_delay(StdDuration::from_secs(120)).await;

    let slow = harness.dispatcher();
    let first = tokio::spawn(async move { slow.dispatch(start, 10).await });

    tokio::time::sleep(StdDuration::from_secs(330)).await;
    let second = harness
        .run_dispatch(start + Duration::seconds(330), 10)
        .await
        .unwrap();
    let first = first.await.unwrap().unwrap();

    assert_eq!(first.processed, 4);
    assert_eq!(first.sent, 3);
    assert_eq!(first.lost, 1);
    assert_eq!(first.errors, 0);
    assert_eq!(second.processed, 1);
    assert_eq!(second.sent, 1);

    let sent = harness.notifier.sent_messages().await;
    let patients: HashSet<_> = sent.iter().map(|m| m.recipient.patient_id.clone()).collect();
    assert_eq!(sent.len(), 4);
    assert_eq!(patients.len(), 4);
    assert!(
        harness
            .store
            .items()
            .await
            .iter()
            .all(|item| item.status == QueueStatus::Sent && item.attempt_count == 1)
    );
}

#[tokio::test(start_paused = true)]
async fn later_run_finds_nothing_while_the_lease_covers_the_batch() {
    // ceil(4 / 1) sends of at most 3 minutes fit in a 12 minute lease.
    let harness = TestHarness::builder()
        .with_claim_lease(Duration::minutes(12))
        .with_max_concurrency(1)
        .with_send_timeout(StdDuration::from_secs(180))
        .build();
    let start = wednesday_10am();
    seed_four(&harness, start).await;
    harness.notifier.set_delay(StdDuration::from_secs(120)).await;

    let slow = harness.dispatcher();
    let first = tokio::spawn(async move { slow.dispatch(start, 10).await });

    tokio::time::sleep(StdDuration::from_secs(330)).await;
    let second = harness
        .run_dispatch(start + Duration::seconds(330), 10)
        .await
        .unwrap();
    let first = first.await.unwrap().unwrap();

    assert_eq!(second.processed, 0);
    assert_eq!(first.sent, 4);
    assert_eq!(first.lost, 0);
    assert_eq!(harness.notifier.sent_count().await, 4);
}
