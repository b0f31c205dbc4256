// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Builder and dispatcher running against a real SQLite database.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use tempfile::tempdir;

use cadence_config::model::StorageConfig;
use cadence_core::types::{AssignmentStatus, QueueStatus, TemplateSlug};
use cadence_core::{CadenceError, QueueRepository, StorageAdapter};
use cadence_scheduler::{Builder, Dispatcher, DispatcherOptions, PlainTextRenderer};
use cadence_storage::SqliteStore;
use cadence_test_utils::MockNotifier;
use cadence_test_utils::fixtures::{ORG_ID, PROVIDER_ID, always_open_preference, assignment};

/// Wednesday 2026-10-14 12:00 UTC.
fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 14, 12, 0, 0).unwrap()
}

async fn open_store(path: &str) -> Arc<SqliteStore> {
    let store = SqliteStore::new(StorageConfig {
        database_path: path.to_string(),
        wal_mode: true,
    });
    store.initialize().await.unwrap();
    Arc::new(store)
}

fn builder_for(store: &Arc<SqliteStore>) -> Builder {
    Builder::new(store.clone(), store.clone(), store.clone())
}

fn dispatcher_for(store: &Arc<SqliteStore>, notifier: &Arc<MockNotifier>) -> Dispatcher {
    Dispatcher::new(
        store.clone(),
        store.clone(),
        store.clone(),
        notifier.clone(),
        Arc::new(PlainTextRenderer::new()),
        DispatcherOptions::default(),
    )
}

#[tokio::test]
async fn build_then_dispatch_delivers_once() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cadence.db");
    let store = open_store(path.to_str().unwrap()).await;
    let notifier = Arc::new(MockNotifier::new());

    store
        .upsert_preference(ORG_ID, PROVIDER_ID, &always_open_preference())
        .await
        .unwrap();
    store
        .upsert_assignment(&assignment("a1", Some(now() + Duration::hours(3))))
        .await
        .unwrap();

    let builder = builder_for(&store);
    let first = builder.build(now()).await.unwrap();
    assert_eq!(first.created, 1);
    let second = builder.build(now()).await.unwrap();
    assert_eq!(second.created, 0);
    assert_eq!(second.skipped, 1);

    let report = dispatcher_for(&store, &notifier)
        .dispatch(now(), 50)
        .await
        .unwrap();
    assert_eq!(report.sent, 1);

    let sent = notifier.sent_messages().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].recipient.patient_id, "pat-a1");
    assert!(sent[0].body.contains("Exercise a1"), "body: {}", sent[0].body);

    let items = store.queue_for_assignment("a1").await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].status, QueueStatus::Sent);
    assert_eq!(items[0].template_slug, TemplateSlug::Due);
    assert_eq!(items[0].sent_at, Some(now()));

    store.close().await.unwrap();
}

#[tokio::test]
async fn paused_assignment_is_canceled_at_dispatch() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cadence.db");
    let store = open_store(path.to_str().unwrap()).await;
    let notifier = Arc::new(MockNotifier::new());

    store
        .upsert_preference(ORG_ID, PROVIDER_ID, &always_open_preference())
        .await
        .unwrap();
    let mut a = assignment("a1", Some(now() - Duration::hours(2)));
    store.upsert_assignment(&a).await.unwrap();
    builder_for(&store).build(now()).await.unwrap();

    a.status = AssignmentStatus::Paused;
    store.upsert_assignment(&a).await.unwrap();

    let report = dispatcher_for(&store, &notifier)
        .dispatch(now(), 50)
        .await
        .unwrap();
    assert_eq!(report.canceled, 1);
    assert_eq!(notifier.call_count(), 0);

    let counts = store.status_counts().await.unwrap();
    assert_eq!(counts.canceled, 1);
    assert_eq!(counts.total(), 1);
    store.close().await.unwrap();
}

#[tokio::test]
async fn failed_send_is_retried_after_backoff() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cadence.db");
    let store = open_store(path.to_str().unwrap()).await;
    let notifier = Arc::new(MockNotifier::new());

    store
        .upsert_preference(ORG_ID, PROVIDER_ID, &always_open_preference())
        .await
        .unwrap();
    store
        .upsert_assignment(&assignment("a1", Some(now() + Duration::hours(1))))
        .await
        .unwrap();
    builder_for(&store).build(now()).await.unwrap();

    notifier.fail_next("gateway unavailable").await;
    let dispatcher = dispatcher_for(&store, &notifier);
    let report = dispatcher.dispatch(now(), 50).await.unwrap();
    assert_eq!(report.retried, 1);

    let item = store.queue_for_assignment("a1").await.unwrap().remove(0);
    assert_eq!(item.status, QueueStatus::Retrying);
    assert_eq!(item.attempt_count, 1);
    assert_eq!(item.next_attempt_at, now() + Duration::minutes(30));

    let early = dispatcher.dispatch(now() + Duration::minutes(29), 50).await.unwrap();
    assert_eq!(early.processed, 0);

    let retry = dispatcher.dispatch(now() + Duration::minutes(30), 50).await.unwrap();
    assert_eq!(retry.sent, 1);
    let item = store.get_item(&item.id).await.unwrap().unwrap();
    assert_eq!(item.status, QueueStatus::Sent);
    assert_eq!(item.attempt_count, 2);
    store.close().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn dispatchers_on_separate_connections_never_double_send() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cadence.db");
    let path = path.to_str().unwrap();
    let seed = open_store(path).await;

    seed.upsert_preference(ORG_ID, PROVIDER_ID, &always_open_preference())
        .await
        .unwrap();
    for i in 0..30 {
        seed.upsert_assignment(&assignment(&format!("a{i}"), Some(now() + Duration::hours(1))))
            .await
            .unwrap();
    }
    assert_eq!(builder_for(&seed).build(now()).await.unwrap().created, 30);

    let notifier = Arc::new(MockNotifier::new());
    let left = open_store(path).await;
    let right = open_store(path).await;
    let d1 = dispatcher_for(&left, &notifier);
    let d2 = dispatcher_for(&right, &notifier);

    let (r1, r2) = tokio::join!(d1.dispatch(now(), 20), d2.dispatch(now(), 20));
    let (r1, r2) = (r1.unwrap(), r2.unwrap());
    assert_eq!(r1.sent + r2.sent, 30);

    let sent = notifier.sent_messages().await;
    let patients: HashSet<_> = sent.iter().map(|m| m.recipient.patient_id.clone()).collect();
    assert_eq!(sent.len(), 30);
    assert_eq!(patients.len(), 30);

    let counts = seed.status_counts().await.unwrap();
    assert_eq!(counts.sent, 30);
}

#[tokio::test]
async fn stalled_claimer_is_overtaken_after_its_lease() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cadence.db");
    let store = open_store(path.to_str().unwrap()).await;
    let notifier = Arc::new(MockNotifier::new());

    store
        .upsert_preference(ORG_ID, PROVIDER_ID, &always_open_preference())
        .await
        .unwrap();
    for i in 0..3 {
        store
            .upsert_assignment(&assignment(&format!("a{i}"), Some(now() + Duration::hours(1))))
            .await
            .unwrap();
    }
    builder_for(&store).build(now()).await.unwrap();

    // A run claims the batch and stalls before sending anything.
    let stalled = store.claim_batch(now(), 50).await.unwrap();
    assert_eq!(stalled.len(), 3);
    let dispatcher = dispatcher_for(&store, &notifier);
    let during = dispatcher.dispatch(now() + Duration::minutes(2), 50).await.unwrap();
    assert_eq!(during.processed, 0);

    let after = now() + Duration::minutes(6);
    let report = dispatcher.dispatch(after, 50).await.unwrap();
    assert_eq!(report.sent, 3);

    // The stalled run wakes up: it may neither send nor record.
    for item in &stalled {
        assert!(!store.renew_claim(item, after).await.unwrap());
        let err = store
            .update_status(&item.id, &item.mark_sent(after), after)
            .await
            .unwrap_err();
        assert!(
            matches!(err, CadenceError::InvalidTransition { from: QueueStatus::Sent, .. }),
            "got: {err:?}"
        );
    }

    assert_eq!(notifier.sent_count().await, 3);
    let counts = store.status_counts().await.unwrap();
    assert_eq!(counts.sent, 3);
    for i in 0..3 {
        let items = store.queue_for_assignment(&format!("a{i}")).await.unwrap();
        assert_eq!(items[0].attempt_count, 1);
    }
    store.close().await.unwrap();
}
