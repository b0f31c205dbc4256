// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Route-level tests driven through `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{DateTime, Duration, TimeZone, Utc};
use tower::ServiceExt;

use cadence_gateway::{GatewayState, JobAuth, SECRET_HEADER, router};
use cadence_scheduler::{Builder, Dispatcher, DispatcherOptions, PlainTextRenderer};
use cadence_test_utils::fixtures::{ORG_ID, PROVIDER_ID, always_open_preference, assignment};
use cadence_test_utils::{MemoryStore, MockNotifier};

/// Wednesday 2026-10-14 12:00 UTC.
fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 14, 12, 0, 0).unwrap()
}

struct Fixture {
    store: Arc<MemoryStore>,
    notifier: Arc<MockNotifier>,
    state: GatewayState,
}

fn fixture(secret: Option<&str>) -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let notifier = Arc::new(MockNotifier::new());
    let builder = Builder::new(store.clone(), store.clone(), store.clone());
    let dispatcher = Dispatcher::new(
        store.clone(),
        store.clone(),
        store.clone(),
        notifier.clone(),
        Arc::new(PlainTextRenderer::new()),
        DispatcherOptions::default(),
    );
    let state = GatewayState::new(
        Arc::new(builder),
        Arc::new(dispatcher),
        store.clone(),
        50,
        JobAuth {
            secret: secret.map(str::to_string),
        },
    )
    .with_clock(Arc::new(now));
    Fixture {
        store,
        notifier,
        state,
    }
}

async fn seed(store: &MemoryStore, count: usize) {
    store
        .put_preference(ORG_ID, PROVIDER_ID, always_open_preference())
        .await;
    for i in 0..count {
        store
            .put_assignment(assignment(&format!("a{i}"), Some(now() + Duration::hours(2))))
            .await;
    }
}

fn job_request(uri: &str, secret: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri(uri);
    if let Some(secret) = secret {
        builder = builder.header(SECRET_HEADER, secret);
    }
    builder.body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let fx = fixture(Some("s3cret"));
    let response = router(fx.state)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn build_job_runs_with_valid_secret() {
    let fx = fixture(Some("s3cret"));
    seed(&fx.store, 2).await;

    let response = router(fx.state.clone())
        .oneshot(job_request("/v1/jobs/build", Some("s3cret")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["ok"], true);
    assert_eq!(body["created"], 2);
    assert_eq!(fx.store.active_items().await.len(), 2);
}

#[tokio::test]
async fn dispatch_job_reports_counts() {
    let fx = fixture(Some("s3cret"));
    seed(&fx.store, 3).await;
    let app = router(fx.state.clone());

    app.clone()
        .oneshot(job_request("/v1/jobs/build", Some("s3cret")))
        .await
        .unwrap();
    let response = app
        .oneshot(job_request("/v1/jobs/dispatch?limit=2", Some("s3cret")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["ok"], true);
    assert_eq!(body["processed"], 2);
    assert_eq!(body["sent"], 2);
    assert_eq!(body["failed"], 0);
    assert_eq!(fx.notifier.sent_count().await, 2);
}

#[tokio::test]
async fn wrong_or_missing_secret_is_rejected() {
    let fx = fixture(Some("s3cret"));
    seed(&fx.store, 1).await;
    let app = router(fx.state.clone());

    for secret in [None, Some("nope"), Some("s3cret ")] {
        let response = app
            .clone()
            .oneshot(job_request("/v1/jobs/build", secret))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "secret {secret:?}");
    }
    assert!(fx.store.items().await.is_empty());
}

#[tokio::test]
async fn job_endpoints_fail_closed_without_configured_secret() {
    let fx = fixture(None);
    let response = router(fx.state)
        .oneshot(job_request("/v1/jobs/dispatch", Some("anything")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn repository_outage_returns_ok_false() {
    let fx = fixture(Some("s3cret"));
    fx.store.fail_claims(true).await;

    let response = router(fx.state)
        .oneshot(job_request("/v1/jobs/dispatch", Some("s3cret")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["ok"], false);
    assert!(!body["error"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn get_on_job_route_is_not_allowed() {
    let fx = fixture(Some("s3cret"));
    let response = router(fx.state)
        .oneshot(
            Request::builder()
                .uri("/v1/jobs/build")
                .header(SECRET_HEADER, "s3cret")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}
