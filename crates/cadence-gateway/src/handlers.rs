// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP handlers: `GET /health`, `POST /v1/jobs/build`, `POST /v1/jobs/dispatch`.

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use cadence_core::HealthStatus;
use serde::{Deserialize, Serialize};

use crate::server::GatewayState;

/// Successful job run: `{"ok": true, ...counts}`.
#[derive(Debug, Serialize)]
pub struct JobResponse<T: Serialize> {
    pub ok: bool,
    #[serde(flatten)]
    pub report: T,
}

/// Failed job run: `{"ok": false, "error": "..."}`.
#[derive(Debug, Serialize)]
pub struct JobErrorResponse {
    pub ok: bool,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Query parameters for `POST /v1/jobs/dispatch`.
#[derive(Debug, Default, Deserialize)]
pub struct DispatchParams {
    /// Overrides the configured batch limit for this run.
    #[serde(default)]
    pub limit: Option<usize>,
}

fn job_error(error: impl std::fmt::Display) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(JobErrorResponse {
            ok: false,
            error: error.to_string(),
        }),
    )
        .into_response()
}

/// GET /health
///
/// Unauthenticated. 200 while storage answers, 503 otherwise.
pub async fn get_health(State(state): State<GatewayState>) -> Response {
    let version = env!("CARGO_PKG_VERSION").to_string();
    let (code, status, detail) = match state.storage.health_check().await {
        Ok(HealthStatus::Healthy) => (StatusCode::OK, "ok", None),
        Ok(HealthStatus::Degraded(reason)) => (StatusCode::OK, "degraded", Some(reason)),
        Ok(HealthStatus::Unhealthy(reason)) => {
            (StatusCode::SERVICE_UNAVAILABLE, "unhealthy", Some(reason))
        }
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, "unhealthy", Some(e.to_string())),
    };
    (
        code,
        Json(HealthResponse {
            status: status.to_string(),
            version,
            detail,
        }),
    )
        .into_response()
}

/// POST /v1/jobs/build
pub async fn post_build(State(state): State<GatewayState>) -> Response {
    let now = state.now();
    match state.builder.build(now).await {
        Ok(report) => Json(JobResponse { ok: true, report }).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "build job failed");
            job_error(e)
        }
    }
}

/// POST /v1/jobs/dispatch[?limit=N]
pub async fn post_dispatch(
    State(state): State<GatewayState>,
    Query(params): Query<DispatchParams>,
) -> Response {
    let now = state.now();
    let limit = params.limit.unwrap_or(state.batch_limit);
    match state.dispatcher.dispatch(now, limit).await {
        Ok(report) => Json(JobResponse { ok: true, report }).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "dispatch job failed");
            job_error(e)
        }
    }
}
