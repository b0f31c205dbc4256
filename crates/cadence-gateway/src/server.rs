// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use cadence_core::{CadenceError, PluginAdapter};
use cadence_scheduler::{Builder, Dispatcher};
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::auth::{JobAuth, job_auth_middleware};
use crate::handlers;

/// Source of "now" for job runs.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub builder: Arc<Builder>,
    pub dispatcher: Arc<Dispatcher>,
    /// Probed by `GET /health`.
    pub storage: Arc<dyn PluginAdapter>,
    /// Default batch size for `POST /v1/jobs/dispatch`.
    pub batch_limit: usize,
    pub auth: JobAuth,
    pub clock: Clock,
}

impl GatewayState {
    pub fn new(
        builder: Arc<Builder>,
        dispatcher: Arc<Dispatcher>,
        storage: Arc<dyn PluginAdapter>,
        batch_limit: usize,
        auth: JobAuth,
    ) -> Self {
        Self {
            builder,
            dispatcher,
            storage,
            batch_limit,
            auth,
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }
}

/// Gateway bind settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Routes:
/// - `GET /health` (public)
/// - `POST /v1/jobs/build` and `POST /v1/jobs/dispatch` (shared secret)
pub fn router(state: GatewayState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .with_state(state.clone());

    let job_routes = Router::new()
        .route("/v1/jobs/build", post(handlers::post_build))
        .route("/v1/jobs/dispatch", post(handlers::post_dispatch))
        .route_layer(axum_middleware::from_fn_with_state(
            state.auth.clone(),
            job_auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(job_routes)
        .layer(TraceLayer::new_for_http())
}

/// Serve the gateway until `shutdown` is cancelled.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), CadenceError> {
    if state.auth.secret.is_none() {
        tracing::warn!("gateway.job_secret is not set; job endpoints will reject every request");
    }

    let app = router(state);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| CadenceError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| CadenceError::Internal(format!("gateway server error: {e}")))?;

    tracing::info!("gateway stopped");
    Ok(())
}
