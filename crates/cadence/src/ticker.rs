// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process ticker for deployments without an external cron.
//!
//! Runs a build on one interval and a dispatch on another until the
//! shutdown token fires. Both first ticks fire immediately, build first.

use std::sync::Arc;
use std::time::Duration;

use cadence_gateway::Clock;
use cadence_scheduler::{Builder, Dispatcher};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct TickerSettings {
    pub build_every: Duration,
    pub dispatch_every: Duration,
    pub batch_limit: usize,
}

pub async fn run_ticker(
    builder: Arc<Builder>,
    dispatcher: Arc<Dispatcher>,
    settings: TickerSettings,
    clock: Clock,
    shutdown: CancellationToken,
) {
    let mut build_tick = tokio::time::interval(settings.build_every);
    build_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut dispatch_tick = tokio::time::interval(settings.dispatch_every);
    dispatch_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        build_every_secs = settings.build_every.as_secs(),
        dispatch_every_secs = settings.dispatch_every.as_secs(),
        batch_limit = settings.batch_limit,
        "ticker started"
    );

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = build_tick.tick() => {
                match builder.build(clock()).await {
                    Ok(report) => debug!(created = report.created, skipped = report.skipped, "scheduled build done"),
                    Err(e) => warn!(error = %e, "scheduled build failed"),
                }
            }
            _ = dispatch_tick.tick() => {
                if let Err(e) = dispatcher.dispatch(clock(), settings.batch_limit).await {
                    warn!(error = %e, "scheduled dispatch failed");
                }
            }
        }
    }

    info!("ticker stopped");
}
