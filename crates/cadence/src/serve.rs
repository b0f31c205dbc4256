// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `cadence serve` command implementation.
//!
//! Opens storage, wires the pipeline, and runs the HTTP job endpoints and
//! the in-process ticker (each when enabled) until SIGTERM or Ctrl+C.

use std::sync::Arc;
use std::time::Duration;

use cadence_config::CadenceConfig;
use cadence_core::CadenceError;
use cadence_gateway::{Clock, GatewayState, JobAuth, ServerConfig, start_server};
use chrono::Utc;
use tracing::{info, warn};

use crate::pipeline::Pipeline;
use crate::shutdown::install_signal_handler;
use crate::ticker::{TickerSettings, run_ticker};

/// Run the `cadence serve` command.
pub async fn run_serve(config: CadenceConfig) -> Result<(), CadenceError> {
    if !config.gateway.enabled && !config.schedule.enabled {
        return Err(CadenceError::Config(
            "nothing to serve: enable [gateway] or [schedule]".to_string(),
        ));
    }

    let pipeline = Pipeline::open(&config).await?;
    let shutdown = install_signal_handler();
    let clock: Clock = Arc::new(Utc::now);

    let ticker = config.schedule.enabled.then(|| {
        tokio::spawn(run_ticker(
            pipeline.builder.clone(),
            pipeline.dispatcher.clone(),
            TickerSettings {
                build_every: Duration::from_secs(config.schedule.build_interval_secs),
                dispatch_every: Duration::from_secs(config.schedule.dispatch_interval_secs),
                batch_limit: pipeline.batch_limit,
            },
            clock.clone(),
            shutdown.clone(),
        ))
    });

    let result = if config.gateway.enabled {
        if config.gateway.job_secret.is_none() {
            warn!("gateway.job_secret is not set, job endpoints will reject every request");
        }
        let state = GatewayState::new(
            pipeline.builder.clone(),
            pipeline.dispatcher.clone(),
            pipeline.store.clone(),
            pipeline.batch_limit,
            JobAuth {
                secret: config.gateway.job_secret.clone(),
            },
        )
        .with_clock(clock);
        let server_config = ServerConfig {
            host: config.gateway.host.clone(),
            port: config.gateway.port,
        };
        start_server(&server_config, state, shutdown.clone()).await
    } else {
        info!("gateway disabled, running ticker only");
        shutdown.cancelled().await;
        Ok(())
    };

    // Stop the ticker too if the server exited on its own.
    shutdown.cancel();
    if let Some(handle) = ticker
        && let Err(e) = handle.await
    {
        warn!(error = %e, "ticker task failed");
    }

    pipeline.close().await;
    info!("cadence stopped");
    result
}

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` wins over the configured level. Logs go to stderr so that
/// command output on stdout stays machine-readable.
pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("cadence={log_level},warn")));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}
