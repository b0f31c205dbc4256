// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wires storage, the channel router, and both orchestrators from config.

use std::sync::Arc;

use cadence_config::CadenceConfig;
use cadence_core::{CadenceError, StorageAdapter};
use cadence_notify::ChannelRouter;
use cadence_scheduler::{Builder, Dispatcher, DispatcherOptions, PlainTextRenderer};
use cadence_storage::SqliteStore;
use tracing::{info, warn};

/// Everything one build or dispatch tick needs.
pub struct Pipeline {
    pub store: Arc<SqliteStore>,
    pub notifier: Arc<ChannelRouter>,
    pub builder: Arc<Builder>,
    pub dispatcher: Arc<Dispatcher>,
    pub batch_limit: usize,
}

impl Pipeline {
    /// Open the database (running migrations) and wire the pipeline.
    pub async fn open(config: &CadenceConfig) -> Result<Self, CadenceError> {
        let store = Arc::new(
            SqliteStore::new(config.storage.clone())
                .with_claim_lease(config.dispatcher.claim_lease()),
        );
        store.initialize().await?;
        info!(path = %config.storage.database_path, "storage initialized");

        let notifier = Arc::new(ChannelRouter::from_config(
            store.clone(),
            &config.sms,
            &config.whatsapp,
            config.dispatcher.send_timeout(),
        )?);
        if notifier.channels().is_empty() {
            warn!("no delivery channel configured, sends will fail and be retried");
        }

        let builder = Builder::new(store.clone(), store.clone(), store.clone()).with_horizon(
            chrono::Duration::hours(i64::from(config.builder.horizon_hours)),
        );
        let dispatcher = Dispatcher::new(
            store.clone(),
            store.clone(),
            store.clone(),
            notifier.clone(),
            Arc::new(PlainTextRenderer::new()),
            DispatcherOptions {
                max_concurrency: config.dispatcher.max_concurrency,
                send_timeout: config.dispatcher.send_timeout(),
            },
        );

        Ok(Self {
            store,
            notifier,
            builder: Arc::new(builder),
            dispatcher: Arc::new(dispatcher),
            batch_limit: config.dispatcher.batch_limit,
        })
    }

    /// Checkpoint and release the database.
    pub async fn close(&self) {
        if let Err(e) = self.store.close().await {
            warn!(error = %e, "storage close failed");
        }
    }
}
