// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end pipeline tests.
//!
//! `TestHarness` wires a [`Builder`] and a [`Dispatcher`] to one shared
//! [`MemoryStore`] and [`MockNotifier`], so a test can seed assignments,
//! run build/dispatch ticks at chosen instants, and assert on the queue and
//! the delivered messages.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use cadence_core::CadenceError;
use cadence_scheduler::{
    BuildReport, Builder, DispatchReport, Dispatcher, DispatcherOptions, PlainTextRenderer,
};

use crate::memory_store::MemoryStore;
use crate::mock_notifier::MockNotifier;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    horizon: Option<chrono::Duration>,
    claim_lease: Option<chrono::Duration>,
    options: DispatcherOptions,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            horizon: None,
            claim_lease: None,
            options: DispatcherOptions::default(),
        }
    }

    /// Set the builder's look-ahead horizon.
    pub fn with_horizon(mut self, horizon: chrono::Duration) -> Self {
        self.horizon = Some(horizon);
        self
    }

    /// Set how long claimed items stay invisible to other dispatchers.
    pub fn with_claim_lease(mut self, lease: chrono::Duration) -> Self {
        self.claim_lease = Some(lease);
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.options.max_concurrency = max_concurrency;
        self
    }

    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.options.send_timeout = timeout;
        self
    }

    /// Build the harness.
    pub fn build(self) -> TestHarness {
        let store = Arc::new(match self.claim_lease {
            Some(lease) => MemoryStore::with_claim_lease(lease),
            None => MemoryStore::new(),
        });
        let notifier = Arc::new(MockNotifier::new());

        let mut builder = Builder::new(store.clone(), store.clone(), store.clone());
        if let Some(horizon) = self.horizon {
            builder = builder.with_horizon(horizon);
        }

        TestHarness {
            store,
            notifier,
            builder,
            options: self.options,
        }
    }
}

/// A complete in-memory pipeline.
pub struct TestHarness {
    /// Shared repositories and contact directory.
    pub store: Arc<MemoryStore>,
    /// The notifier every dispatcher sends through.
    pub notifier: Arc<MockNotifier>,
    builder: Builder,
    options: DispatcherOptions,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// A new dispatcher over the shared store and notifier.
    ///
    /// Several dispatchers may run concurrently against the same store.
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(
            self.store.clone(),
            self.store.clone(),
            self.store.clone(),
            self.notifier.clone(),
            Arc::new(PlainTextRenderer::new()),
            self.options.clone(),
        )
    }

    /// Run one build tick.
    pub async fn run_build(&self, now: DateTime<Utc>) -> Result<BuildReport, CadenceError> {
        self.builder.build(now).await
    }

    /// Run one dispatch tick.
    pub async fn run_dispatch(
        &self,
        now: DateTime<Utc>,
        batch_limit: usize,
    ) -> Result<DispatchReport, CadenceError> {
        self.dispatcher().dispatch(now, batch_limit).await
    }
}
