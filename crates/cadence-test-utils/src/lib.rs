// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Cadence integration tests.
//!
//! Provides in-memory collaborators and harness infrastructure for fast,
//! deterministic tests without a database or outbound network.
//!
//! # Components
//!
//! - [`MemoryStore`] - every repository trait plus `ContactDirectory`, with fault injection
//! - [`MockNotifier`] - records deliveries; can fail, hang, or delay on demand
//! - [`TestHarness`] - Builder + Dispatcher wired to the two above

pub mod fixtures;
pub mod harness;
pub mod memory_store;
pub mod mock_notifier;

pub use harness::TestHarness;
pub use memory_store::MemoryStore;
pub use mock_notifier::{MockNotifier, SentMessage};
