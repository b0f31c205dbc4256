// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for persistence backends (SQLite, etc.).

use async_trait::async_trait;

use crate::error::CadenceError;
use crate::traits::adapter::PluginAdapter;

/// Lifecycle of a persistence backend.
///
/// Backends implementing this usually also implement the repository traits
/// ([`AssignmentRepository`](crate::AssignmentRepository),
/// [`PreferenceRepository`](crate::PreferenceRepository),
/// [`QueueRepository`](crate::QueueRepository)).
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (migrations, connection, etc.).
    async fn initialize(&self) -> Result<(), CadenceError>;

    /// Closes the storage backend, flushing pending writes.
    async fn close(&self) -> Result<(), CadenceError>;
}
