// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Cadence reminder pipeline.
//!
//! This crate provides the domain types (assignments, preferences, queue
//! items and their status machine), the error taxonomy, and the collaborator
//! traits the scheduler consumes. Storage backends and notifiers implement
//! traits defined here.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::CadenceError;
pub use types::{AdapterType, HealthStatus};

// Re-export all collaborator traits at crate root.
pub use traits::{
    AssignmentRepository, ContactDirectory, MessageRenderer, Notifier, PluginAdapter,
    PreferenceRepository, QueueRepository, RenderContext, StorageAdapter,
};
