// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator trait definitions consumed by the reminder pipeline.
//!
//! Repositories and notifiers are async and use `#[async_trait]` for
//! dynamic dispatch compatibility; the renderer is a plain synchronous trait.

pub mod adapter;
pub mod assignment;
pub mod notifier;
pub mod preference;
pub mod queue;
pub mod render;
pub mod storage;

// Re-export all traits at the traits module level for convenience.
pub use adapter::PluginAdapter;
pub use assignment::AssignmentRepository;
pub use notifier::{ContactDirectory, Notifier};
pub use preference::PreferenceRepository;
pub use queue::QueueRepository;
pub use render::{MessageRenderer, RenderContext};
pub use storage::StorageAdapter;
