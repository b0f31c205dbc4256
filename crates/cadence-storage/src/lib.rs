// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence for the Cadence reminder pipeline.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! concurrency model via `tokio-rusqlite`, and the repository implementations
//! the builder and dispatcher run against: assignments, reminder preferences,
//! patient contacts, and a lease-based reminder queue.

pub mod adapter;
mod codec;
pub mod database;
pub mod migrations;
pub mod queries;

pub use adapter::SqliteStore;
pub use database::Database;
