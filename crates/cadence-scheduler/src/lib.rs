// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scheduling core of the Cadence reminder pipeline.
//!
//! - [`window`] and [`retry`] are pure policies: every function takes `now`
//!   explicitly.
//! - [`Builder`] enqueues reminders for due-soon and overdue assignments.
//! - [`Dispatcher`] drains ready reminders through a notifier.
//!
//! Both orchestrators are driven by an external tick (cron, HTTP job, or the
//! optional in-process ticker in the `cadence` binary).

pub mod builder;
pub mod dispatcher;
pub mod render;
pub mod retry;
pub mod window;

pub use builder::{BuildReport, Builder};
pub use dispatcher::{DispatchReport, Dispatcher, DispatcherOptions};
pub use render::PlainTextRenderer;
pub use retry::{RetryDecision, RetryPolicy, next_retry};
pub use window::{is_within_window, next_eligible};
