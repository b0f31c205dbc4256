// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-only access to assignments owned by the surrounding application.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::error::CadenceError;
use crate::types::Assignment;

#[async_trait]
pub trait AssignmentRepository: Send + Sync {
    /// Active assignments with a due date at or before `now + horizon`,
    /// including overdue ones.
    async fn active_due_soon(
        &self,
        now: DateTime<Utc>,
        horizon: Duration,
    ) -> Result<Vec<Assignment>, CadenceError>;

    /// Fetch a single assignment regardless of its status.
    async fn get_assignment(&self, id: &str) -> Result<Option<Assignment>, CadenceError>;
}
