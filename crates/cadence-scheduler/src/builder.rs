// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Enqueue orchestrator.
//!
//! Turns due-soon and overdue assignments into `scheduled` queue items, at
//! most one outstanding item per `(org_id, assignment_id, template_slug)`.

use std::sync::Arc;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use cadence_core::types::{Assignment, Payload, PayloadValue, QueueItem, TemplateSlug};
use cadence_core::{AssignmentRepository, CadenceError, PreferenceRepository, QueueRepository};

use crate::window;

/// How far ahead of `now` assignments are picked up.
pub const DEFAULT_HORIZON_HOURS: i64 = 24;

/// Aggregate outcome of one [`Builder::build`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildReport {
    /// New queue items inserted.
    pub created: u64,
    /// Assignments that already had an outstanding item, or lost an insert race.
    pub skipped: u64,
    /// Assignments whose processing failed and will be picked up next tick.
    pub errors: u64,
}

enum Outcome {
    Created,
    Skipped,
}

/// Enqueues reminders for due-soon and overdue assignments.
pub struct Builder {
    assignments: Arc<dyn AssignmentRepository>,
    preferences: Arc<dyn PreferenceRepository>,
    queue: Arc<dyn QueueRepository>,
    horizon: Duration,
}

impl Builder {
    pub fn new(
        assignments: Arc<dyn AssignmentRepository>,
        preferences: Arc<dyn PreferenceRepository>,
        queue: Arc<dyn QueueRepository>,
    ) -> Self {
        Self {
            assignments,
            preferences,
            queue,
            horizon: Duration::hours(DEFAULT_HORIZON_HOURS),
        }
    }

    /// Override the look-ahead horizon.
    pub fn with_horizon(mut self, horizon: Duration) -> Self {
        self.horizon = horizon;
        self
    }

    pub fn horizon(&self) -> Duration {
        self.horizon
    }

    /// Enqueue every due-soon or overdue active assignment that has no
    /// outstanding queue item yet.
    ///
    /// Only a failure to list assignments is returned as an error; per
    /// assignment failures are logged and counted in [`BuildReport::errors`].
    pub async fn build(&self, now: DateTime<Utc>) -> Result<BuildReport, CadenceError> {
        let due = self.assignments.active_due_soon(now, self.horizon).await?;
        let mut report = BuildReport::default();

        for assignment in &due {
            match self.enqueue(assignment, now).await {
                Ok(Outcome::Created) => report.created += 1,
                Ok(Outcome::Skipped) => report.skipped += 1,
                Err(e) => {
                    warn!(
                        org_id = %assignment.org_id,
                        assignment_id = %assignment.id,
                        error = %e,
                        "failed to enqueue reminder"
                    );
                    report.errors += 1;
                }
            }
        }

        info!(
            candidates = due.len(),
            created = report.created,
            skipped = report.skipped,
            errors = report.errors,
            "build complete"
        );
        Ok(report)
    }

    async fn enqueue(
        &self,
        assignment: &Assignment,
        now: DateTime<Utc>,
    ) -> Result<Outcome, CadenceError> {
        // Only active assignments with a due date may produce queue items.
        let Some(due_at) = assignment.due_at.filter(|_| assignment.is_active()) else {
            debug!(assignment_id = %assignment.id, "assignment not eligible, skipping");
            return Ok(Outcome::Skipped);
        };

        let template_slug = TemplateSlug::classify(due_at, now);

        if let Some(existing) = self
            .queue
            .find_active_by_key(&assignment.org_id, &assignment.id, template_slug)
            .await?
        {
            debug!(
                assignment_id = %assignment.id,
                queue_item_id = %existing.id,
                %template_slug,
                "reminder already scheduled"
            );
            return Ok(Outcome::Skipped);
        }

        let policy = self
            .preferences
            .get_preference(&assignment.org_id, &assignment.provider_id)
            .await?
            .resolve();
        let channel = policy.primary_channel();
        let next_attempt_at = window::next_eligible(now, &policy.window);

        let item = QueueItem::scheduled(
            assignment,
            channel,
            template_slug,
            snapshot(assignment, due_at),
            next_attempt_at,
            now,
        );

        match self.queue.insert(&item).await {
            Ok(()) => {
                debug!(
                    org_id = %item.org_id,
                    assignment_id = %item.assignment_id,
                    queue_item_id = %item.id,
                    %channel,
                    %template_slug,
                    next_attempt_at = %item.next_attempt_at,
                    "reminder scheduled"
                );
                Ok(Outcome::Created)
            }
            Err(e) if e.is_duplicate_key() => {
                debug!(
                    assignment_id = %assignment.id,
                    %template_slug,
                    "lost insert race, reminder already scheduled"
                );
                Ok(Outcome::Skipped)
            }
            Err(e) => Err(e),
        }
    }
}

/// Assignment fields captured at enqueue time, for reporting.
///
/// Rendering reads the fresh assignment at dispatch time instead.
fn snapshot(assignment: &Assignment, due_at: DateTime<Utc>) -> Payload {
    let mut payload = Payload::new();
    payload.insert("title".into(), assignment.title.clone().into());
    payload.insert("module".into(), assignment.module.to_string().into());
    payload.insert(
        "due_at".into(),
        PayloadValue::Text(due_at.to_rfc3339_opts(SecondsFormat::Secs, true)),
    );
    payload
}
