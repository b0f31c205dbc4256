// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Send orchestrator.
//!
//! Claims a batch of ready queue items, drops stale work, renders and sends
//! the rest with bounded parallelism, then records the outcome of each item.
//! Each claim is renewed right before its send; an item whose lease was
//! taken over by a later run is skipped instead of sent a second time.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tokio::time::Instant;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use cadence_core::types::{ClaimedItem, DeliveryPolicy, StatusPatch};
use cadence_core::{
    AssignmentRepository, CadenceError, MessageRenderer, Notifier, PreferenceRepository,
    QueueRepository, RenderContext,
};

use crate::retry::{RetryDecision, RetryPolicy};

pub const DEFAULT_MAX_CONCURRENCY: usize = 8;
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(15);

/// Aggregate outcome of one [`Dispatcher::dispatch`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReport {
    /// Items claimed in this run.
    pub processed: u64,
    /// Items delivered.
    pub sent: u64,
    /// Delivery attempts that did not succeed (`retried` plus terminal failures).
    pub failed: u64,
    /// Failed attempts that were rescheduled.
    pub retried: u64,
    /// Items canceled because their assignment is gone or inactive.
    pub canceled: u64,
    /// Items whose claim was taken over by another run before they were sent or recorded.
    pub lost: u64,
    /// Items whose outcome could not be recorded.
    pub errors: u64,
}

/// Tuning knobs for a [`Dispatcher`].
#[derive(Debug, Clone)]
pub struct DispatcherOptions {
    /// Upper bound on in-flight sends.
    pub max_concurrency: usize,
    /// Deadline for a single [`Notifier::send`] call.
    pub send_timeout: Duration,
}

impl Default for DispatcherOptions {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Sent,
    Retried,
    Failed,
    Canceled,
    Lost,
}

/// Drains ready queue items through a [`Notifier`].
pub struct Dispatcher {
    assignments: Arc<dyn AssignmentRepository>,
    preferences: Arc<dyn PreferenceRepository>,
    queue: Arc<dyn QueueRepository>,
    notifier: Arc<dyn Notifier>,
    renderer: Arc<dyn MessageRenderer>,
    options: DispatcherOptions,
}

impl Dispatcher {
    pub fn new(
        assignments: Arc<dyn AssignmentRepository>,
        preferences: Arc<dyn PreferenceRepository>,
        queue: Arc<dyn QueueRepository>,
        notifier: Arc<dyn Notifier>,
        renderer: Arc<dyn MessageRenderer>,
        options: DispatcherOptions,
    ) -> Self {
        Self {
            assignments,
            preferences,
            queue,
            notifier,
            renderer,
            options,
        }
    }

    pub fn options(&self) -> &DispatcherOptions {
        &self.options
    }

    /// Claim up to `batch_limit` ready items and process each of them.
    ///
    /// Only a failed claim is returned as an error. Every claimed item is
    /// processed in isolation; failures are counted in the report.
    pub async fn dispatch(
        &self,
        now: DateTime<Utc>,
        batch_limit: usize,
    ) -> Result<DispatchReport, CadenceError> {
        if batch_limit == 0 {
            return Ok(DispatchReport::default());
        }

        let claimed = self.queue.claim_batch(now, batch_limit).await?;
        let mut report = DispatchReport {
            processed: claimed.len() as u64,
            ..DispatchReport::default()
        };
        if claimed.is_empty() {
            debug!("no queue items ready");
            return Ok(report);
        }

        let started = Instant::now();
        let concurrency = self.options.max_concurrency.clamp(1, claimed.len());
        let outcomes: Vec<_> = stream::iter(claimed)
            .map(|item| async move {
                let id = item.id.clone();
                (id, self.process(item, now, started).await)
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        for (id, outcome) in outcomes {
            match outcome {
                Ok(Outcome::Sent) => report.sent += 1,
                Ok(Outcome::Retried) => {
                    report.failed += 1;
                    report.retried += 1;
                }
                Ok(Outcome::Failed) => report.failed += 1,
                Ok(Outcome::Canceled) => report.canceled += 1,
                Ok(Outcome::Lost) => report.lost += 1,
                Err(e) if e.is_lease_lost() => {
                    warn!(queue_item_id = %id, "claim taken over before the outcome was recorded");
                    report.lost += 1;
                }
                Err(e) => {
                    warn!(queue_item_id = %id, error = %e, "failed to process queue item");
                    report.errors += 1;
                }
            }
        }

        info!(
            processed = report.processed,
            sent = report.sent,
            failed = report.failed,
            retried = report.retried,
            canceled = report.canceled,
            lost = report.lost,
            errors = report.errors,
            "dispatch complete"
        );
        Ok(report)
    }

    async fn process(
        &self,
        item: ClaimedItem,
        now: DateTime<Utc>,
        started: Instant,
    ) -> Result<Outcome, CadenceError> {
        let assignment = match self.assignments.get_assignment(&item.assignment_id).await? {
            Some(assignment) if assignment.is_active() => assignment,
            stale => {
                debug!(
                    queue_item_id = %item.id,
                    assignment_id = %item.assignment_id,
                    status = ?stale.map(|a| a.status),
                    "assignment no longer active, canceling reminder"
                );
                self.record(&item, item.mark_canceled(), now).await?;
                return Ok(Outcome::Canceled);
            }
        };

        let policy = self.policy_for(&item).await;
        let body = self.renderer.render(&RenderContext {
            template_slug: item.template_slug,
            assignment: &assignment,
            payload: &item.payload,
            timezone: policy.window.timezone,
        });
        let recipient = item.recipient();

        // Items queue behind the concurrency bound, so the lease is checked
        // against how far this run has progressed, not against its start.
        let elapsed =
            chrono::Duration::from_std(started.elapsed()).unwrap_or_else(|_| chrono::Duration::zero());
        if !self.queue.renew_claim(&item, now + elapsed).await? {
            warn!(
                queue_item_id = %item.id,
                "claim taken over by another dispatch run, skipping send"
            );
            return Ok(Outcome::Lost);
        }

        let sent = match tokio::time::timeout(
            self.options.send_timeout,
            self.notifier.send(item.channel, &recipient, &body),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(CadenceError::Timeout {
                duration: self.options.send_timeout,
            }),
        };

        match sent {
            Ok(()) => {
                debug!(queue_item_id = %item.id, channel = %item.channel, "reminder sent");
                self.record(&item, item.mark_sent(now), now).await?;
                Ok(Outcome::Sent)
            }
            Err(e) => {
                let detail = e.to_string();
                let attempt = item.attempt_count.saturating_add(1);
                match RetryPolicy::new(&policy).decide(now, attempt) {
                    RetryDecision::Retry { next_attempt_at } => {
                        warn!(
                            queue_item_id = %item.id,
                            channel = %item.channel,
                            attempt,
                            %next_attempt_at,
                            error = %detail,
                            "delivery failed, retry scheduled"
                        );
                        self.record(&item, item.mark_retrying(next_attempt_at, detail), now)
                            .await?;
                        Ok(Outcome::Retried)
                    }
                    RetryDecision::GiveUp => {
                        warn!(
                            queue_item_id = %item.id,
                            channel = %item.channel,
                            attempt,
                            error = %detail,
                            "delivery failed, retries exhausted"
                        );
                        self.record(&item, item.mark_failed(detail), now).await?;
                        Ok(Outcome::Failed)
                    }
                }
            }
        }
    }

    /// The provider's policy, or defaults if it cannot be read.
    async fn policy_for(&self, item: &ClaimedItem) -> DeliveryPolicy {
        match self
            .preferences
            .get_preference(&item.org_id, &item.provider_id)
            .await
        {
            Ok(preference) => preference.resolve(),
            Err(e) => {
                warn!(
                    queue_item_id = %item.id,
                    provider_id = %item.provider_id,
                    error = %e,
                    "failed to load reminder preference, using defaults"
                );
                DeliveryPolicy::default()
            }
        }
    }

    async fn record(
        &self,
        item: &ClaimedItem,
        patch: StatusPatch,
        now: DateTime<Utc>,
    ) -> Result<(), CadenceError> {
        self.queue.update_status(&item.id, &patch, now).await
    }
}
