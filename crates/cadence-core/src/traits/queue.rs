// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable reminder queue.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::CadenceError;
use crate::types::{ClaimedItem, QueueItem, QueueStatusCounts, StatusPatch, TemplateSlug};

/// Storage contract for queue items.
///
/// Implementations must enforce two guarantees at the storage boundary:
///
/// - **Unique active key**: at most one item per
///   `(org_id, assignment_id, template_slug)` may be `scheduled` or
///   `retrying`. A conflicting [`insert`](Self::insert) returns
///   [`CadenceError::DuplicateKey`].
/// - **Exclusive claim**: an item returned by [`claim_batch`](Self::claim_batch)
///   is not returned by any other claim until it is patched or its lease expires.
///   Once the lease has been taken over, [`renew_claim`](Self::renew_claim)
///   returns `false` and [`update_status`](Self::update_status) returns
///   [`CadenceError::LeaseLost`] for the old claim.
#[async_trait]
pub trait QueueRepository: Send + Sync {
    /// The outstanding (`scheduled`/`retrying`) item for the key, if any.
    async fn find_active_by_key(
        &self,
        org_id: &str,
        assignment_id: &str,
        template_slug: TemplateSlug,
    ) -> Result<Option<QueueItem>, CadenceError>;

    /// Insert a new item.
    async fn insert(&self, item: &QueueItem) -> Result<(), CadenceError>;

    /// Atomically claim up to `limit` in-flight items with
    /// `next_attempt_at <= now`, oldest created first.
    async fn claim_batch(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ClaimedItem>, CadenceError>;

    /// Extend the lease to `now` plus the lease length if the claim is still
    /// the one on record and the item is still in flight.
    async fn renew_claim(&self, item: &ClaimedItem, now: DateTime<Utc>) -> Result<bool, CadenceError>;

    /// Apply a status patch. Fails with [`CadenceError::InvalidTransition`]
    /// if the stored item is no longer in flight, and with
    /// [`CadenceError::LeaseLost`] if the patch's claim has been superseded.
    async fn update_status(
        &self,
        id: &str,
        patch: &StatusPatch,
        now: DateTime<Utc>,
    ) -> Result<(), CadenceError>;

    /// Fetch a single item by id.
    async fn get_item(&self, id: &str) -> Result<Option<QueueItem>, CadenceError>;

    /// Number of items per status.
    async fn status_counts(&self) -> Result<QueueStatusCounts, CadenceError>;
}
