// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory repositories for deterministic testing.
//!
//! `MemoryStore` implements every repository trait plus `ContactDirectory`
//! with the same guarantees the SQLite store gives: a unique active key per
//! `(org_id, assignment_id, template_slug)` and leased, exclusive claims.
//! Individual operations can be made to fail for isolation tests.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use cadence_core::types::{
    AdapterType, Assignment, AssignmentStatus, ClaimedItem, HealthStatus, QueueItem,
    QueueStatusCounts, ReminderPreference, StatusPatch, TemplateSlug,
};
use cadence_core::{
    AssignmentRepository, CadenceError, ContactDirectory, PluginAdapter, PreferenceRepository,
    QueueRepository,
};

/// Lease used when none is configured, matching the dispatcher default.
pub const DEFAULT_CLAIM_LEASE_SECS: i64 = 300;

#[derive(Default)]
struct State {
    assignments: HashMap<String, Assignment>,
    preferences: HashMap<(String, String), ReminderPreference>,
    contacts: HashMap<(String, String), String>,
    /// Insertion order doubles as the tie-breaker for equal `created_at`.
    items: Vec<QueueItem>,
    /// Item id to (lease expiry, claim token).
    leases: HashMap<String, (DateTime<Utc>, String)>,
}

#[derive(Default)]
struct Faults {
    listing: bool,
    claims: bool,
    preferences: bool,
    hide_active_items: bool,
    inserts_for: HashSet<String>,
    updates_for: HashSet<String>,
}

/// A shared in-memory store.
pub struct MemoryStore {
    state: Mutex<State>,
    faults: Mutex<Faults>,
    claim_lease: Duration,
}

impl MemoryStore {
    /// Create an empty store with the default claim lease.
    pub fn new() -> Self {
        Self::with_claim_lease(Duration::seconds(DEFAULT_CLAIM_LEASE_SECS))
    }

    /// Create an empty store whose claims are held for `lease`.
    pub fn with_claim_lease(lease: Duration) -> Self {
        Self {
            state: Mutex::new(State::default()),
            faults: Mutex::new(Faults::default()),
            claim_lease: lease,
        }
    }

    // --- Seeding ---

    /// Insert or replace an assignment.
    pub async fn put_assignment(&self, assignment: Assignment) {
        self.state
            .lock()
            .await
            .assignments
            .insert(assignment.id.clone(), assignment);
    }

    /// Change an assignment's status. Returns `false` if it does not exist.
    pub async fn set_assignment_status(&self, id: &str, status: AssignmentStatus) -> bool {
        match self.state.lock().await.assignments.get_mut(id) {
            Some(assignment) => {
                assignment.status = status;
                true
            }
            None => false,
        }
    }

    /// Delete an assignment.
    pub async fn remove_assignment(&self, id: &str) {
        self.state.lock().await.assignments.remove(id);
    }

    pub async fn put_preference(&self, org_id: &str, provider_id: &str, pref: ReminderPreference) {
        self.state
            .lock()
            .await
            .preferences
            .insert((org_id.to_string(), provider_id.to_string()), pref);
    }

    pub async fn put_contact(&self, org_id: &str, patient_id: &str, phone: &str) {
        self.state
            .lock()
            .await
            .contacts
            .insert((org_id.to_string(), patient_id.to_string()), phone.to_string());
    }

    /// Store a queue item as-is, bypassing the unique-key check.
    ///
    /// Used to seed items mid-chain (e.g. already `retrying`).
    pub async fn insert_raw(&self, item: QueueItem) {
        self.state.lock().await.items.push(item);
    }

    // --- Inspection ---

    /// Snapshot of every queue item, in insertion order.
    pub async fn items(&self) -> Vec<QueueItem> {
        self.state.lock().await.items.clone()
    }

    /// Items that are still `scheduled` or `retrying`.
    pub async fn active_items(&self) -> Vec<QueueItem> {
        self.state
            .lock()
            .await
            .items
            .iter()
            .filter(|item| item.status.is_active())
            .cloned()
            .collect()
    }

    /// Whether a claim lease is currently recorded for the item.
    pub async fn is_leased(&self, id: &str) -> bool {
        self.state.lock().await.leases.contains_key(id)
    }

    // --- Fault injection ---

    /// Make `active_due_soon` fail.
    pub async fn fail_listing(&self, fail: bool) {
        self.faults.lock().await.listing = fail;
    }

    /// Make `claim_batch` fail.
    pub async fn fail_claims(&self, fail: bool) {
        self.faults.lock().await.claims = fail;
    }

    /// Make `get_preference` fail.
    pub async fn fail_preferences(&self, fail: bool) {
        self.faults.lock().await.preferences = fail;
    }

    /// Make `insert` fail for items of the given assignment.
    pub async fn fail_inserts_for(&self, assignment_id: &str) {
        self.faults
            .lock()
            .await
            .inserts_for
            .insert(assignment_id.to_string());
    }

    /// Make `update_status` fail for the given queue item.
    pub async fn fail_updates_for(&self, queue_item_id: &str) {
        self.faults
            .lock()
            .await
            .updates_for
            .insert(queue_item_id.to_string());
    }

    /// Make `find_active_by_key` report nothing, so a subsequent insert
    /// runs into the unique key the way a racing builder would.
    pub async fn hide_active_items(&self, hide: bool) {
        self.faults.lock().await.hide_active_items = hide;
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn injected(operation: &str) -> CadenceError {
    debug!(operation, "injecting storage failure");
    CadenceError::Storage {
        source: format!("injected {operation} failure").into(),
    }
}

#[async_trait]
impl PluginAdapter for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, CadenceError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), CadenceError> {
        Ok(())
    }
}

#[async_trait]
impl AssignmentRepository for MemoryStore {
    async fn active_due_soon(
        &self,
        now: DateTime<Utc>,
        horizon: Duration,
    ) -> Result<Vec<Assignment>, CadenceError> {
        if self.faults.lock().await.listing {
            return Err(injected("listing"));
        }
        let cutoff = now + horizon;
        let state = self.state.lock().await;
        let mut due: Vec<Assignment> = state
            .assignments
            .values()
            .filter(|a| a.is_active() && a.due_at.is_some_and(|d| d <= cutoff))
            .cloned()
            .collect();
        due.sort_by(|a, b| a.due_at.cmp(&b.due_at).then_with(|| a.id.cmp(&b.id)));
        Ok(due)
    }

    async fn get_assignment(&self, id: &str) -> Result<Option<Assignment>, CadenceError> {
        Ok(self.state.lock().await.assignments.get(id).cloned())
    }
}

#[async_trait]
impl PreferenceRepository for MemoryStore {
    async fn get_preference(
        &self,
        org_id: &str,
        provider_id: &str,
    ) -> Result<ReminderPreference, CadenceError> {
        if self.faults.lock().await.preferences {
            return Err(injected("preference"));
        }
        Ok(self
            .state
            .lock()
            .await
            .preferences
            .get(&(org_id.to_string(), provider_id.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl ContactDirectory for MemoryStore {
    async fn phone_for(&self, org_id: &str, patient_id: &str) -> Result<Option<String>, CadenceError> {
        Ok(self
            .state
            .lock()
            .await
            .contacts
            .get(&(org_id.to_string(), patient_id.to_string()))
            .cloned())
    }
}

#[async_trait]
impl QueueRepository for MemoryStore {
    async fn find_active_by_key(
        &self,
        org_id: &str,
        assignment_id: &str,
        template_slug: TemplateSlug,
    ) -> Result<Option<QueueItem>, CadenceError> {
        if self.faults.lock().await.hide_active_items {
            return Ok(None);
        }
        Ok(self
            .state
            .lock()
            .await
            .items
            .iter()
            .find(|item| {
                item.status.is_active()
                    && item.org_id == org_id
                    && item.assignment_id == assignment_id
                    && item.template_slug == template_slug
            })
            .cloned())
    }

    async fn insert(&self, item: &QueueItem) -> Result<(), CadenceError> {
        if self.faults.lock().await.inserts_for.contains(&item.assignment_id) {
            return Err(injected("insert"));
        }
        let mut state = self.state.lock().await;
        let key = item.key();
        if item.status.is_active()
            && state
                .items
                .iter()
                .any(|existing| existing.status.is_active() && existing.key() == key)
        {
            return Err(CadenceError::DuplicateKey {
                org_id: key.org_id,
                assignment_id: key.assignment_id,
                template_slug: key.template_slug,
            });
        }
        state.items.push(item.clone());
        Ok(())
    }

    async fn claim_batch(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ClaimedItem>, CadenceError> {
        if self.faults.lock().await.claims {
            return Err(injected("claim"));
        }
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let mut ready: Vec<&QueueItem> = state
            .items
            .iter()
            .filter(|item| {
                item.status.is_active()
                    && item.next_attempt_at <= now
                    && state.leases.get(&item.id).is_none_or(|(until, _)| *until <= now)
            })
            .collect();
        // Stable sort keeps insertion order for equal timestamps.
        ready.sort_by_key(|item| item.created_at);

        let mut claimed = Vec::new();
        for item in ready.into_iter().take(limit) {
            claimed.push(ClaimedItem::claim(item.clone())?);
        }
        let until = now + self.claim_lease;
        for item in &claimed {
            state
                .leases
                .insert(item.id.clone(), (until, item.claim_token().to_string()));
        }
        Ok(claimed)
    }

    async fn renew_claim(&self, item: &ClaimedItem, now: DateTime<Utc>) -> Result<bool, CadenceError> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let in_flight = state
            .items
            .iter()
            .any(|stored| stored.id == item.id && stored.status.is_active());
        match state.leases.get_mut(&item.id) {
            Some((until, token)) if in_flight && token.as_str() == item.claim_token() => {
                *until = now + self.claim_lease;
                Ok(true)
            }
            _ => {
                debug!(queue_item_id = %item.id, "claim renewal refused");
                Ok(false)
            }
        }
    }

    async fn update_status(
        &self,
        id: &str,
        patch: &StatusPatch,
        now: DateTime<Utc>,
    ) -> Result<(), CadenceError> {
        if self.faults.lock().await.updates_for.contains(id) {
            return Err(injected("update"));
        }
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let item = state
            .items
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or_else(|| CadenceError::NotFound {
                entity: "queue item",
                id: id.to_string(),
            })?;
        if !item.status.can_transition_to(patch.status()) {
            return Err(CadenceError::InvalidTransition {
                id: id.to_string(),
                from: item.status,
                to: patch.status(),
            });
        }
        let held = state
            .leases
            .get(id)
            .is_some_and(|(_, token)| token.as_str() == patch.claim_token());
        if !held {
            return Err(CadenceError::LeaseLost { id: id.to_string() });
        }
        item.apply(patch, now)?;
        state.leases.remove(id);
        Ok(())
    }

    async fn get_item(&self, id: &str) -> Result<Option<QueueItem>, CadenceError> {
        Ok(self
            .state
            .lock()
            .await
            .items
            .iter()
            .find(|item| item.id == id)
            .cloned())
    }

    async fn status_counts(&self) -> Result<QueueStatusCounts, CadenceError> {
        let mut counts = QueueStatusCounts::default();
        for item in &self.state.lock().await.items {
            counts.add(item.status, 1);
        }
        Ok(counts)
    }
}
