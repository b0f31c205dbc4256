// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the storage and repository traits.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::OnceCell;
use tracing::debug;

use cadence_config::model::StorageConfig;
use cadence_core::types::{
    Assignment, ClaimedItem, QueueItem, QueueStatusCounts, ReminderPreference, StatusPatch,
    TemplateSlug,
};
use cadence_core::{
    AdapterType, AssignmentRepository, CadenceError, ContactDirectory, HealthStatus,
    PluginAdapter, PreferenceRepository, QueueRepository, StorageAdapter,
};

use crate::database::{Database, map_tr_err};
use crate::queries;

/// Default time a claimed queue item stays invisible to other dispatchers.
pub const DEFAULT_CLAIM_LEASE_SECS: i64 = 300;

/// SQLite-backed store for assignments, preferences, contacts, and the queue.
///
/// The database is opened by [`StorageAdapter::initialize`]; every other
/// operation fails with [`CadenceError::Storage`] until then.
pub struct SqliteStore {
    config: StorageConfig,
    claim_lease: Duration,
    db: OnceCell<Database>,
}

impl SqliteStore {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            claim_lease: Duration::seconds(DEFAULT_CLAIM_LEASE_SECS),
            db: OnceCell::new(),
        }
    }

    /// How long a claim stays exclusive. Should outlast the send timeout.
    pub fn with_claim_lease(mut self, lease: std::time::Duration) -> Self {
        self.claim_lease =
            Duration::from_std(lease).unwrap_or(Duration::seconds(DEFAULT_CLAIM_LEASE_SECS));
        self
    }

    pub fn claim_lease(&self) -> Duration {
        self.claim_lease
    }

    fn db(&self) -> Result<&Database, CadenceError> {
        self.db.get().ok_or_else(|| CadenceError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }

    async fn checkpoint(db: &Database) -> Result<(), CadenceError> {
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    // --- Seeding, used by the host application and the CLI ---

    pub async fn upsert_assignment(&self, assignment: &Assignment) -> Result<(), CadenceError> {
        queries::assignments::upsert_assignment(self.db()?, assignment).await
    }

    pub async fn delete_assignment(&self, id: &str) -> Result<bool, CadenceError> {
        queries::assignments::delete_assignment(self.db()?, id).await
    }

    pub async fn upsert_preference(
        &self,
        org_id: &str,
        provider_id: &str,
        preference: &ReminderPreference,
    ) -> Result<(), CadenceError> {
        queries::preferences::upsert_preference(self.db()?, org_id, provider_id, preference).await
    }

    pub async fn upsert_contact(
        &self,
        org_id: &str,
        patient_id: &str,
        phone: &str,
    ) -> Result<(), CadenceError> {
        queries::contacts::upsert_contact(self.db()?, org_id, patient_id, phone).await
    }

    pub async fn queue_for_assignment(
        &self,
        assignment_id: &str,
    ) -> Result<Vec<QueueItem>, CadenceError> {
        queries::queue::list_for_assignment(self.db()?, assignment_id).await
    }
}

#[async_trait]
impl PluginAdapter for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, CadenceError> {
        let Ok(db) = self.db() else {
            return Ok(HealthStatus::Unhealthy("storage not initialized".to_string()));
        };
        let probe = db
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await;
        match probe {
            Ok(()) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(e.to_string())),
        }
    }

    async fn shutdown(&self) -> Result<(), CadenceError> {
        if let Some(db) = self.db.get() {
            Self::checkpoint(db).await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStore {
    async fn initialize(&self) -> Result<(), CadenceError> {
        let db = Database::open_with_options(&self.config.database_path, self.config.wal_mode)
            .await?;
        self.db.set(db).map_err(|_| CadenceError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), CadenceError> {
        Self::checkpoint(self.db()?).await?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}

#[async_trait]
impl AssignmentRepository for SqliteStore {
    async fn active_due_soon(
        &self,
        now: DateTime<Utc>,
        horizon: Duration,
    ) -> Result<Vec<Assignment>, CadenceError> {
        queries::assignments::active_due_soon(self.db()?, now, horizon).await
    }

    async fn get_assignment(&self, id: &str) -> Result<Option<Assignment>, CadenceError> {
        queries::assignments::get_assignment(self.db()?, id).await
    }
}

#[async_trait]
impl PreferenceRepository for SqliteStore {
    async fn get_preference(
        &self,
        org_id: &str,
        provider_id: &str,
    ) -> Result<ReminderPreference, CadenceError> {
        Ok(
            queries::preferences::find_preference(self.db()?, org_id, provider_id)
                .await?
                .unwrap_or_default(),
        )
    }
}

#[async_trait]
impl ContactDirectory for SqliteStore {
    async fn phone_for(
        &self,
        org_id: &str,
        patient_id: &str,
    ) -> Result<Option<String>, CadenceError> {
        queries::contacts::find_phone(self.db()?, org_id, patient_id).await
    }
}

#[async_trait]
impl QueueRepository for SqliteStore {
    async fn find_active_by_key(
        &self,
        org_id: &str,
        assignment_id: &str,
        template_slug: TemplateSlug,
    ) -> Result<Option<QueueItem>, CadenceError> {
        queries::queue::find_active_by_key(self.db()?, org_id, assignment_id, template_slug).await
    }

    async fn insert(&self, item: &QueueItem) -> Result<(), CadenceError> {
        queries::queue::insert(self.db()?, item).await
    }

    async fn claim_batch(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ClaimedItem>, CadenceError> {
        queries::queue::claim_batch(self.db()?, now, limit, self.claim_lease).await
    }

    async fn renew_claim(&self, item: &ClaimedItem, now: DateTime<Utc>) -> Result<bool, CadenceError> {
        queries::queue::renew_claim(self.db()?, item, now, self.claim_lease).await
    }

    async fn update_status(
        &self,
        id: &str,
        patch: &StatusPatch,
        now: DateTime<Utc>,
    ) -> Result<(), CadenceError> {
        queries::queue::update_status(self.db()?, id, patch, now).await
    }

    async fn get_item(&self, id: &str) -> Result<Option<QueueItem>, CadenceError> {
        queries::queue::get_item(self.db()?, id).await
    }

    async fn status_counts(&self) -> Result<QueueStatusCounts, CadenceError> {
        queries::queue::status_counts(self.db()?).await
    }
}
