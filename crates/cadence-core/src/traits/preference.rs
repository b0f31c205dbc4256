// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-only access to per-provider reminder preferences.

use async_trait::async_trait;

use crate::error::CadenceError;
use crate::types::ReminderPreference;

#[async_trait]
pub trait PreferenceRepository: Send + Sync {
    /// Preference for `(org_id, provider_id)`, or
    /// [`ReminderPreference::default`] when none is stored.
    async fn get_preference(
        &self,
        org_id: &str,
        provider_id: &str,
    ) -> Result<ReminderPreference, CadenceError>;
}
