// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sample domain values.

use chrono::{DateTime, Utc};

use cadence_core::types::{Assignment, AssignmentModule, AssignmentStatus, ReminderPreference};

pub const ORG_ID: &str = "org-1";
pub const PROVIDER_ID: &str = "prov-1";

/// An active exercise assignment owned by [`ORG_ID`]/[`PROVIDER_ID`],
/// addressed to patient `pat-<id>`.
pub fn assignment(id: &str, due_at: Option<DateTime<Utc>>) -> Assignment {
    Assignment {
        id: id.to_string(),
        org_id: ORG_ID.to_string(),
        patient_id: format!("pat-{id}"),
        provider_id: PROVIDER_ID.to_string(),
        module: AssignmentModule::Exercise,
        title: format!("Exercise {id}"),
        due_at,
        status: AssignmentStatus::Active,
        last_done_at: None,
    }
}

/// A preference that allows sending at any minute of any day in UTC.
pub fn always_open_preference() -> ReminderPreference {
    ReminderPreference {
        timezone: "UTC".into(),
        window_start: "00:00".into(),
        window_end: "23:59".into(),
        days_of_week: (0..7).collect(),
        ..ReminderPreference::default()
    }
}
