// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reminder preference storage. List fields are stored as JSON arrays.

use cadence_core::CadenceError;
use cadence_core::types::ReminderPreference;
use rusqlite::params;

use crate::codec::{json_col, to_json};
use crate::database::{Database, map_tr_err};

/// The stored preference for `(org_id, provider_id)`, if any.
pub async fn find_preference(
    db: &Database,
    org_id: &str,
    provider_id: &str,
) -> Result<Option<ReminderPreference>, CadenceError> {
    let org_id = org_id.to_string();
    let provider_id = provider_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<ReminderPreference>, rusqlite::Error> {
            let result = conn.query_row(
                "SELECT timezone, window_start, window_end, days_of_week, channels_priority,
                        max_retries, retry_backoff_minutes
                 FROM reminder_preferences
                 WHERE org_id = ?1 AND provider_id = ?2",
                params![org_id, provider_id],
                |row| {
                    Ok(ReminderPreference {
                        timezone: row.get(0)?,
                        window_start: row.get(1)?,
                        window_end: row.get(2)?,
                        days_of_week: json_col(row, 3)?,
                        channels_priority: json_col(row, 4)?,
                        max_retries: row.get(5)?,
                        retry_backoff_minutes: row.get(6)?,
                    })
                },
            );
            match result {
                Ok(pref) => Ok(Some(pref)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Insert or replace the preference for `(org_id, provider_id)`.
pub async fn upsert_preference(
    db: &Database,
    org_id: &str,
    provider_id: &str,
    preference: &ReminderPreference,
) -> Result<(), CadenceError> {
    let org_id = org_id.to_string();
    let provider_id = provider_id.to_string();
    let pref = preference.clone();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO reminder_preferences
                    (org_id, provider_id, timezone, window_start, window_end, days_of_week,
                     channels_priority, max_retries, retry_backoff_minutes)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(org_id, provider_id) DO UPDATE SET
                    timezone = excluded.timezone,
                    window_start = excluded.window_start,
                    window_end = excluded.window_end,
                    days_of_week = excluded.days_of_week,
                    channels_priority = excluded.channels_priority,
                    max_retries = excluded.max_retries,
                    retry_backoff_minutes = excluded.retry_backoff_minutes",
                params![
                    org_id,
                    provider_id,
                    pref.timezone,
                    pref.window_start,
                    pref.window_end,
                    to_json(&pref.days_of_week)?,
                    to_json(&pref.channels_priority)?,
                    pref.max_retries,
                    pref.retry_backoff_minutes,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
