// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Assignment reads, plus the upsert used to mirror them from the host application.

use cadence_core::CadenceError;
use cadence_core::types::{Assignment, AssignmentStatus};
use chrono::{DateTime, Duration, Utc};
use rusqlite::{Row, params};

use crate::codec::{enum_col, fmt_opt_ts, fmt_ts, opt_ts_col};
use crate::database::{Database, map_tr_err};

const COLUMNS: &str =
    "id, org_id, patient_id, provider_id, module, title, due_at, status, last_done_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Assignment> {
    Ok(Assignment {
        id: row.get(0)?,
        org_id: row.get(1)?,
        patient_id: row.get(2)?,
        provider_id: row.get(3)?,
        module: enum_col(row, 4)?,
        title: row.get(5)?,
        due_at: opt_ts_col(row, 6)?,
        status: enum_col(row, 7)?,
        last_done_at: opt_ts_col(row, 8)?,
    })
}

/// Insert or replace an assignment by id.
pub async fn upsert_assignment(db: &Database, assignment: &Assignment) -> Result<(), CadenceError> {
    let a = assignment.clone();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO assignments
                    (id, org_id, patient_id, provider_id, module, title, due_at, status, last_done_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(id) DO UPDATE SET
                    org_id = excluded.org_id,
                    patient_id = excluded.patient_id,
                    provider_id = excluded.provider_id,
                    module = excluded.module,
                    title = excluded.title,
                    due_at = excluded.due_at,
                    status = excluded.status,
                    last_done_at = excluded.last_done_at",
                params![
                    a.id,
                    a.org_id,
                    a.patient_id,
                    a.provider_id,
                    a.module.to_string(),
                    a.title,
                    fmt_opt_ts(a.due_at),
                    a.status.to_string(),
                    fmt_opt_ts(a.last_done_at),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Active assignments due at or before `now + horizon`, earliest first.
pub async fn active_due_soon(
    db: &Database,
    now: DateTime<Utc>,
    horizon: Duration,
) -> Result<Vec<Assignment>, CadenceError> {
    let until = fmt_ts(now + horizon);
    let active = AssignmentStatus::Active.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<Assignment>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM assignments
                 WHERE status = ?1 AND due_at IS NOT NULL AND due_at <= ?2
                 ORDER BY due_at ASC, id ASC"
            ))?;
            let rows = stmt.query_map(params![active, until], from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch an assignment by id regardless of status.
pub async fn get_assignment(db: &Database, id: &str) -> Result<Option<Assignment>, CadenceError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<Assignment>, rusqlite::Error> {
            let mut stmt =
                conn.prepare(&format!("SELECT {COLUMNS} FROM assignments WHERE id = ?1"))?;
            match stmt.query_row(params![id], from_row) {
                Ok(assignment) => Ok(Some(assignment)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Delete an assignment. Returns whether a row was removed.
pub async fn delete_assignment(db: &Database, id: &str) -> Result<bool, CadenceError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let removed = conn.execute("DELETE FROM assignments WHERE id = ?1", params![id])?;
            Ok(removed > 0)
        })
        .await
        .map_err(map_tr_err)
}
