// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reminder queue operations.
//!
//! The partial unique index `idx_reminder_queue_active_key` enforces one
//! outstanding item per `(org_id, assignment_id, template_slug)`. Claims take
//! a time-bounded lease (`locked_until`) inside an IMMEDIATE transaction, so
//! concurrent dispatchers never receive the same item while the lease holds.
//! Every claim also writes a fresh `claim_token`; renewals and patches are
//! compare-and-set on that token, so a dispatcher whose lease was taken over
//! can neither send nor record.

use cadence_core::CadenceError;
use cadence_core::types::{
    ClaimedItem, QueueItem, QueueStatus, QueueStatusCounts, StatusPatch, TemplateSlug,
};
use chrono::{DateTime, Duration, Utc};
use rusqlite::{Row, TransactionBehavior, params};

use crate::codec::{enum_col, fmt_opt_ts, fmt_ts, json_col, opt_ts_col, to_json, ts_col};
use crate::database::{Database, map_tr_err};

const COLUMNS: &str = "id, org_id, patient_id, provider_id, assignment_id, channel, \
     template_slug, payload, status, attempt_count, next_attempt_at, sent_at, last_error, \
     created_at, updated_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<QueueItem> {
    Ok(QueueItem {
        id: row.get(0)?,
        org_id: row.get(1)?,
        patient_id: row.get(2)?,
        provider_id: row.get(3)?,
        assignment_id: row.get(4)?,
        channel: enum_col(row, 5)?,
        template_slug: enum_col(row, 6)?,
        payload: json_col(row, 7)?,
        status: enum_col(row, 8)?,
        attempt_count: row.get(9)?,
        next_attempt_at: ts_col(row, 10)?,
        sent_at: opt_ts_col(row, 11)?,
        last_error: row.get(12)?,
        created_at: ts_col(row, 13)?,
        updated_at: ts_col(row, 14)?,
    })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

/// The outstanding item for a key, if any.
pub async fn find_active_by_key(
    db: &Database,
    org_id: &str,
    assignment_id: &str,
    template_slug: TemplateSlug,
) -> Result<Option<QueueItem>, CadenceError> {
    let org_id = org_id.to_string();
    let assignment_id = assignment_id.to_string();
    let slug = template_slug.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<QueueItem>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM reminder_queue
                 WHERE org_id = ?1 AND assignment_id = ?2 AND template_slug = ?3
                   AND status IN ('scheduled', 'retrying')
                 LIMIT 1"
            ))?;
            match stmt.query_row(params![org_id, assignment_id, slug], from_row) {
                Ok(item) => Ok(Some(item)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Insert a new item. A conflicting outstanding item yields
/// [`CadenceError::DuplicateKey`].
pub async fn insert(db: &Database, item: &QueueItem) -> Result<(), CadenceError> {
    let item = item.clone();
    db.connection()
        .call(move |conn| -> Result<Result<(), CadenceError>, rusqlite::Error> {
            let result = conn.execute(
                &format!(
                    "INSERT INTO reminder_queue ({COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
                ),
                params![
                    item.id,
                    item.org_id,
                    item.patient_id,
                    item.provider_id,
                    item.assignment_id,
                    item.channel.to_string(),
                    item.template_slug.to_string(),
                    to_json(&item.payload)?,
                    item.status.to_string(),
                    item.attempt_count,
                    fmt_ts(item.next_attempt_at),
                    fmt_opt_ts(item.sent_at),
                    item.last_error,
                    fmt_ts(item.created_at),
                    fmt_ts(item.updated_at),
                ],
            );
            match result {
                Ok(_) => Ok(Ok(())),
                Err(e) if is_unique_violation(&e) => Ok(Err(CadenceError::DuplicateKey {
                    org_id: item.org_id,
                    assignment_id: item.assignment_id,
                    template_slug: item.template_slug,
                })),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)?
}

/// Claim up to `limit` ready items, oldest created first, leasing each until
/// `now + lease`.
pub async fn claim_batch(
    db: &Database,
    now: DateTime<Utc>,
    limit: usize,
    lease: Duration,
) -> Result<Vec<ClaimedItem>, CadenceError> {
    if limit == 0 {
        return Ok(Vec::new());
    }
    let now_s = fmt_ts(now);
    let until = fmt_ts(now + lease);
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);

    db.connection()
        .call(move |conn| -> Result<Result<Vec<ClaimedItem>, CadenceError>, rusqlite::Error> {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let items = {
                let mut stmt = tx.prepare(&format!(
                    "SELECT {COLUMNS} FROM reminder_queue
                     WHERE status IN ('scheduled', 'retrying')
                       AND next_attempt_at <= ?1
                       AND (locked_until IS NULL OR locked_until <= ?1)
                     ORDER BY created_at ASC, rowid ASC
                     LIMIT ?2"
                ))?;
                let rows = stmt.query_map(params![now_s, limit], from_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            };
            let mut claimed = Vec::with_capacity(items.len());
            {
                let mut lease_stmt = tx.prepare(
                    "UPDATE reminder_queue SET locked_until = ?1, claim_token = ?2 WHERE id = ?3",
                )?;
                for item in items {
                    let item = match ClaimedItem::claim(item) {
                        Ok(item) => item,
                        Err(e) => return Ok(Err(e)),
                    };
                    lease_stmt.execute(params![until, item.claim_token(), item.id])?;
                    claimed.push(item);
                }
            }
            tx.commit()?;
            Ok(Ok(claimed))
        })
        .await
        .map_err(map_tr_err)?
}

/// Extend a claim's lease to `now + lease` if its token is still the one on
/// record and the item is still in flight.
pub async fn renew_claim(
    db: &Database,
    item: &ClaimedItem,
    now: DateTime<Utc>,
    lease: Duration,
) -> Result<bool, CadenceError> {
    let id = item.id.clone();
    let token = item.claim_token().to_string();
    let until = fmt_ts(now + lease);
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let changed = conn.execute(
                "UPDATE reminder_queue SET locked_until = ?1
                 WHERE id = ?2 AND claim_token = ?3
                   AND status IN ('scheduled', 'retrying')",
                params![until, id, token],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Apply a status patch to an in-flight item and release its lease.
///
/// The stored claim token must match the patch's, otherwise the item belongs
/// to a later claim and [`CadenceError::LeaseLost`] is returned.
pub async fn update_status(
    db: &Database,
    id: &str,
    patch: &StatusPatch,
    now: DateTime<Utc>,
) -> Result<(), CadenceError> {
    let id = id.to_string();
    let token = patch.claim_token().to_string();
    let next = patch.status();
    let attempt_count = patch.attempt_count();
    let next_attempt_at = fmt_opt_ts(patch.next_attempt_at());
    let sent_at = fmt_opt_ts(patch.sent_at());
    let last_error = patch.last_error().map(str::to_string);
    let now_s = fmt_ts(now);

    db.connection()
        .call(move |conn| -> Result<Result<(), CadenceError>, rusqlite::Error> {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let (current, held_by) = match tx.query_row(
                "SELECT status, claim_token FROM reminder_queue WHERE id = ?1",
                params![id],
                |row| Ok((enum_col::<QueueStatus>(row, 0)?, row.get::<_, Option<String>>(1)?)),
            ) {
                Ok(row) => row,
                Err(rusqlite::Error::QueryReturnedNoRows) => {
                    return Ok(Err(CadenceError::NotFound {
                        entity: "queue item",
                        id,
                    }));
                }
                Err(e) => return Err(e),
            };
            if !current.can_transition_to(next) {
                return Ok(Err(CadenceError::InvalidTransition {
                    id,
                    from: current,
                    to: next,
                }));
            }
            if held_by.as_deref() != Some(token.as_str()) {
                return Ok(Err(CadenceError::LeaseLost { id }));
            }
            tx.execute(
                "UPDATE reminder_queue SET
                    status = ?1,
                    attempt_count = ?2,
                    next_attempt_at = COALESCE(?3, next_attempt_at),
                    sent_at = COALESCE(?4, sent_at),
                    last_error = ?5,
                    locked_until = NULL,
                    claim_token = NULL,
                    updated_at = ?6
                 WHERE id = ?7",
                params![
                    next.to_string(),
                    attempt_count,
                    next_attempt_at,
                    sent_at,
                    last_error,
                    now_s,
                    id
                ],
            )?;
            tx.commit()?;
            Ok(Ok(()))
        })
        .await
        .map_err(map_tr_err)?
}

pub async fn get_item(db: &Database, id: &str) -> Result<Option<QueueItem>, CadenceError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<QueueItem>, rusqlite::Error> {
            let mut stmt =
                conn.prepare(&format!("SELECT {COLUMNS} FROM reminder_queue WHERE id = ?1"))?;
            match stmt.query_row(params![id], from_row) {
                Ok(item) => Ok(Some(item)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Items for one assignment, oldest first.
pub async fn list_for_assignment(
    db: &Database,
    assignment_id: &str,
) -> Result<Vec<QueueItem>, CadenceError> {
    let assignment_id = assignment_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<QueueItem>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM reminder_queue
                 WHERE assignment_id = ?1
                 ORDER BY created_at ASC, rowid ASC"
            ))?;
            let rows = stmt.query_map(params![assignment_id], from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn status_counts(db: &Database) -> Result<QueueStatusCounts, CadenceError> {
    let rows = db
        .connection()
        .call(|conn| -> Result<Vec<(QueueStatus, u64)>, rusqlite::Error> {
            let mut stmt =
                conn.prepare("SELECT status, COUNT(*) FROM reminder_queue GROUP BY status")?;
            let rows = stmt.query_map([], |row| {
                let count: i64 = row.get(1)?;
                Ok((enum_col(row, 0)?, u64::try_from(count).unwrap_or_default()))
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)?;

    let mut counts = QueueStatusCounts::default();
    for (status, count) in rows {
        counts.add(status, count);
    }
    Ok(counts)
}
