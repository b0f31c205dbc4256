// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Patient phone numbers used by the channel router.

use cadence_core::CadenceError;
use rusqlite::params;

use crate::database::{Database, map_tr_err};

pub async fn find_phone(
    db: &Database,
    org_id: &str,
    patient_id: &str,
) -> Result<Option<String>, CadenceError> {
    let org_id = org_id.to_string();
    let patient_id = patient_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<String>, rusqlite::Error> {
            match conn.query_row(
                "SELECT phone FROM patient_contacts WHERE org_id = ?1 AND patient_id = ?2",
                params![org_id, patient_id],
                |row| row.get(0),
            ) {
                Ok(phone) => Ok(Some(phone)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

pub async fn upsert_contact(
    db: &Database,
    org_id: &str,
    patient_id: &str,
    phone: &str,
) -> Result<(), CadenceError> {
    let org_id = org_id.to_string();
    let patient_id = patient_id.to_string();
    let phone = phone.to_string();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO patient_contacts (org_id, patient_id, phone) VALUES (?1, ?2, ?3)
                 ON CONFLICT(org_id, patient_id) DO UPDATE SET phone = excluded.phone",
                params![org_id, patient_id, phone],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
