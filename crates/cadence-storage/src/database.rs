// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All statements are serialized through tokio-rusqlite's single background
//! thread. Do NOT open additional connections for writes.

use std::path::Path;
use std::time::Duration;

use cadence_core::CadenceError;
use tracing::debug;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Convert a tokio-rusqlite error into [`CadenceError::Storage`].
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> CadenceError {
    CadenceError::Storage {
        source: Box::new(e),
    }
}

/// Handle to the Cadence SQLite database.
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (or create) the database at `path` in WAL mode and run pending migrations.
    pub async fn open(path: &str) -> Result<Self, CadenceError> {
        Self::open_with_options(path, true).await
    }

    /// Open the database, choosing the journal mode explicitly.
    pub async fn open_with_options(path: &str, wal_mode: bool) -> Result<Self, CadenceError> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| CadenceError::Storage {
                source: Box::new(e),
            })?;
        }

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| CadenceError::Storage {
                source: Box::new(e),
            })?;

        conn.call(
            move |conn| -> Result<Result<(), CadenceError>, rusqlite::Error> {
                if wal_mode {
                    let mode: String =
                        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
                    debug!(journal_mode = %mode, "journal mode set");
                    conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
                }
                conn.execute_batch("PRAGMA foreign_keys = ON;")?;
                conn.busy_timeout(BUSY_TIMEOUT)?;
                Ok(crate::migrations::run_migrations(conn))
            },
        )
        .await
        .map_err(map_tr_err)??;

        debug!(path, wal_mode, "database opened");
        Ok(Self { conn })
    }

    /// The underlying async connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Checkpoint the WAL and close the connection.
    pub async fn close(self) -> Result<(), CadenceError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        self.conn.close().await.map_err(|e| CadenceError::Storage {
            source: e.to_string().into(),
        })?;
        debug!("database closed");
        Ok(())
    }
}
