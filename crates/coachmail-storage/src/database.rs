// SPDX-FileCopyrightText: 2026 Coachmail Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background
//! thread. Do NOT create additional Connection instances for writes.

use std::path::Path;

use tokio_rusqlite::Connection;
use tracing::debug;

use coachmail_core::CoachmailError;

/// Helper to convert tokio-rusqlite errors into `CoachmailError::Storage`.
pub fn map_tr_err(e: tokio_rusqlite::Error) -> CoachmailError {
    CoachmailError::Storage {
        source: Box::new(e),
    }
}

fn storage_err<E: std::error::Error + Send + Sync + 'static>(e: E) -> CoachmailError {
    CoachmailError::Storage {
        source: Box::new(e),
    }
}

/// Handle to the SQLite database.
///
/// Cheap to clone; all clones share the single background connection.
#[derive(Clone)]
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the database at `path`, apply PRAGMAs, and run all
    /// pending migrations.
    pub async fn open(path: &str) -> Result<Self, CoachmailError> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(storage_err)?;
        }

        // Migrations use a short-lived blocking connection so refinery can
        // drive the transaction itself.
        let migrate_path = path.to_string();
        tokio::task::spawn_blocking(move || -> Result<(), CoachmailError> {
            let mut conn = rusqlite::Connection::open(&migrate_path).map_err(storage_err)?;
            crate::migrations::run_migrations(&mut conn)
        })
        .await
        .map_err(|e| CoachmailError::Internal(format!("migration task failed: {e}")))??;

        let conn = Connection::open(path).await.map_err(storage_err)?;
        conn.call(|conn| -> Result<(), rusqlite::Error> {
            conn.execute_batch(
                "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA foreign_keys = ON;
                 PRAGMA busy_timeout = 5000;",
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        debug!(path = %path, "database opened");
        Ok(Self { conn })
    }

    /// The shared tokio-rusqlite connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Checkpoint the WAL. Call before process shutdown.
    pub async fn close(&self) -> Result<(), CoachmailError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}
