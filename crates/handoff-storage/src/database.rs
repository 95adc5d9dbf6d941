// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite connection handle, PRAGMA setup and error mapping.
//!
//! All statements run on tokio-rusqlite's single background thread, so the
//! [`Database`] handle is the only writer. Do NOT open additional connections
//! for writes: every check-then-act sequence relies on that serialization.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::debug;

use handoff_core::HandoffError;

use crate::migrations::run_migrations;

/// Errors raised inside a `call` closure on the writer thread.
#[derive(Debug, Error)]
pub(crate) enum StoreError {
    #[error(transparent)]
    Sql(#[from] rusqlite::Error),

    #[error("participant column is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("migration failed: {0}")]
    Migration(String),

    #[error("corrupt row: {0}")]
    Corrupt(String),

    /// A domain rejection decided inside the transaction.
    #[error(transparent)]
    Rejected(HandoffError),
}

impl From<HandoffError> for StoreError {
    fn from(err: HandoffError) -> Self {
        Self::Rejected(err)
    }
}

/// Map a tokio-rusqlite failure to the domain error, unwrapping rejections.
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error<StoreError>) -> HandoffError {
    match e {
        tokio_rusqlite::Error::Error(StoreError::Rejected(err)) => err,
        tokio_rusqlite::Error::Error(other) => HandoffError::storage(other),
        other => HandoffError::storage(other.to_string()),
    }
}

pub(crate) fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

pub(crate) fn from_millis(millis: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| StoreError::Corrupt(format!("timestamp {millis} out of range")))
}

/// A migrated SQLite database shared by both store families.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (creating if needed) the database file, apply PRAGMAs and migrations.
    pub async fn open(path: &str, wal_mode: bool) -> Result<Self, HandoffError> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(HandoffError::storage)?;
            }
        }
        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| HandoffError::storage(e.to_string()))?;
        let db = Self { conn };
        db.prepare(wal_mode).await?;
        debug!(path, wal_mode, "database opened");
        Ok(db)
    }

    /// A private in-memory database, migrated and ready.
    pub async fn open_in_memory() -> Result<Self, HandoffError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(|e| HandoffError::storage(e.to_string()))?;
        let db = Self { conn };
        db.prepare(false).await?;
        Ok(db)
    }

    async fn prepare(&self, wal_mode: bool) -> Result<(), HandoffError> {
        self.conn
            .call(move |conn| -> Result<(), StoreError> {
                if wal_mode {
                    conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")?;
                }
                conn.execute_batch("PRAGMA foreign_keys = ON;")?;
                conn.busy_timeout(Duration::from_secs(5))?;
                run_migrations(conn)
            })
            .await
            .map_err(map_tr_err)
    }

    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Flush the WAL into the main database file.
    pub async fn checkpoint(&self) -> Result<(), HandoffError> {
        self.conn
            .call(|conn| -> Result<(), StoreError> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    /// Run a trivial query to prove the writer thread is alive.
    pub async fn ping(&self) -> Result<(), HandoffError> {
        self.conn
            .call(|conn| -> Result<(), StoreError> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    /// Checkpoint and close the connection.
    pub async fn close(self) -> Result<(), HandoffError> {
        self.checkpoint().await?;
        self.conn
            .close()
            .await
            .map_err(|e| HandoffError::storage(e.to_string()))
    }
}
