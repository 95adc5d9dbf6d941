// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection store adapters for the Handoff routing layer.
//!
//! Two interchangeable backends implement both store traits: a volatile
//! in-memory map keyed by normalized participant identity, and a durable
//! SQLite table store keyed by the sanitized partition key. SQLite access
//! goes through a single `tokio-rusqlite` writer with embedded migrations.

pub mod adapter;
pub mod database;
pub mod memory;
pub(crate) mod migrations;
pub mod queries;

use std::sync::Arc;

use tracing::info;

use handoff_config::model::{HandoffConfig, StorageBackend};
use handoff_core::{Clock, ConnectionStore, HandoffError, HandoffStore};

pub use adapter::{SqliteConnectionStore, SqliteHandoffStore};
pub use database::Database;
pub use memory::{InMemoryConnectionStore, InMemoryHandoffStore};

async fn open_database(config: &HandoffConfig) -> Result<Database, HandoffError> {
    let db = Database::open(&config.storage.database_path, config.storage.wal_mode).await?;
    info!(path = %config.storage.database_path, "sqlite storage opened");
    Ok(db)
}

/// Build the pending-set store selected by `[storage].backend`.
pub async fn open_connection_store(
    config: &HandoffConfig,
    clock: Arc<dyn Clock>,
) -> Result<Arc<dyn ConnectionStore>, HandoffError> {
    let store: Arc<dyn ConnectionStore> = match config.storage.backend {
        StorageBackend::Memory => Arc::new(InMemoryConnectionStore::new(clock)),
        StorageBackend::Sqlite => {
            Arc::new(SqliteConnectionStore::new(open_database(config).await?, clock))
        }
    };
    Ok(store)
}

/// Build the queue/user store selected by `[storage].backend`.
pub async fn open_handoff_store(
    config: &HandoffConfig,
    clock: Arc<dyn Clock>,
) -> Result<Arc<dyn HandoffStore>, HandoffError> {
    let limit = config.routing.max_logged_messages;
    let store: Arc<dyn HandoffStore> = match config.storage.backend {
        StorageBackend::Memory => Arc::new(InMemoryHandoffStore::new(clock, limit)),
        StorageBackend::Sqlite => Arc::new(SqliteHandoffStore::new(
            open_database(config).await?,
            clock,
            limit,
        )),
    };
    Ok(store)
}
