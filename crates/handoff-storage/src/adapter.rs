// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementations of the connection store traits.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use handoff_core::{
    AdapterType, Clock, ConnectionStore, EstablishedConnection, HandoffError, HandoffStore,
    HandoffUser, HealthStatus, ParticipantRef, PendingConnection, PluginAdapter,
    RemovedConnection,
};

use crate::database::Database;
use crate::queries;

async fn sqlite_health(db: &Database) -> Result<HealthStatus, HandoffError> {
    match db.ping().await {
        Ok(()) => Ok(HealthStatus::Healthy),
        Err(e) => Ok(HealthStatus::Unhealthy(e.to_string())),
    }
}

/// Pending-set model persisted in SQLite.
pub struct SqliteConnectionStore {
    db: Database,
    clock: Arc<dyn Clock>,
}

impl SqliteConnectionStore {
    pub fn new(db: Database, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }
}

#[async_trait]
impl PluginAdapter for SqliteConnectionStore {
    fn name(&self) -> &str {
        "sqlite-connections"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::ConnectionStore
    }

    async fn health_check(&self) -> Result<HealthStatus, HandoffError> {
        sqlite_health(&self.db).await
    }

    async fn shutdown(&self) -> Result<(), HandoffError> {
        self.db.checkpoint().await?;
        debug!("shutdown: WAL checkpoint complete");
        Ok(())
    }
}

#[async_trait]
impl ConnectionStore for SqliteConnectionStore {
    async fn list_pending(&self) -> Result<Vec<PendingConnection>, HandoffError> {
        queries::connections::list_pending(&self.db).await
    }

    async fn add_pending(
        &self,
        participant: &ParticipantRef,
    ) -> Result<PendingConnection, HandoffError> {
        queries::connections::add_pending(&self.db, participant, self.clock.now()).await
    }

    async fn list_established(&self) -> Result<Vec<EstablishedConnection>, HandoffError> {
        queries::connections::list_established(&self.db).await
    }

    async fn add_established(
        &self,
        first: &ParticipantRef,
        second: &ParticipantRef,
    ) -> Result<EstablishedConnection, HandoffError> {
        queries::connections::add_established(&self.db, first, second, self.clock.now()).await
    }

    async fn promote_pending(
        &self,
        target: &ParticipantRef,
        joiner: &ParticipantRef,
    ) -> Result<EstablishedConnection, HandoffError> {
        queries::connections::promote_pending(&self.db, target, joiner, self.clock.now()).await
    }

    async fn remove_by_participant(
        &self,
        participant: &ParticipantRef,
    ) -> Result<Option<RemovedConnection>, HandoffError> {
        queries::connections::remove_by_participant(&self.db, participant).await
    }
}

/// Queue/user model persisted in SQLite.
pub struct SqliteHandoffStore {
    db: Database,
    clock: Arc<dyn Clock>,
    max_logged_messages: usize,
}

impl SqliteHandoffStore {
    pub fn new(db: Database, clock: Arc<dyn Clock>, max_logged_messages: usize) -> Self {
        Self {
            db,
            clock,
            max_logged_messages,
        }
    }
}

#[async_trait]
impl PluginAdapter for SqliteHandoffStore {
    fn name(&self) -> &str {
        "sqlite-handoff"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::HandoffStore
    }

    async fn health_check(&self) -> Result<HealthStatus, HandoffError> {
        sqlite_health(&self.db).await
    }

    async fn shutdown(&self) -> Result<(), HandoffError> {
        self.db.checkpoint().await?;
        debug!("shutdown: WAL checkpoint complete");
        Ok(())
    }
}

#[async_trait]
impl HandoffStore for SqliteHandoffStore {
    async fn find_or_create_user(
        &self,
        user: &ParticipantRef,
    ) -> Result<HandoffUser, HandoffError> {
        queries::users::find_or_create_user(&self.db, user, self.clock.now()).await
    }

    async fn log_message(
        &self,
        user: &ParticipantRef,
        from: &str,
        text: &str,
    ) -> Result<HandoffUser, HandoffError> {
        queries::users::log_message(
            &self.db,
            user,
            from,
            text,
            self.clock.now(),
            self.max_logged_messages,
        )
        .await
    }

    async fn find_user_by_agent(
        &self,
        agent: &ParticipantRef,
    ) -> Result<Option<HandoffUser>, HandoffError> {
        queries::users::find_user_by_agent(&self.db, agent).await
    }

    async fn enqueue(&self, user: &ParticipantRef) -> Result<HandoffUser, HandoffError> {
        queries::users::enqueue(&self.db, user, self.clock.now()).await
    }

    async fn dequeue(&self, user: &ParticipantRef) -> Result<HandoffUser, HandoffError> {
        queries::users::dequeue(&self.db, user, self.clock.now()).await
    }

    async fn connect_oldest_queued(
        &self,
        agent: &ParticipantRef,
    ) -> Result<Option<HandoffUser>, HandoffError> {
        queries::users::connect_oldest_queued(&self.db, agent).await
    }

    async fn disconnect_agent(
        &self,
        agent: &ParticipantRef,
    ) -> Result<HandoffUser, HandoffError> {
        queries::users::disconnect_agent(&self.db, agent).await
    }

    async fn list_queued(&self) -> Result<Vec<HandoffUser>, HandoffError> {
        queries::users::list_queued(&self.db).await
    }
}
