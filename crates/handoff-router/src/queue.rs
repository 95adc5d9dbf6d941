// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lifecycle operations for the queue/user model.

use std::sync::Arc;

use tracing::info;

use handoff_core::{HandoffError, HandoffStore, HandoffUser, ParticipantRef};

use crate::recording;

#[derive(Clone)]
pub struct QueueManager {
    store: Arc<dyn HandoffStore>,
}

impl QueueManager {
    pub fn new(store: Arc<dyn HandoffStore>) -> Self {
        Self { store }
    }

    /// Queue `user` for an agent. Re-queuing refreshes the queue time.
    pub async fn queue_for_agent(&self, user: &ParticipantRef) -> Result<HandoffUser, HandoffError> {
        user.validate()?;
        let record = self.store.enqueue(user).await?;
        info!(user = %user, "user queued for agent");
        recording::record_connection("queued");
        self.refresh_depth().await;
        Ok(record)
    }

    /// Return `user` to the bot from the queue or an agent connection.
    pub async fn unqueue_for_agent(
        &self,
        user: &ParticipantRef,
    ) -> Result<HandoffUser, HandoffError> {
        user.validate()?;
        let record = self.store.dequeue(user).await?;
        info!(user = %user, "user returned to bot");
        recording::record_connection("unqueued");
        self.refresh_depth().await;
        Ok(record)
    }

    /// Pair `agent` with the oldest queued user. `None` when the queue is empty.
    pub async fn connect_to_agent(
        &self,
        agent: &ParticipantRef,
    ) -> Result<Option<HandoffUser>, HandoffError> {
        agent.validate()?;
        let Some(user) = self.store.connect_oldest_queued(agent).await? else {
            return Ok(None);
        };
        info!(agent = %agent, user = %user.participant, "agent connected to user");
        recording::record_connection("established");
        self.refresh_depth().await;
        Ok(Some(user))
    }

    /// Return the agent's user to the bot. `NotConnected` if the agent has none.
    pub async fn disconnect_from_agent(
        &self,
        agent: &ParticipantRef,
    ) -> Result<HandoffUser, HandoffError> {
        agent.validate()?;
        let user = self.store.disconnect_agent(agent).await?;
        info!(agent = %agent, user = %user.participant, "agent disconnected from user");
        recording::record_connection("ended");
        Ok(user)
    }

    /// Queued users, oldest first.
    pub async fn list_queue(&self) -> Result<Vec<HandoffUser>, HandoffError> {
        self.store.list_queued().await
    }

    async fn refresh_depth(&self) {
        if let Ok(queued) = self.store.list_queued().await {
            recording::set_queue_depth(queued.len());
        }
    }
}
