// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection store traits for the two handoff models.
//!
//! A deployment picks one model. Stores own every connection and user
//! record; callers never keep copies that could drift from the store.
//! Every mutation is atomic with respect to the store's own state and
//! enforces that a participant is in at most one pending or established
//! connection.

use async_trait::async_trait;

use crate::connection::{EstablishedConnection, PendingConnection, RemovedConnection};
use crate::error::HandoffError;
use crate::traits::adapter::PluginAdapter;
use crate::types::ParticipantRef;
use crate::user::HandoffUser;

/// Storage for the pending-set model.
#[async_trait]
pub trait ConnectionStore: PluginAdapter {
    /// All pending connections, oldest request first.
    async fn list_pending(&self) -> Result<Vec<PendingConnection>, HandoffError>;

    /// Add a pending connection.
    ///
    /// Fails with `AlreadyConnected` if the participant is pending or established.
    async fn add_pending(
        &self,
        participant: &ParticipantRef,
    ) -> Result<PendingConnection, HandoffError>;

    /// All established connections.
    async fn list_established(&self) -> Result<Vec<EstablishedConnection>, HandoffError>;

    /// Add an established connection between two unconnected participants.
    async fn add_established(
        &self,
        first: &ParticipantRef,
        second: &ParticipantRef,
    ) -> Result<EstablishedConnection, HandoffError>;

    /// Pair `joiner` with `target`'s pending connection in one mutation.
    ///
    /// Fails with `AlreadyConnected` if `joiner` is pending or established and
    /// with `NoSuchPendingConnection` if `target` is not pending.
    async fn promote_pending(
        &self,
        target: &ParticipantRef,
        joiner: &ParticipantRef,
    ) -> Result<EstablishedConnection, HandoffError>;

    /// Remove the participant's pending connection, else the established
    /// connection containing it. Returns `None` when there was nothing to remove.
    async fn remove_by_participant(
        &self,
        participant: &ParticipantRef,
    ) -> Result<Option<RemovedConnection>, HandoffError>;
}

/// Storage for the queue/user model.
#[async_trait]
pub trait HandoffStore: PluginAdapter {
    /// The user's record, created in the `bot` state on first sight.
    async fn find_or_create_user(&self, user: &ParticipantRef)
        -> Result<HandoffUser, HandoffError>;

    /// Prepend a line to the user's conversation log.
    async fn log_message(
        &self,
        user: &ParticipantRef,
        from: &str,
        text: &str,
    ) -> Result<HandoffUser, HandoffError>;

    /// The user currently connected to `agent`, if any.
    async fn find_user_by_agent(
        &self,
        agent: &ParticipantRef,
    ) -> Result<Option<HandoffUser>, HandoffError>;

    /// Put the user in the queue, refreshing the queue time if already queued.
    async fn enqueue(&self, user: &ParticipantRef) -> Result<HandoffUser, HandoffError>;

    /// Return the user to the bot, leaving the queue or an agent connection.
    async fn dequeue(&self, user: &ParticipantRef) -> Result<HandoffUser, HandoffError>;

    /// Connect `agent` to the oldest queued user. `None` when the queue is empty.
    async fn connect_oldest_queued(
        &self,
        agent: &ParticipantRef,
    ) -> Result<Option<HandoffUser>, HandoffError>;

    /// Return the agent's user to the bot. Fails with `NotConnected` if none.
    async fn disconnect_agent(&self, agent: &ParticipantRef)
        -> Result<HandoffUser, HandoffError>;

    /// Queued users, oldest queue entry first.
    async fn list_queued(&self) -> Result<Vec<HandoffUser>, HandoffError>;
}
