// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection lifecycle for the pending-set model.

use std::sync::Arc;

use tracing::{debug, info};

use handoff_core::{
    same_conversation, ConnectionStore, EstablishedConnection, HandoffError, ParticipantRef,
    PendingConnection, RemovedConnection,
};

use crate::recording;

/// Creates, pairs and tears down connections. All invariant checks happen
/// inside single store mutations, so concurrent callers cannot interleave.
#[derive(Clone)]
pub struct ConnectionManager {
    store: Arc<dyn ConnectionStore>,
}

impl ConnectionManager {
    pub fn new(store: Arc<dyn ConnectionStore>) -> Self {
        Self { store }
    }

    /// Request a connection. `AlreadyConnected` if `participant` is pending or established.
    pub async fn start_connection(
        &self,
        participant: &ParticipantRef,
    ) -> Result<PendingConnection, HandoffError> {
        participant.validate()?;
        let pending = self.store.add_pending(participant).await?;
        info!(participant = %participant, "connection requested");
        recording::record_connection("requested");
        self.refresh_depth().await;
        Ok(pending)
    }

    /// Pair `joiner` with `target`'s pending connection.
    pub async fn connect_to(
        &self,
        joiner: &ParticipantRef,
        target: &ParticipantRef,
    ) -> Result<EstablishedConnection, HandoffError> {
        joiner.validate()?;
        target.validate()?;
        let conn = self.store.promote_pending(target, joiner).await?;
        info!(joiner = %joiner, target = %target, "connection established");
        recording::record_connection("established");
        self.refresh_depth().await;
        Ok(conn)
    }

    /// Remove whichever connection contains `participant`, from either side.
    pub async fn end_connection(
        &self,
        participant: &ParticipantRef,
    ) -> Result<RemovedConnection, HandoffError> {
        participant.validate()?;
        let removed = self
            .store
            .remove_by_participant(participant)
            .await?
            .ok_or_else(|| HandoffError::not_connected(participant))?;
        match &removed {
            RemovedConnection::Pending(_) => {
                info!(participant = %participant, "pending connection cancelled");
                self.refresh_depth().await;
            }
            RemovedConnection::Established(_) => {
                info!(participant = %participant, "connection ended");
            }
        }
        recording::record_connection("ended");
        Ok(removed)
    }

    /// Pending connections, oldest first.
    pub async fn list_pending(&self) -> Result<Vec<PendingConnection>, HandoffError> {
        self.store.list_pending().await
    }

    pub async fn is_pending(&self, participant: &ParticipantRef) -> Result<bool, HandoffError> {
        participant.validate()?;
        Ok(self
            .store
            .list_pending()
            .await?
            .iter()
            .any(|p| same_conversation(&p.participant, participant)))
    }

    /// Join the oldest pending participant. `None` when nobody is waiting.
    ///
    /// A pending entry taken by a concurrent joiner is skipped and the next
    /// oldest is tried.
    pub async fn connect_to_oldest_pending(
        &self,
        joiner: &ParticipantRef,
    ) -> Result<Option<EstablishedConnection>, HandoffError> {
        joiner.validate()?;
        for pending in self.store.list_pending().await? {
            if same_conversation(&pending.participant, joiner) {
                continue;
            }
            match self.connect_to(joiner, &pending.participant).await {
                Ok(conn) => return Ok(Some(conn)),
                Err(HandoffError::NoSuchPendingConnection { participant }) => {
                    debug!(%participant, "pending connection taken concurrently, trying next");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    async fn refresh_depth(&self) {
        if let Ok(pending) = self.store.list_pending().await {
            recording::set_queue_depth(pending.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use handoff_core::{ChannelAccount, ConversationAccount, ManualClock};
    use handoff_storage::InMemoryConnectionStore;

    use crate::resolver::HandoffResolver;

    fn participant(id: &str) -> ParticipantRef {
        ParticipantRef::new(
            ChannelAccount::new(id, id),
            ConversationAccount::new(format!("conv-{id}")),
            "test",
        )
    }

    fn setup() -> (ConnectionManager, HandoffResolver, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::from_secs(0));
        let store: Arc<dyn ConnectionStore> = Arc::new(InMemoryConnectionStore::new(clock.clone()));
        (
            ConnectionManager::new(store.clone()),
            HandoffResolver::new(store),
            clock,
        )
    }

    #[tokio::test]
    async fn start_twice_is_already_connected() {
        let (manager, _, _) = setup();
        let r = participant("r");
        manager.start_connection(&r).await.unwrap();
        assert!(matches!(
            manager.start_connection(&r).await,
            Err(HandoffError::AlreadyConnected { .. })
        ));
        assert!(manager.is_pending(&r).await.unwrap());
    }

    #[tokio::test]
    async fn connect_to_makes_lookup_symmetric() {
        let (manager, resolver, _) = setup();
        let (a, b) = (participant("a"), participant("b"));
        manager.start_connection(&b).await.unwrap();
        manager.connect_to(&a, &b).await.unwrap();

        assert_eq!(resolver.find_connected_to(&a).await.unwrap(), Some(b.clone()));
        assert_eq!(resolver.find_connected_to(&b).await.unwrap(), Some(a.clone()));
        assert!(!manager.is_pending(&b).await.unwrap());
    }

    #[tokio::test]
    async fn connect_to_requires_pending_target() {
        let (manager, _, _) = setup();
        assert!(matches!(
            manager.connect_to(&participant("a"), &participant("b")).await,
            Err(HandoffError::NoSuchPendingConnection { .. })
        ));
    }

    #[tokio::test]
    async fn connected_joiner_cannot_join_again() {
        let (manager, _, _) = setup();
        let (a, b, c) = (participant("a"), participant("b"), participant("c"));
        manager.start_connection(&b).await.unwrap();
        manager.start_connection(&c).await.unwrap();
        manager.connect_to(&a, &b).await.unwrap();
        assert!(matches!(
            manager.connect_to(&a, &c).await,
            Err(HandoffError::AlreadyConnected { .. })
        ));
        assert!(manager.is_pending(&c).await.unwrap());
    }

    #[tokio::test]
    async fn end_from_either_side_disconnects_both() {
        let (manager, resolver, _) = setup();
        let (a, b) = (participant("a"), participant("b"));
        manager.start_connection(&a).await.unwrap();
        manager.connect_to(&b, &a).await.unwrap();

        manager.end_connection(&b).await.unwrap();
        assert_eq!(resolver.find_connected_to(&a).await.unwrap(), None);
        assert_eq!(resolver.find_connected_to(&b).await.unwrap(), None);
        assert!(matches!(
            manager.end_connection(&a).await,
            Err(HandoffError::NotConnected { .. })
        ));
    }

    #[tokio::test]
    async fn end_cancels_pending() {
        let (manager, _, _) = setup();
        let r = participant("r");
        manager.start_connection(&r).await.unwrap();
        let removed = manager.end_connection(&r).await.unwrap();
        assert!(matches!(removed, RemovedConnection::Pending(_)));
        assert!(manager.list_pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn oldest_pending_is_joined_first() {
        let (manager, resolver, clock) = setup();
        for id in ["u1", "u2", "u3"] {
            clock.advance(TimeDelta::seconds(1));
            manager.start_connection(&participant(id)).await.unwrap();
        }
        let mut order = Vec::new();
        for agent in ["agent1", "agent2", "agent3"] {
            let conn = manager
                .connect_to_oldest_pending(&participant(agent))
                .await
                .unwrap()
                .unwrap();
            order.push(conn.participants[0].display_name().to_string());
            assert_eq!(
                resolver.find_connected_to(&participant(agent)).await.unwrap(),
                Some(conn.participants[0].clone())
            );
        }
        assert_eq!(order, vec!["u1", "u2", "u3"]);
        assert!(manager
            .connect_to_oldest_pending(&participant("agent4"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn concurrent_joins_never_double_pair() {
        let (manager, resolver, _) = setup();
        manager.start_connection(&participant("u1")).await.unwrap();
        manager.start_connection(&participant("u2")).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..6 {
            let manager = manager.clone();
            handles.push(tokio::spawn(async move {
                manager
                    .connect_to_oldest_pending(&participant(&format!("agent{i}")))
                    .await
                    .unwrap()
            }));
        }
        let mut paired = 0;
        for h in handles {
            if h.await.unwrap().is_some() {
                paired += 1;
            }
        }
        assert_eq!(paired, 2);
        assert!(manager.list_pending().await.unwrap().is_empty());
        assert!(resolver
            .find_connected_to(&participant("u1"))
            .await
            .unwrap()
            .is_some());
    }
}
