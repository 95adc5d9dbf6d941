// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Volatile in-process stores keyed by [`ParticipantKey`].
//!
//! Each store guards its whole state with one `RwLock`. Reads share the lock;
//! every mutation takes the write lock for its full check-then-act sequence,
//! so concurrent callers are linearized per store instance.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use handoff_core::{
    same_conversation, AdapterType, Clock, ConnectionStore, EstablishedConnection, HandoffError,
    HandoffStore, HandoffUser, HealthStatus, LoggedMessage, ParticipantKey, ParticipantRef,
    PendingConnection, PluginAdapter, RemovedConnection, UserState,
};

#[derive(Default)]
struct ConnectionTables {
    next_id: u64,
    pending: BTreeMap<u64, PendingConnection>,
    pending_index: HashMap<ParticipantKey, u64>,
    established: BTreeMap<u64, EstablishedConnection>,
    /// Both members of every established pair.
    established_index: HashMap<ParticipantKey, u64>,
}

impl ConnectionTables {
    fn is_connected(&self, key: &ParticipantKey) -> bool {
        self.pending_index.contains_key(key) || self.established_index.contains_key(key)
    }

    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn insert_established(
        &mut self,
        first: (ParticipantKey, ParticipantRef),
        second: (ParticipantKey, ParticipantRef),
        at: chrono::DateTime<chrono::Utc>,
    ) -> EstablishedConnection {
        let id = self.allocate_id();
        let conn = EstablishedConnection::new(first.1, second.1, at);
        self.established_index.insert(first.0, id);
        self.established_index.insert(second.0, id);
        self.established.insert(id, conn.clone());
        conn
    }
}

/// Pending-set model held in process memory.
pub struct InMemoryConnectionStore {
    tables: RwLock<ConnectionTables>,
    clock: Arc<dyn Clock>,
}

impl InMemoryConnectionStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            tables: RwLock::new(ConnectionTables::default()),
            clock,
        }
    }
}

#[async_trait]
impl PluginAdapter for InMemoryConnectionStore {
    fn name(&self) -> &str {
        "memory-connections"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::ConnectionStore
    }

    async fn health_check(&self) -> Result<HealthStatus, HandoffError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), HandoffError> {
        Ok(())
    }
}

#[async_trait]
impl ConnectionStore for InMemoryConnectionStore {
    async fn list_pending(&self) -> Result<Vec<PendingConnection>, HandoffError> {
        Ok(self.tables.read().await.pending.values().cloned().collect())
    }

    async fn add_pending(
        &self,
        participant: &ParticipantRef,
    ) -> Result<PendingConnection, HandoffError> {
        let key = participant.key()?;
        let mut tables = self.tables.write().await;
        if tables.is_connected(&key) {
            return Err(HandoffError::already_connected(participant));
        }
        let id = tables.allocate_id();
        let pending = PendingConnection {
            participant: participant.clone(),
            requested_at: self.clock.now(),
        };
        tables.pending.insert(id, pending.clone());
        tables.pending_index.insert(key, id);
        debug!(participant = %participant, "pending connection added");
        Ok(pending)
    }

    async fn list_established(&self) -> Result<Vec<EstablishedConnection>, HandoffError> {
        Ok(self.tables.read().await.established.values().cloned().collect())
    }

    async fn add_established(
        &self,
        first: &ParticipantRef,
        second: &ParticipantRef,
    ) -> Result<EstablishedConnection, HandoffError> {
        let first_key = first.key()?;
        let second_key = second.key()?;
        if first_key == second_key {
            return Err(HandoffError::InvalidInput(format!(
                "{first}: cannot connect a participant to itself"
            )));
        }
        let mut tables = self.tables.write().await;
        for (key, participant) in [(&first_key, first), (&second_key, second)] {
            if tables.is_connected(key) {
                return Err(HandoffError::already_connected(participant));
            }
        }
        let at = self.clock.now();
        let conn =
            tables.insert_established((first_key, first.clone()), (second_key, second.clone()), at);
        debug!(first = %first, second = %second, "established connection added");
        Ok(conn)
    }

    async fn promote_pending(
        &self,
        target: &ParticipantRef,
        joiner: &ParticipantRef,
    ) -> Result<EstablishedConnection, HandoffError> {
        let target_key = target.key()?;
        let joiner_key = joiner.key()?;
        let mut tables = self.tables.write().await;
        if tables.is_connected(&joiner_key) {
            return Err(HandoffError::already_connected(joiner));
        }
        let id = tables
            .pending_index
            .remove(&target_key)
            .ok_or_else(|| HandoffError::no_such_pending(target))?;
        let pending = tables.pending.remove(&id).ok_or_else(|| {
            HandoffError::ConsistencyViolation(format!("pending index for {target} is dangling"))
        })?;
        let at = self.clock.now();
        let conn = tables.insert_established(
            (target_key, pending.participant),
            (joiner_key, joiner.clone()),
            at,
        );
        debug!(target = %target, joiner = %joiner, "pending connection promoted");
        Ok(conn)
    }

    async fn remove_by_participant(
        &self,
        participant: &ParticipantRef,
    ) -> Result<Option<RemovedConnection>, HandoffError> {
        let key = participant.key()?;
        let mut tables = self.tables.write().await;

        if let Some(id) = tables.pending_index.remove(&key) {
            let removed = tables.pending.remove(&id).map(RemovedConnection::Pending);
            debug!(participant = %participant, "pending connection removed");
            return Ok(removed);
        }

        let Some(id) = tables.established_index.get(&key).copied() else {
            return Ok(None);
        };
        let Some(conn) = tables.established.remove(&id) else {
            tables.established_index.remove(&key);
            return Ok(None);
        };
        for member in &conn.participants {
            if let Ok(member_key) = member.key() {
                tables.established_index.remove(&member_key);
            }
        }
        debug!(participant = %participant, "established connection removed");
        Ok(Some(RemovedConnection::Established(conn)))
    }
}

#[derive(Default)]
struct UserTables {
    next_seq: u64,
    users: HashMap<ParticipantKey, HandoffUser>,
}

impl UserTables {
    fn find_or_create(
        &mut self,
        key: ParticipantKey,
        participant: &ParticipantRef,
        clock: &dyn Clock,
    ) -> &mut HandoffUser {
        let next_seq = &mut self.next_seq;
        self.users.entry(key).or_insert_with(|| {
            *next_seq += 1;
            debug!(user = %participant, seq = *next_seq, "handoff user created");
            HandoffUser::new(participant.clone(), *next_seq, clock.now())
        })
    }

    /// Keys of every user whose agent is `agent`.
    fn keys_for_agent(&self, agent: &ParticipantRef) -> Vec<ParticipantKey> {
        self.users
            .iter()
            .filter(|(_, user)| {
                user.agent
                    .as_ref()
                    .is_some_and(|a| same_conversation(a, agent))
            })
            .map(|(key, _)| key.clone())
            .collect()
    }

    fn single_key_for_agent(
        &self,
        agent: &ParticipantRef,
    ) -> Result<Option<ParticipantKey>, HandoffError> {
        let mut keys = self.keys_for_agent(agent);
        match keys.len() {
            0 => Ok(None),
            1 => Ok(keys.pop()),
            n => Err(HandoffError::ConsistencyViolation(format!(
                "agent {agent} is connected to {n} users"
            ))),
        }
    }

    /// Whether `key` is waiting for or talking to an agent as a user.
    fn is_engaged_user(&self, key: &ParticipantKey) -> bool {
        self.users
            .get(key)
            .is_some_and(|u| matches!(u.state, UserState::Queued | UserState::Agent))
    }
}

/// Queue/user model held in process memory.
pub struct InMemoryHandoffStore {
    tables: RwLock<UserTables>,
    clock: Arc<dyn Clock>,
    max_logged_messages: usize,
}

impl InMemoryHandoffStore {
    pub fn new(clock: Arc<dyn Clock>, max_logged_messages: usize) -> Self {
        Self {
            tables: RwLock::new(UserTables::default()),
            clock,
            max_logged_messages,
        }
    }
}

#[async_trait]
impl PluginAdapter for InMemoryHandoffStore {
    fn name(&self) -> &str {
        "memory-handoff"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::HandoffStore
    }

    async fn health_check(&self) -> Result<HealthStatus, HandoffError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), HandoffError> {
        Ok(())
    }
}

#[async_trait]
impl HandoffStore for InMemoryHandoffStore {
    async fn find_or_create_user(
        &self,
        user: &ParticipantRef,
    ) -> Result<HandoffUser, HandoffError> {
        let key = user.key()?;
        if let Some(existing) = self.tables.read().await.users.get(&key) {
            return Ok(existing.clone());
        }
        let mut tables = self.tables.write().await;
        Ok(tables.find_or_create(key, user, self.clock.as_ref()).clone())
    }

    async fn log_message(
        &self,
        user: &ParticipantRef,
        from: &str,
        text: &str,
    ) -> Result<HandoffUser, HandoffError> {
        let key = user.key()?;
        let at = self.clock.now();
        let mut tables = self.tables.write().await;
        let record = tables.find_or_create(key, user, self.clock.as_ref());
        record.push_message(
            LoggedMessage {
                from: from.to_string(),
                text: text.to_string(),
                at,
            },
            self.max_logged_messages,
        );
        Ok(record.clone())
    }

    async fn find_user_by_agent(
        &self,
        agent: &ParticipantRef,
    ) -> Result<Option<HandoffUser>, HandoffError> {
        agent.validate()?;
        let tables = self.tables.read().await;
        let key = tables.single_key_for_agent(agent)?;
        Ok(key.and_then(|k| tables.users.get(&k).cloned()))
    }

    async fn enqueue(&self, user: &ParticipantRef) -> Result<HandoffUser, HandoffError> {
        let key = user.key()?;
        let at = self.clock.now();
        let mut tables = self.tables.write().await;
        if tables.single_key_for_agent(user)?.is_some() {
            return Err(HandoffError::already_connected(user));
        }
        let record = tables.find_or_create(key, user, self.clock.as_ref());
        if record.state == UserState::Agent {
            return Err(HandoffError::already_connected(user));
        }
        record.mark_queued(at);
        debug!(user = %user, "user queued");
        Ok(record.clone())
    }

    async fn dequeue(&self, user: &ParticipantRef) -> Result<HandoffUser, HandoffError> {
        let key = user.key()?;
        let mut tables = self.tables.write().await;
        let record = tables.find_or_create(key, user, self.clock.as_ref());
        record.mark_bot();
        debug!(user = %user, "user returned to bot");
        Ok(record.clone())
    }

    async fn connect_oldest_queued(
        &self,
        agent: &ParticipantRef,
    ) -> Result<Option<HandoffUser>, HandoffError> {
        let agent_key = agent.key()?;
        let mut tables = self.tables.write().await;
        if tables.single_key_for_agent(agent)?.is_some() || tables.is_engaged_user(&agent_key) {
            return Err(HandoffError::already_connected(agent));
        }

        let mut queued: Vec<(&ParticipantKey, &HandoffUser)> = tables
            .users
            .iter()
            .filter(|(k, u)| u.state == UserState::Queued && **k != agent_key)
            .collect();
        queued.sort_by_key(|(_, u)| u.queue_order());
        let Some(key) = queued.first().map(|(k, _)| (*k).clone()) else {
            return Ok(None);
        };

        let record = tables.users.get_mut(&key).ok_or_else(|| {
            HandoffError::Internal(format!("queued user {} disappeared", key.partition_key()))
        })?;
        record.mark_connected(agent.clone());
        debug!(agent = %agent, user = %record.participant, "agent connected to oldest queued user");
        Ok(Some(record.clone()))
    }

    async fn disconnect_agent(
        &self,
        agent: &ParticipantRef,
    ) -> Result<HandoffUser, HandoffError> {
        agent.validate()?;
        let mut tables = self.tables.write().await;
        let key = tables
            .single_key_for_agent(agent)?
            .ok_or_else(|| HandoffError::not_connected(agent))?;
        let record = tables.users.get_mut(&key).ok_or_else(|| {
            HandoffError::Internal(format!("user {} disappeared", key.partition_key()))
        })?;
        record.mark_bot();
        debug!(agent = %agent, user = %record.participant, "agent disconnected");
        Ok(record.clone())
    }

    async fn list_queued(&self) -> Result<Vec<HandoffUser>, HandoffError> {
        let tables = self.tables.read().await;
        let mut queued: Vec<HandoffUser> = tables
            .users
            .values()
            .filter(|u| u.state == UserState::Queued)
            .cloned()
            .collect();
        queued.sort_by_key(HandoffUser::queue_order);
        Ok(queued)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use handoff_core::{ChannelAccount, ConversationAccount, ManualClock};

    fn participant(id: &str) -> ParticipantRef {
        ParticipantRef::new(
            ChannelAccount::new(id, id),
            ConversationAccount::new(format!("conv-{id}")),
            "test",
        )
    }

    fn connection_store() -> InMemoryConnectionStore {
        InMemoryConnectionStore::new(Arc::new(ManualClock::from_secs(1)))
    }

    #[tokio::test]
    async fn add_pending_rejects_duplicates() {
        let store = connection_store();
        let a = participant("a");
        store.add_pending(&a).await.unwrap();
        let err = store.add_pending(&a).await.unwrap_err();
        assert!(matches!(err, HandoffError::AlreadyConnected { .. }));
        assert_eq!(store.list_pending().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn promote_moves_pending_to_established() {
        let store = connection_store();
        let (a, b) = (participant("a"), participant("b"));
        store.add_pending(&a).await.unwrap();
        let conn = store.promote_pending(&a, &b).await.unwrap();

        assert_eq!(conn.participants, [a.clone(), b.clone()]);
        assert!(store.list_pending().await.unwrap().is_empty());
        assert_eq!(store.list_established().await.unwrap().len(), 1);
        assert!(matches!(
            store.add_pending(&b).await,
            Err(HandoffError::AlreadyConnected { .. })
        ));
    }

    #[tokio::test]
    async fn promote_requires_pending_target() {
        let store = connection_store();
        let err = store
            .promote_pending(&participant("a"), &participant("b"))
            .await
            .unwrap_err();
        assert!(matches!(err, HandoffError::NoSuchPendingConnection { .. }));
    }

    #[tokio::test]
    async fn remove_from_either_side_drops_whole_pair() {
        let store = connection_store();
        let (a, b) = (participant("a"), participant("b"));
        store.add_established(&a, &b).await.unwrap();

        let removed = store.remove_by_participant(&b).await.unwrap();
        assert!(matches!(removed, Some(RemovedConnection::Established(_))));
        assert!(store.list_established().await.unwrap().is_empty());
        // Both sides are free again.
        store.add_pending(&a).await.unwrap();
        store.add_pending(&b).await.unwrap();
    }

    #[tokio::test]
    async fn remove_nonexistent_is_noop() {
        let store = connection_store();
        assert!(store
            .remove_by_participant(&participant("x"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn invalid_refs_never_reach_the_tables() {
        let store = connection_store();
        let mut bad = participant("a");
        bad.user = None;
        assert!(matches!(
            store.add_pending(&bad).await,
            Err(HandoffError::InvalidInput(_))
        ));
        assert!(store.list_pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_promotions_pair_target_once() {
        let store = Arc::new(connection_store());
        let target = participant("target");
        store.add_pending(&target).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = Arc::clone(&store);
            let target = target.clone();
            handles.push(tokio::spawn(async move {
                store
                    .promote_pending(&target, &participant(&format!("j{i}")))
                    .await
                    .is_ok()
            }));
        }
        let mut successes = 0;
        for h in handles {
            if h.await.unwrap() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
        assert_eq!(store.list_established().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn queue_is_fifo_with_seq_tiebreak() {
        let clock = Arc::new(ManualClock::from_secs(100));
        let store = InMemoryHandoffStore::new(clock.clone(), 10);
        let agent = participant("agent1");

        // u2 and u3 share a queue time; u2 arrived in the store first.
        store.find_or_create_user(&participant("u2")).await.unwrap();
        store.find_or_create_user(&participant("u3")).await.unwrap();
        store.enqueue(&participant("u1")).await.unwrap();
        clock.advance(TimeDelta::seconds(1));
        store.enqueue(&participant("u3")).await.unwrap();
        store.enqueue(&participant("u2")).await.unwrap();

        let names: Vec<String> = store
            .list_queued()
            .await
            .unwrap()
            .iter()
            .map(|u| u.display_name().to_string())
            .collect();
        assert_eq!(names, vec!["u1", "u2", "u3"]);

        let first = store.connect_oldest_queued(&agent).await.unwrap().unwrap();
        assert_eq!(first.display_name(), "u1");
        assert_eq!(first.state, UserState::Agent);
        assert!(first.queued_at.is_none());
    }

    #[tokio::test]
    async fn agent_cannot_take_two_users() {
        let store = InMemoryHandoffStore::new(Arc::new(ManualClock::from_secs(1)), 10);
        let agent = participant("agent1");
        store.enqueue(&participant("u1")).await.unwrap();
        store.enqueue(&participant("u2")).await.unwrap();
        store.connect_oldest_queued(&agent).await.unwrap();
        assert!(matches!(
            store.connect_oldest_queued(&agent).await,
            Err(HandoffError::AlreadyConnected { .. })
        ));
        assert_eq!(store.list_queued().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn disconnect_clears_agent_reference() {
        let store = InMemoryHandoffStore::new(Arc::new(ManualClock::from_secs(1)), 10);
        let agent = participant("agent1");
        store.enqueue(&participant("u1")).await.unwrap();
        store.connect_oldest_queued(&agent).await.unwrap();

        let user = store.disconnect_agent(&agent).await.unwrap();
        assert_eq!(user.state, UserState::Bot);
        assert!(user.agent.is_none());
        assert!(store.find_user_by_agent(&agent).await.unwrap().is_none());
        assert!(matches!(
            store.disconnect_agent(&agent).await,
            Err(HandoffError::NotConnected { .. })
        ));
    }

    #[tokio::test]
    async fn connect_on_empty_queue_returns_none() {
        let store = InMemoryHandoffStore::new(Arc::new(ManualClock::from_secs(1)), 10);
        assert!(store
            .connect_oldest_queued(&participant("agent1"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn log_is_capped_most_recent_first() {
        let store = InMemoryHandoffStore::new(Arc::new(ManualClock::from_secs(1)), 2);
        let u = participant("u1");
        for text in ["one", "two", "three"] {
            store.log_message(&u, "u1", text).await.unwrap();
        }
        let user = store.find_or_create_user(&u).await.unwrap();
        let texts: Vec<&str> = user.messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["three", "two"]);
    }
}
