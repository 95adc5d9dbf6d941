// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end routing tests.
//!
//! `TestHarness` assembles a relay for one routing mode over one storage
//! backend, with a [`MockTransport`] and a manual clock that ticks one
//! second per message so queue order is deterministic.

use std::sync::Arc;

use chrono::TimeDelta;
use tempfile::TempDir;
use tracing::debug;

use handoff_config::model::{HandoffConfig, RoutingMode, StorageBackend};
use handoff_core::{
    ChannelAccount, Clock, ConversationAccount, HandoffError, InboundMessage, ManualClock,
};
use handoff_router::{build_relay, Relay, RoutingOutcome, RoutingStores};
use handoff_storage::{open_connection_store, open_handoff_store};

use crate::mock_transport::MockTransport;

/// Channel id stamped on every harness message.
pub const TEST_CHANNEL: &str = "test";

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    config: HandoffConfig,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            config: HandoffConfig::default(),
        }
    }

    pub fn with_mode(mut self, mode: RoutingMode) -> Self {
        self.config.routing.mode = mode;
        self
    }

    pub fn with_backend(mut self, backend: StorageBackend) -> Self {
        self.config.storage.backend = backend;
        self
    }

    /// Treat participants whose display name starts with `prefix` as agents.
    pub fn with_agent_prefix(mut self, prefix: &str) -> Self {
        self.config.roles.agent_name_prefix = Some(prefix.to_string());
        self
    }

    pub fn with_agent_ids(mut self, ids: &[&str]) -> Self {
        self.config.roles.agent_user_ids = ids.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_fallback_reply(mut self, reply: &str) -> Self {
        self.config.bot.fallback_reply = reply.to_string();
        self
    }

    pub fn with_max_logged_messages(mut self, limit: usize) -> Self {
        self.config.routing.max_logged_messages = limit;
        self
    }

    /// Build the harness. SQLite backends get a fresh database in a temp dir.
    pub async fn build(mut self) -> Result<TestHarness, HandoffError> {
        let temp_dir = match self.config.storage.backend {
            StorageBackend::Memory => None,
            StorageBackend::Sqlite => {
                let dir = TempDir::new().map_err(HandoffError::storage)?;
                self.config.storage.database_path =
                    dir.path().join("handoff.db").to_string_lossy().to_string();
                Some(dir)
            }
        };

        let clock = Arc::new(ManualClock::from_secs(1_700_000_000));
        let stores = match self.config.routing.mode {
            RoutingMode::Queue => {
                RoutingStores::Queue(open_handoff_store(&self.config, clock.clone()).await?)
            }
            RoutingMode::Connect => {
                RoutingStores::Connect(open_connection_store(&self.config, clock.clone()).await?)
            }
        };
        let transport = Arc::new(MockTransport::new());
        let relay = build_relay(&self.config, stores.clone(), transport.clone())?;
        debug!(
            mode = ?self.config.routing.mode,
            backend = ?self.config.storage.backend,
            "test harness built"
        );

        Ok(TestHarness {
            transport,
            relay,
            stores,
            clock,
            config: self.config,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete routing environment with a mock transport and fresh storage.
pub struct TestHarness {
    pub transport: Arc<MockTransport>,
    pub relay: Relay,
    pub stores: RoutingStores,
    pub clock: Arc<ManualClock>,
    pub config: HandoffConfig,
    _temp_dir: Option<TempDir>,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Build a message from `user_id`, who sits alone in conversation
    /// `conv-{user_id}`.
    pub fn message(&self, user_id: &str, name: &str, text: &str) -> InboundMessage {
        let mut msg = InboundMessage::text(
            ChannelAccount::new(user_id, name),
            ConversationAccount::new(format!("conv-{user_id}")),
            TEST_CHANNEL,
            text,
        );
        msg.timestamp = self.clock.now();
        msg
    }

    /// Send `text` as `user_id` through the relay, then advance the clock.
    pub async fn send_as(
        &self,
        user_id: &str,
        name: &str,
        text: &str,
    ) -> Result<RoutingOutcome, HandoffError> {
        let msg = self.message(user_id, name, text);
        let outcome = self.relay.dispatch(&msg).await;
        debug!(
            user_id,
            text,
            outcome = ?outcome.as_ref().map(RoutingOutcome::label),
            "harness message dispatched"
        );
        self.clock.advance(TimeDelta::seconds(1));
        outcome
    }

    /// Texts delivered to `user_id` so far, replies and forwards alike.
    pub async fn received_by(&self, user_id: &str) -> Vec<String> {
        self.transport.received_by(user_id).await
    }

    /// The most recent text delivered to `user_id`.
    pub async fn last_received_by(&self, user_id: &str) -> Option<String> {
        self.received_by(user_id).await.pop()
    }
}
