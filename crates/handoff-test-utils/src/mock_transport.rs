// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock transport adapter for deterministic testing.
//!
//! `MockTransport` records every forward and reply instead of delivering
//! them, and can be told to fail the next forward.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use handoff_core::{
    AdapterType, HandoffError, HealthStatus, InboundMessage, ParticipantRef, PluginAdapter,
    TransportAdapter,
};

/// One captured outbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum SentMessage {
    /// Relayed verbatim to another participant.
    Forward { to: ParticipantRef, text: String },
    /// Answered back into the sender's conversation.
    Reply { to: ParticipantRef, text: String },
}

impl SentMessage {
    pub fn recipient(&self) -> &ParticipantRef {
        match self {
            SentMessage::Forward { to, .. } | SentMessage::Reply { to, .. } => to,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            SentMessage::Forward { text, .. } | SentMessage::Reply { text, .. } => text,
        }
    }
}

#[derive(Default)]
pub struct MockTransport {
    sent: Arc<Mutex<Vec<SentMessage>>>,
    fail_next_forward: AtomicBool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything sent so far, in order.
    pub async fn sent_messages(&self) -> Vec<SentMessage> {
        self.sent.lock().await.clone()
    }

    /// Texts received by the participant whose user id is `user_id`, in order.
    pub async fn received_by(&self, user_id: &str) -> Vec<String> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|m| m.recipient().user.as_ref().is_some_and(|u| u.id == user_id))
            .map(|m| m.text().to_string())
            .collect()
    }

    pub async fn forward_count(&self) -> usize {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|m| matches!(m, SentMessage::Forward { .. }))
            .count()
    }

    pub async fn clear_sent(&self) {
        self.sent.lock().await.clear();
    }

    /// Make the next `forward` call return a transport error.
    pub fn fail_next_forward(&self) {
        self.fail_next_forward.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl PluginAdapter for MockTransport {
    fn name(&self) -> &str {
        "mock-transport"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transport
    }

    async fn health_check(&self) -> Result<HealthStatus, HandoffError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), HandoffError> {
        Ok(())
    }
}

#[async_trait]
impl TransportAdapter for MockTransport {
    async fn forward(
        &self,
        target: &ParticipantRef,
        message: &InboundMessage,
    ) -> Result<(), HandoffError> {
        if self.fail_next_forward.swap(false, Ordering::SeqCst) {
            return Err(HandoffError::transport(format!("delivery to {target} failed")));
        }
        self.sent.lock().await.push(SentMessage::Forward {
            to: target.clone(),
            text: message.text.clone().unwrap_or_default(),
        });
        Ok(())
    }

    async fn reply(&self, source: &InboundMessage, text: &str) -> Result<(), HandoffError> {
        self.sent.lock().await.push(SentMessage::Reply {
            to: source.participant_ref(),
            text: text.to_string(),
        });
        Ok(())
    }
}
