// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport adapter trait for the message-relay collaborator.

use async_trait::async_trait;

use crate::error::HandoffError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{InboundMessage, ParticipantRef};

/// Delivers messages into conversations on behalf of the routing layer.
///
/// Transports own "continue a conversation" semantics and delivery retries.
/// Failures are returned as [`HandoffError::Transport`] and are never retried
/// by the caller.
#[async_trait]
pub trait TransportAdapter: PluginAdapter {
    /// The sender's participant reference for an inbound message.
    fn participant_ref(&self, message: &InboundMessage) -> ParticipantRef {
        message.participant_ref()
    }

    /// Deliver `message`'s content into the conversation identified by `target`.
    async fn forward(
        &self,
        target: &ParticipantRef,
        message: &InboundMessage,
    ) -> Result<(), HandoffError>;

    /// Send a text reply into the conversation `source` arrived on.
    async fn reply(&self, source: &InboundMessage, text: &str) -> Result<(), HandoffError>;
}
