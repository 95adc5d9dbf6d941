// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared across adapter traits and the routing layer.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a [`crate::PluginAdapter`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    ConnectionStore,
    HandoffStore,
    Transport,
}

/// An account on a messaging channel (an end user, a human agent, or the bot).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelAccount {
    /// Channel-scoped account identifier.
    pub id: String,
    /// Display name, when the channel provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChannelAccount {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
        }
    }
}

/// A conversation on a messaging channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationAccount {
    pub id: String,
}

impl ConversationAccount {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Opaque identity of one endpoint of a conversation.
///
/// Identity is the `(user.id, conversation.id, channel_id)` triple; compare
/// refs only through [`crate::same_conversation`]. `service_url` is a delivery
/// hint for the transport and never takes part in identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantRef {
    #[serde(default)]
    pub user: Option<ChannelAccount>,
    #[serde(default)]
    pub conversation: Option<ConversationAccount>,
    pub channel_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_url: Option<String>,
}

impl ParticipantRef {
    /// Build a fully populated participant reference.
    pub fn new(
        user: ChannelAccount,
        conversation: ConversationAccount,
        channel_id: impl Into<String>,
    ) -> Self {
        Self {
            user: Some(user),
            conversation: Some(conversation),
            channel_id: channel_id.into(),
            service_url: None,
        }
    }

    /// Human-readable name: the user's display name, else the user id.
    pub fn display_name(&self) -> &str {
        match &self.user {
            Some(user) => user.name.as_deref().unwrap_or(&user.id),
            None => "unknown",
        }
    }
}

impl fmt::Display for ParticipantRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let user = self.user.as_ref().map(|u| u.id.as_str()).unwrap_or("?");
        let conversation = self
            .conversation
            .as_ref()
            .map(|c| c.id.as_str())
            .unwrap_or("?");
        write!(f, "{user}@{conversation}/{}", self.channel_id)
    }
}

/// The kind of activity delivered by the transport.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Message,
    ConversationUpdate,
    Typing,
    Event,
}

/// An inbound activity received from the transport collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub id: String,
    pub kind: ActivityKind,
    #[serde(default)]
    pub text: Option<String>,
    pub from: ChannelAccount,
    pub conversation: ConversationAccount,
    pub channel_id: String,
    #[serde(default)]
    pub service_url: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl InboundMessage {
    /// Create a text message activity stamped with a fresh id and the current time.
    pub fn text(
        from: ChannelAccount,
        conversation: ConversationAccount,
        channel_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind: ActivityKind::Message,
            text: Some(text.into()),
            from,
            conversation,
            channel_id: channel_id.into(),
            service_url: None,
            timestamp: Utc::now(),
        }
    }

    /// The sender's participant reference.
    pub fn participant_ref(&self) -> ParticipantRef {
        ParticipantRef {
            user: Some(self.from.clone()),
            conversation: Some(self.conversation.clone()),
            channel_id: self.channel_id.clone(),
            service_url: self.service_url.clone(),
        }
    }

    /// The text payload when this is a routable message.
    ///
    /// Returns `None` for non-message activities and for messages without text.
    pub fn routable_text(&self) -> Option<&str> {
        if self.kind != ActivityKind::Message {
            return None;
        }
        self.text.as_deref().filter(|t| !t.is_empty())
    }
}
