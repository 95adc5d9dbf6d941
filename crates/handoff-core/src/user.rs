// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Handoff-user records for the queue model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::types::ParticipantRef;

/// Who is currently handling an end user's conversation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserState {
    /// The automated responder handles the conversation.
    Bot,
    /// Waiting in the queue for a human agent.
    Queued,
    /// Paired with a human agent.
    Agent,
}

/// One logged line of a user's conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggedMessage {
    pub from: String,
    pub text: String,
    pub at: DateTime<Utc>,
}

/// Per-end-user handoff record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandoffUser {
    pub participant: ParticipantRef,
    /// Conversation log, most recent first.
    pub messages: Vec<LoggedMessage>,
    pub state: UserState,
    /// The connected agent; set only in [`UserState::Agent`].
    pub agent: Option<ParticipantRef>,
    /// Queue-entry time; set only in [`UserState::Queued`].
    pub queued_at: Option<DateTime<Utc>>,
    /// Arrival order into the store, used to break queue-time ties.
    pub seq: u64,
    pub created_at: DateTime<Utc>,
}

impl HandoffUser {
    /// A fresh record in the [`UserState::Bot`] state.
    pub fn new(participant: ParticipantRef, seq: u64, created_at: DateTime<Utc>) -> Self {
        Self {
            participant,
            messages: Vec::new(),
            state: UserState::Bot,
            agent: None,
            queued_at: None,
            seq,
            created_at,
        }
    }

    pub fn display_name(&self) -> &str {
        self.participant.display_name()
    }

    /// Queue ordering: oldest queue entry first, then arrival order.
    pub fn queue_order(&self) -> (Option<DateTime<Utc>>, u64) {
        (self.queued_at, self.seq)
    }

    /// Prepend a message and drop the oldest entries beyond `limit`.
    pub fn push_message(&mut self, message: LoggedMessage, limit: usize) {
        self.messages.insert(0, message);
        self.messages.truncate(limit);
    }

    pub fn mark_queued(&mut self, at: DateTime<Utc>) {
        self.state = UserState::Queued;
        self.queued_at = Some(at);
        self.agent = None;
    }

    pub fn mark_connected(&mut self, agent: ParticipantRef) {
        self.state = UserState::Agent;
        self.queued_at = None;
        self.agent = Some(agent);
    }

    pub fn mark_bot(&mut self) {
        self.state = UserState::Bot;
        self.queued_at = None;
        self.agent = None;
    }
}
