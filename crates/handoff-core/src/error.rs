// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Handoff routing layer.

use thiserror::Error;

use crate::types::ParticipantRef;

/// The primary error type used across stores, lifecycle operations and routing.
#[derive(Debug, Error)]
pub enum HandoffError {
    /// A participant reference is missing identity fields.
    #[error("invalid participant: {0}")]
    InvalidInput(String),

    /// The participant is already pending or connected.
    #[error("participant {participant} is already connected")]
    AlreadyConnected { participant: String },

    /// The participant has no pending or established connection.
    #[error("participant {participant} is not connected")]
    NotConnected { participant: String },

    /// The join target has no pending connection.
    #[error("no pending connection for {participant}")]
    NoSuchPendingConnection { participant: String },

    /// A store holds a participant in more than one connection.
    ///
    /// This is a storage-layer defect and must never be resolved silently.
    #[error("connection store consistency violation: {0}")]
    ConsistencyViolation(String),

    /// Forwarding or replying through the transport failed.
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Configuration errors detected at runtime.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl HandoffError {
    pub fn already_connected(participant: &ParticipantRef) -> Self {
        Self::AlreadyConnected {
            participant: participant.to_string(),
        }
    }

    pub fn not_connected(participant: &ParticipantRef) -> Self {
        Self::NotConnected {
            participant: participant.to_string(),
        }
    }

    pub fn no_such_pending(participant: &ParticipantRef) -> Self {
        Self::NoSuchPendingConnection {
            participant: participant.to_string(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap any error as a storage error.
    pub fn storage(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Storage {
            source: source.into(),
        }
    }

    /// Whether this error signals a broken store rather than a rejected request.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ConsistencyViolation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChannelAccount, ConversationAccount};

    #[test]
    fn constructors_render_participant() {
        let r = ParticipantRef::new(
            ChannelAccount::new("u1", "Alice"),
            ConversationAccount::new("c1"),
            "test",
        );
        assert_eq!(
            HandoffError::already_connected(&r).to_string(),
            "participant u1@c1/test is already connected"
        );
        assert_eq!(
            HandoffError::no_such_pending(&r).to_string(),
            "no pending connection for u1@c1/test"
        );
    }

    #[test]
    fn only_consistency_violation_is_fatal() {
        assert!(HandoffError::ConsistencyViolation("x".into()).is_fatal());
        assert!(!HandoffError::transport("x").is_fatal());
        assert!(!HandoffError::storage("x").is_fatal());
    }
}
