// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pending and established connection records for the pending-set model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::same_conversation;
use crate::types::ParticipantRef;

/// A participant waiting to be paired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingConnection {
    pub participant: ParticipantRef,
    pub requested_at: DateTime<Utc>,
}

/// Two paired participants relaying messages to each other.
///
/// The pair is unordered for lookup; by convention the first member is the
/// participant that was pending and the second is the one that joined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstablishedConnection {
    pub participants: [ParticipantRef; 2],
    pub established_at: DateTime<Utc>,
}

impl EstablishedConnection {
    pub fn new(first: ParticipantRef, second: ParticipantRef, established_at: DateTime<Utc>) -> Self {
        Self {
            participants: [first, second],
            established_at,
        }
    }

    /// Whether `participant` is either member of this pair.
    pub fn contains(&self, participant: &ParticipantRef) -> bool {
        self.participants
            .iter()
            .any(|member| same_conversation(member, participant))
    }

    /// The member opposite `participant`, or `None` if it is not a member.
    pub fn other_side(&self, participant: &ParticipantRef) -> Option<&ParticipantRef> {
        let [first, second] = &self.participants;
        if same_conversation(first, participant) {
            Some(second)
        } else if same_conversation(second, participant) {
            Some(first)
        } else {
            None
        }
    }
}

/// What `remove_by_participant` removed.
#[derive(Debug, Clone, PartialEq)]
pub enum RemovedConnection {
    Pending(PendingConnection),
    Established(EstablishedConnection),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChannelAccount, ConversationAccount};

    fn participant(user: &str) -> ParticipantRef {
        ParticipantRef::new(
            ChannelAccount::new(user, user),
            ConversationAccount::new(format!("conv-{user}")),
            "test",
        )
    }

    #[test]
    fn other_side_resolves_from_either_member() {
        let a = participant("a");
        let b = participant("b");
        let conn = EstablishedConnection::new(a.clone(), b.clone(), Utc::now());

        assert_eq!(conn.other_side(&a), Some(&b));
        assert_eq!(conn.other_side(&b), Some(&a));
        assert_eq!(conn.other_side(&participant("c")), None);
        assert!(conn.contains(&a));
        assert!(!conn.contains(&participant("c")));
    }
}
