// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Participant identity: the single equality rule and its normalized key.
//!
//! [`same_conversation`] is the only way two [`ParticipantRef`]s may be
//! compared. [`ParticipantKey`] is the normalized form of the same triple and
//! is used wherever a hashable or storable key is needed; for valid refs,
//! `same_conversation(a, b)` holds exactly when `a.key() == b.key()`.

use std::fmt::Write;

use crate::error::HandoffError;
use crate::types::ParticipantRef;

/// Separator between escaped key components.
const KEY_SEPARATOR: char = '|';

/// Returns true when both refs denote the same participant in the same conversation.
///
/// Both refs must carry a non-empty user id and conversation id; any missing
/// field on either side yields `false`.
pub fn same_conversation(a: &ParticipantRef, b: &ParticipantRef) -> bool {
    match (&a.user, &b.user, &a.conversation, &b.conversation) {
        (Some(user_a), Some(user_b), Some(conv_a), Some(conv_b)) => {
            !user_a.id.is_empty()
                && !conv_a.id.is_empty()
                && user_a.id == user_b.id
                && conv_a.id == conv_b.id
                && a.channel_id == b.channel_id
        }
        _ => false,
    }
}

/// Normalized `(user, conversation, channel)` identity of a participant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParticipantKey {
    pub user_id: String,
    pub conversation_id: String,
    pub channel_id: String,
}

impl ParticipantKey {
    /// Sanitized, collision-free key for table-style stores.
    ///
    /// Components are percent-escaped for `%`, `|`, `/`, `\`, `#`, `?` and
    /// control characters, then joined with `|`.
    pub fn partition_key(&self) -> String {
        let mut out = String::with_capacity(
            self.user_id.len() + self.conversation_id.len() + self.channel_id.len() + 2,
        );
        escape_component(&self.channel_id, &mut out);
        out.push(KEY_SEPARATOR);
        escape_component(&self.conversation_id, &mut out);
        out.push(KEY_SEPARATOR);
        escape_component(&self.user_id, &mut out);
        out
    }
}

impl ParticipantRef {
    /// Normalized identity key, or `InvalidInput` when identity fields are missing.
    pub fn key(&self) -> Result<ParticipantKey, HandoffError> {
        let user = self
            .user
            .as_ref()
            .filter(|u| !u.id.is_empty())
            .ok_or_else(|| HandoffError::InvalidInput(format!("{self}: missing user id")))?;
        let conversation = self
            .conversation
            .as_ref()
            .filter(|c| !c.id.is_empty())
            .ok_or_else(|| {
                HandoffError::InvalidInput(format!("{self}: missing conversation id"))
            })?;
        Ok(ParticipantKey {
            user_id: user.id.clone(),
            conversation_id: conversation.id.clone(),
            channel_id: self.channel_id.clone(),
        })
    }

    /// Reject refs that cannot be compared before they reach a store.
    pub fn validate(&self) -> Result<(), HandoffError> {
        self.key().map(|_| ())
    }
}

fn escape_component(raw: &str, out: &mut String) {
    for c in raw.chars() {
        if matches!(c, '%' | '|' | '/' | '\\' | '#' | '?') || c.is_control() {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                let _ = write!(out, "%{byte:02X}");
            }
        } else {
            out.push(c);
        }
    }
}
