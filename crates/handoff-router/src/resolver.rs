// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Finds the counterpart of a participant in the pending-set model.

use std::sync::Arc;

use tracing::error;

use handoff_core::{ConnectionStore, EstablishedConnection, HandoffError, ParticipantRef};

/// Looks up established connections through the identity comparator.
#[derive(Clone)]
pub struct HandoffResolver {
    store: Arc<dyn ConnectionStore>,
}

impl HandoffResolver {
    pub fn new(store: Arc<dyn ConnectionStore>) -> Self {
        Self { store }
    }

    /// The other member of the established pair containing `participant`.
    ///
    /// `Ok(None)` means not connected, the expected path for most messages.
    /// A participant found in two or more pairs is a `ConsistencyViolation`.
    pub async fn find_connected_to(
        &self,
        participant: &ParticipantRef,
    ) -> Result<Option<ParticipantRef>, HandoffError> {
        participant.validate()?;
        let established = self.store.list_established().await?;
        let matches: Vec<&EstablishedConnection> = established
            .iter()
            .filter(|conn| conn.contains(participant))
            .collect();

        match matches.as_slice() {
            [] => Ok(None),
            [conn] => conn.other_side(participant).cloned().map(Some).ok_or_else(|| {
                HandoffError::Internal(format!("{participant} matched a pair it is not in"))
            }),
            many => {
                error!(
                    participant = %participant,
                    connections = many.len(),
                    "participant found in multiple established connections"
                );
                Err(HandoffError::ConsistencyViolation(format!(
                    "{participant} is in {} established connections",
                    many.len()
                )))
            }
        }
    }
}
