// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Handoff routing layer.
//!
//! This crate provides the participant identity model, the connection and
//! handoff-user records, the error taxonomy, and the adapter traits that
//! connection stores and message transports implement.

pub mod clock;
pub mod connection;
pub mod error;
pub mod identity;
pub mod traits;
pub mod types;
pub mod user;

// Re-export key items at crate root for ergonomic imports.
pub use clock::{Clock, ManualClock, SystemClock};
pub use connection::{EstablishedConnection, PendingConnection, RemovedConnection};
pub use error::HandoffError;
pub use identity::{same_conversation, ParticipantKey};
pub use types::{
    ActivityKind, AdapterType, ChannelAccount, ConversationAccount, HealthStatus, InboundMessage,
    ParticipantRef,
};
pub use user::{HandoffUser, LoggedMessage, UserState};

// Re-export all adapter traits at crate root.
pub use traits::{ConnectionStore, HandoffStore, PluginAdapter, TransportAdapter};
