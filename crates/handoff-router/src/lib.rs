// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Handoff routing for conversations between end users and human agents.
//!
//! This crate provides:
//! - [`HandoffResolver`]: finds a participant's counterpart in the pending-set model
//! - [`ConnectionManager`] and [`QueueManager`]: connection lifecycle for both models
//! - [`RoutingMiddleware`] stages that forward, handle commands or pass through
//! - [`Relay`]: the dispatch loop ending in a bot [`MessageHandler`]
//!
//! A deployment runs exactly one model, chosen by `routing.mode`; see
//! [`build_relay`].

pub mod classifier;
pub mod commands;
pub mod lifecycle;
pub mod middleware;
pub mod pipeline;
pub mod queue;
pub mod recording;
pub mod relay;
pub mod resolver;

pub use classifier::AgentClassifier;
pub use lifecycle::ConnectionManager;
pub use middleware::{
    ConnectCommands, ConnectMiddleware, HandoffMiddleware, RoutingMiddleware, RoutingOutcome,
};
pub use pipeline::{build_relay, RoutingStores};
pub use queue::QueueManager;
pub use relay::{MessageHandler, Relay, StaticResponder};
pub use resolver::HandoffResolver;
