// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Assembles a relay for the configured routing mode.

use std::sync::Arc;

use handoff_config::model::{HandoffConfig, RoutingMode};
use handoff_core::{
    ConnectionStore, HandoffError, HandoffStore, PluginAdapter, TransportAdapter,
};

use crate::classifier::AgentClassifier;
use crate::middleware::{ConnectCommands, ConnectMiddleware, HandoffMiddleware};
use crate::relay::{Relay, StaticResponder};

/// The store backing the chosen mode. The two models are never combined.
#[derive(Clone)]
pub enum RoutingStores {
    Queue(Arc<dyn HandoffStore>),
    Connect(Arc<dyn ConnectionStore>),
}

impl RoutingStores {
    pub fn mode(&self) -> RoutingMode {
        match self {
            RoutingStores::Queue(_) => RoutingMode::Queue,
            RoutingStores::Connect(_) => RoutingMode::Connect,
        }
    }

    /// Flush and release the underlying store.
    pub async fn shutdown(&self) -> Result<(), HandoffError> {
        match self {
            RoutingStores::Queue(store) => store.shutdown().await,
            RoutingStores::Connect(store) => store.shutdown().await,
        }
    }
}

/// Build the middleware chain for `stores`, ending in a [`StaticResponder`]
/// that replies with `bot.fallback_reply`.
pub fn build_relay(
    config: &HandoffConfig,
    stores: RoutingStores,
    transport: Arc<dyn TransportAdapter>,
) -> Result<Relay, HandoffError> {
    if stores.mode() != config.routing.mode {
        return Err(HandoffError::Config(format!(
            "routing.mode is {:?} but {:?} stores were supplied",
            config.routing.mode,
            stores.mode()
        )));
    }
    let classifier = AgentClassifier::from_config(&config.roles);
    let responder = Arc::new(StaticResponder::new(config.bot.fallback_reply.clone()));
    let relay = Relay::new(transport, responder);

    Ok(match stores {
        RoutingStores::Queue(store) => {
            relay.with_middleware(Arc::new(HandoffMiddleware::new(store, classifier)))
        }
        RoutingStores::Connect(store) => relay
            .with_middleware(Arc::new(ConnectMiddleware::new(
                store.clone(),
                classifier.clone(),
            )))
            .with_middleware(Arc::new(ConnectCommands::new(store, classifier))),
    })
}
