// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The relay: runs each inbound message through the routing chain and hands
//! whatever passes through to the downstream bot handler.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use handoff_core::{HandoffError, InboundMessage, TransportAdapter};

use crate::middleware::{RoutingMiddleware, RoutingOutcome};
use crate::recording;

/// Downstream stage that receives every message the chain passed through.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(
        &self,
        message: &InboundMessage,
        transport: &dyn TransportAdapter,
    ) -> Result<(), HandoffError>;
}

/// Replies with a fixed text to every routable message.
pub struct StaticResponder {
    reply: String,
}

impl StaticResponder {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
        }
    }
}

#[async_trait]
impl MessageHandler for StaticResponder {
    async fn handle(
        &self,
        message: &InboundMessage,
        transport: &dyn TransportAdapter,
    ) -> Result<(), HandoffError> {
        if message.routable_text().is_none() {
            return Ok(());
        }
        transport.reply(message, &self.reply).await
    }
}

pub struct Relay {
    transport: Arc<dyn TransportAdapter>,
    chain: Vec<Arc<dyn RoutingMiddleware>>,
    handler: Arc<dyn MessageHandler>,
}

impl Relay {
    pub fn new(transport: Arc<dyn TransportAdapter>, handler: Arc<dyn MessageHandler>) -> Self {
        Self {
            transport,
            chain: Vec::new(),
            handler,
        }
    }

    /// Append a stage; stages run in insertion order.
    pub fn with_middleware(mut self, middleware: Arc<dyn RoutingMiddleware>) -> Self {
        self.chain.push(middleware);
        self
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.chain.iter().map(|m| m.name()).collect()
    }

    /// Route one message. A `Passthrough` result means the handler ran.
    ///
    /// Errors are returned as-is; no state change is rolled back or retried.
    pub async fn dispatch(&self, message: &InboundMessage) -> Result<RoutingOutcome, HandoffError> {
        let result = self.route(message).await;
        match &result {
            Ok(outcome) => recording::record_message(outcome.label()),
            Err(e) => {
                recording::record_message("failed");
                if e.is_fatal() {
                    error!(message_id = %message.id, error = %e, "store consistency violation");
                }
            }
        }
        result
    }

    async fn route(&self, message: &InboundMessage) -> Result<RoutingOutcome, HandoffError> {
        let transport = self.transport.as_ref();
        for stage in &self.chain {
            let outcome = stage.route(message, transport).await?;
            if outcome != RoutingOutcome::Passthrough {
                debug!(message_id = %message.id, stage = stage.name(), outcome = outcome.label(), "message routed");
                return Ok(outcome);
            }
        }
        self.handler.handle(message, transport).await?;
        Ok(RoutingOutcome::Passthrough)
    }

    /// Consume messages until the channel closes or `cancel` fires.
    ///
    /// Per-message failures are logged and do not stop the loop.
    pub async fn run(&self, mut rx: mpsc::Receiver<InboundMessage>, cancel: CancellationToken) {
        info!(stages = ?self.stage_names(), "relay running");
        loop {
            tokio::select! {
                msg = rx.recv() => {
                    let Some(inbound) = msg else {
                        info!("inbound channel closed, stopping relay");
                        break;
                    };
                    if let Err(e) = self.dispatch(&inbound).await {
                        warn!(message_id = %inbound.id, error = %e, "failed to route inbound message");
                    }
                }
                _ = cancel.cancelled() => {
                    info!("shutdown signal received, stopping relay");
                    break;
                }
            }
        }
    }
}
