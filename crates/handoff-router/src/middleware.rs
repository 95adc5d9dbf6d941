// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-message routing stages.
//!
//! Each stage looks at one inbound message and either forwards it to the
//! sender's counterpart, handles it (a command with a reply), or passes it
//! on to the next stage. A forwarded message never reaches the bot.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use handoff_core::{
    ConnectionStore, HandoffError, HandoffStore, InboundMessage, ParticipantRef, TransportAdapter,
    UserState,
};

use crate::classifier::AgentClassifier;
use crate::commands::{self, AgentCommand, UserCommand};
use crate::lifecycle::ConnectionManager;
use crate::queue::QueueManager;
use crate::resolver::HandoffResolver;

/// Terminal state of one message at one stage.
#[derive(Debug, Clone, PartialEq)]
pub enum RoutingOutcome {
    /// Delivered to the counterpart's conversation.
    Forwarded { to: ParticipantRef },
    /// Consumed by a command; a reply may have been sent.
    Handled,
    /// Not for this stage; continue down the chain.
    Passthrough,
}

impl RoutingOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            RoutingOutcome::Forwarded { .. } => "forwarded",
            RoutingOutcome::Handled => "handled",
            RoutingOutcome::Passthrough => "passthrough",
        }
    }
}

/// One stage of the routing chain.
#[async_trait]
pub trait RoutingMiddleware: Send + Sync {
    fn name(&self) -> &str;

    async fn route(
        &self,
        message: &InboundMessage,
        transport: &dyn TransportAdapter,
    ) -> Result<RoutingOutcome, HandoffError>;
}

/// Text and sender of a routable message, or `None` to pass through.
fn routable(
    message: &InboundMessage,
    transport: &dyn TransportAdapter,
) -> Option<(String, ParticipantRef)> {
    let text = message.routable_text()?.to_string();
    let sender = transport.participant_ref(message);
    if let Err(e) = sender.validate() {
        debug!(message_id = %message.id, error = %e, "sender lacks identity, passing through");
        return None;
    }
    Some((text, sender))
}

async fn forward(
    transport: &dyn TransportAdapter,
    from: &ParticipantRef,
    to: &ParticipantRef,
    message: &InboundMessage,
) -> Result<RoutingOutcome, HandoffError> {
    transport.forward(to, message).await?;
    debug!(from = %from, to = %to, "message forwarded");
    Ok(RoutingOutcome::Forwarded { to: to.clone() })
}

async fn reply(
    transport: &dyn TransportAdapter,
    message: &InboundMessage,
    text: &str,
) -> Result<RoutingOutcome, HandoffError> {
    transport.reply(message, text).await?;
    Ok(RoutingOutcome::Handled)
}

/// Resolve-and-forward over the pending-set model.
///
/// An agent already in a connection may send `#disconnect`; any other `#`
/// command from it is rejected rather than forwarded.
pub struct ConnectMiddleware {
    resolver: HandoffResolver,
    manager: ConnectionManager,
    classifier: AgentClassifier,
}

impl ConnectMiddleware {
    pub fn new(store: Arc<dyn ConnectionStore>, classifier: AgentClassifier) -> Self {
        Self {
            resolver: HandoffResolver::new(store.clone()),
            manager: ConnectionManager::new(store),
            classifier,
        }
    }
}

#[async_trait]
impl RoutingMiddleware for ConnectMiddleware {
    fn name(&self) -> &str {
        "connect"
    }

    async fn route(
        &self,
        message: &InboundMessage,
        transport: &dyn TransportAdapter,
    ) -> Result<RoutingOutcome, HandoffError> {
        let Some((text, sender)) = routable(message, transport) else {
            return Ok(RoutingOutcome::Passthrough);
        };
        let Some(counterpart) = self.resolver.find_connected_to(&sender).await? else {
            return Ok(RoutingOutcome::Passthrough);
        };

        if self.classifier.is_agent(&sender) {
            match commands::parse_agent_command(&text) {
                Some(AgentCommand::Disconnect) => {
                    self.manager.end_connection(&sender).await?;
                    return reply(transport, message, commands::RECONNECTED_TO_BOT).await;
                }
                Some(other) => {
                    warn!(agent = %sender, command = ?other, "command rejected while connected");
                    return reply(transport, message, commands::INVALID_WHEN_CONNECTED).await;
                }
                None => {}
            }
        }
        forward(transport, &sender, &counterpart, message).await
    }
}

/// Command surface over the pending-set model, for unconnected senders.
pub struct ConnectCommands {
    manager: ConnectionManager,
    classifier: AgentClassifier,
}

impl ConnectCommands {
    pub fn new(store: Arc<dyn ConnectionStore>, classifier: AgentClassifier) -> Self {
        Self {
            manager: ConnectionManager::new(store),
            classifier,
        }
    }

    async fn agent_command(
        &self,
        command: AgentCommand,
        agent: &ParticipantRef,
        message: &InboundMessage,
        transport: &dyn TransportAdapter,
    ) -> Result<RoutingOutcome, HandoffError> {
        match command {
            AgentCommand::List => {
                let pending = self.manager.list_pending().await?;
                let listing =
                    commands::format_queue(pending.iter().map(|p| p.participant.display_name()));
                reply(transport, message, &listing).await
            }
            AgentCommand::Connect => match self.manager.connect_to_oldest_pending(agent).await {
                Ok(Some(conn)) => {
                    let name = conn.participants[0].display_name();
                    reply(transport, message, &commands::connected_to(name)).await
                }
                Ok(None) => reply(transport, message, commands::NOBODY_IN_QUEUE).await,
                Err(HandoffError::AlreadyConnected { .. }) => {
                    warn!(agent = %agent, "connect rejected, agent already engaged");
                    reply(transport, message, commands::INVALID_WHEN_CONNECTED).await
                }
                Err(e) => Err(e),
            },
            AgentCommand::Disconnect => reply(transport, message, commands::NOT_CONNECTED).await,
            AgentCommand::Unknown(_) => Ok(RoutingOutcome::Passthrough),
        }
    }
}

#[async_trait]
impl RoutingMiddleware for ConnectCommands {
    fn name(&self) -> &str {
        "connect-commands"
    }

    async fn route(
        &self,
        message: &InboundMessage,
        transport: &dyn TransportAdapter,
    ) -> Result<RoutingOutcome, HandoffError> {
        let Some((text, sender)) = routable(message, transport) else {
            return Ok(RoutingOutcome::Passthrough);
        };

        if self.classifier.is_agent(&sender) {
            return match commands::parse_agent_command(&text) {
                Some(command) => self.agent_command(command, &sender, message, transport).await,
                None => Ok(RoutingOutcome::Passthrough),
            };
        }

        match commands::parse_user_command(&text) {
            Some(UserCommand::RequestAgent) => {
                match self.manager.start_connection(&sender).await {
                    Ok(_) => {}
                    Err(HandoffError::AlreadyConnected { .. }) => {
                        debug!(user = %sender, "already waiting for an agent");
                    }
                    Err(e) => return Err(e),
                }
                reply(transport, message, commands::WAITING_FOR_AGENT).await
            }
            Some(UserCommand::Cancel) => {
                match self.manager.end_connection(&sender).await {
                    Ok(_) | Err(HandoffError::NotConnected { .. }) => {}
                    Err(e) => return Err(e),
                }
                reply(transport, message, commands::CONNECTED_TO_BOT).await
            }
            None => Ok(RoutingOutcome::Passthrough),
        }
    }
}

/// Queue-model routing: logging, forwarding between a user and their agent,
/// and the full user and agent command surface.
pub struct HandoffMiddleware {
    store: Arc<dyn HandoffStore>,
    queue: QueueManager,
    classifier: AgentClassifier,
}

impl HandoffMiddleware {
    pub fn new(store: Arc<dyn HandoffStore>, classifier: AgentClassifier) -> Self {
        Self {
            queue: QueueManager::new(store.clone()),
            store,
            classifier,
        }
    }

    async fn route_agent(
        &self,
        agent: &ParticipantRef,
        text: &str,
        message: &InboundMessage,
        transport: &dyn TransportAdapter,
    ) -> Result<RoutingOutcome, HandoffError> {
        let command = commands::parse_agent_command(text);

        if let Some(user) = self.store.find_user_by_agent(agent).await? {
            return match command {
                Some(AgentCommand::Disconnect) => {
                    self.queue.disconnect_from_agent(agent).await?;
                    reply(transport, message, commands::RECONNECTED_TO_BOT).await
                }
                Some(other) => {
                    warn!(agent = %agent, command = ?other, "command rejected while connected");
                    reply(transport, message, commands::INVALID_WHEN_CONNECTED).await
                }
                None => {
                    self.store
                        .log_message(&user.participant, agent.display_name(), text)
                        .await?;
                    forward(transport, agent, &user.participant, message).await
                }
            };
        }

        match command {
            None | Some(AgentCommand::Unknown(_)) => Ok(RoutingOutcome::Passthrough),
            Some(AgentCommand::List) => {
                let queued = self.queue.list_queue().await?;
                let listing = commands::format_queue(queued.iter().map(|u| u.display_name()));
                reply(transport, message, &listing).await
            }
            Some(AgentCommand::Connect) => match self.queue.connect_to_agent(agent).await {
                Ok(Some(user)) => {
                    reply(transport, message, &commands::connected_to(user.display_name())).await
                }
                Ok(None) => reply(transport, message, commands::NOBODY_IN_QUEUE).await,
                Err(HandoffError::AlreadyConnected { .. }) => {
                    warn!(agent = %agent, "connect rejected, agent already engaged");
                    reply(transport, message, commands::INVALID_WHEN_CONNECTED).await
                }
                Err(e) => Err(e),
            },
            Some(AgentCommand::Disconnect) => {
                reply(transport, message, commands::NOT_CONNECTED).await
            }
        }
    }

    async fn route_user(
        &self,
        user: &ParticipantRef,
        text: &str,
        message: &InboundMessage,
        transport: &dyn TransportAdapter,
    ) -> Result<RoutingOutcome, HandoffError> {
        let record = self
            .store
            .log_message(user, user.display_name(), text)
            .await?;

        if record.state == UserState::Agent {
            if let Some(agent) = &record.agent {
                return forward(transport, user, agent, message).await;
            }
            warn!(user = %user, "user in agent state without an agent");
        }

        match commands::parse_user_command(text) {
            Some(UserCommand::RequestAgent) => {
                self.queue.queue_for_agent(user).await?;
                reply(transport, message, commands::WAITING_FOR_AGENT).await
            }
            Some(UserCommand::Cancel) => {
                self.queue.unqueue_for_agent(user).await?;
                reply(transport, message, commands::CONNECTED_TO_BOT).await
            }
            None => Ok(RoutingOutcome::Passthrough),
        }
    }
}

#[async_trait]
impl RoutingMiddleware for HandoffMiddleware {
    fn name(&self) -> &str {
        "handoff"
    }

    async fn route(
        &self,
        message: &InboundMessage,
        transport: &dyn TransportAdapter,
    ) -> Result<RoutingOutcome, HandoffError> {
        let Some((text, sender)) = routable(message, transport) else {
            return Ok(RoutingOutcome::Passthrough);
        };
        if self.classifier.is_agent(&sender) {
            debug!(agent = %sender, "routing agent message");
            self.route_agent(&sender, &text, message, transport).await
        } else {
            self.route_user(&sender, &text, message, transport).await
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use handoff_core::{
        AdapterType, ChannelAccount, ConversationAccount, HandoffError, HealthStatus,
        InboundMessage, ParticipantRef, PluginAdapter, TransportAdapter,
    };

    /// Captures forwards and replies in memory.
    #[derive(Default)]
    pub struct RecordingTransport {
        pub forwards: Mutex<Vec<(ParticipantRef, String)>>,
        pub replies: Mutex<Vec<(String, String)>>,
    }

    impl RecordingTransport {
        pub fn replies_to(&self, user_id: &str) -> Vec<String> {
            self.replies
                .lock()
                .unwrap()
                .iter()
                .filter(|(to, _)| to == user_id)
                .map(|(_, text)| text.clone())
                .collect()
        }

        pub fn forwards(&self) -> Vec<(ParticipantRef, String)> {
            self.forwards.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PluginAdapter for RecordingTransport {
        fn name(&self) -> &str {
            "recording"
        }
        fn version(&self) -> semver::Version {
            semver::Version::new(0, 0, 0)
        }
        fn adapter_type(&self) -> AdapterType {
            AdapterType::Transport
        }
        async fn health_check(&self) -> Result<HealthStatus, HandoffError> {
            Ok(HealthStatus::Healthy)
        }
        async fn shutdown(&self) -> Result<(), HandoffError> {
            Ok(())
        }
    }

    #[async_trait]
    impl TransportAdapter for RecordingTransport {
        async fn forward(
            &self,
            target: &ParticipantRef,
            message: &InboundMessage,
        ) -> Result<(), HandoffError> {
            let text = message.text.clone().unwrap_or_default();
            self.forwards.lock().unwrap().push((target.clone(), text));
            Ok(())
        }

        async fn reply(&self, source: &InboundMessage, text: &str) -> Result<(), HandoffError> {
            self.replies
                .lock()
                .unwrap()
                .push((source.from.id.clone(), text.to_string()));
            Ok(())
        }
    }

    pub fn message(id: &str, name: &str, text: &str) -> InboundMessage {
        InboundMessage::text(
            ChannelAccount::new(id, name),
            ConversationAccount::new(format!("conv-{id}")),
            "test",
            text,
        )
    }
}
