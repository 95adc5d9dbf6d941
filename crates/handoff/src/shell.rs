// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `handoff shell` command implementation.
//!
//! An interactive console where each line is sent by a named participant:
//! `alice: hello` sends "hello" as alice in her own conversation. Lines
//! without a name reuse the previous speaker. Forwards and replies the relay
//! produces are printed as they happen.

use std::sync::Arc;

use async_trait::async_trait;
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::info;

use handoff_config::model::HandoffConfig;
use handoff_core::{
    AdapterType, ChannelAccount, ConversationAccount, HandoffError, HealthStatus, InboundMessage,
    ParticipantRef, PluginAdapter, TransportAdapter,
};
use handoff_router::build_relay;

/// Channel id for every console participant.
const CONSOLE_CHANNEL: &str = "console";

/// Prints deliveries to stdout instead of sending them anywhere.
struct ConsoleTransport;

#[async_trait]
impl PluginAdapter for ConsoleTransport {
    fn name(&self) -> &str {
        "console"
    }

    fn version(&self) -> semver::Version {
        semver::Version::parse(env!("CARGO_PKG_VERSION")).unwrap_or(semver::Version::new(0, 1, 0))
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
impl TransportAdapter for ConsoleTransport {
    async fn forward(
        &self,
        target: &ParticipantRef,
        message: &InboundMessage,
    ) -> Result<(), HandoffError> {
        let text = message.text.as_deref().unwrap_or_default();
        println!(
            "  {} {} {}: {text}",
            message.participant_ref().display_name().cyan(),
            "->".dimmed(),
            target.display_name().cyan(),
        );
        Ok(())
    }

    async fn reply(&self, source: &InboundMessage, text: &str) -> Result<(), HandoffError> {
        let to = source.participant_ref();
        for line in text.lines() {
            println!(
                "  {} {} {}: {line}",
                "bot".green(),
                "->".dimmed(),
                to.display_name().cyan()
            );
        }
        Ok(())
    }
}

/// Split `name: text` into a speaker and a message. `None` for the speaker
/// when the line has no name prefix.
fn parse_line(line: &str) -> (Option<&str>, &str) {
    if let Some((name, text)) = line.split_once(':') {
        let name = name.trim();
        if !name.is_empty() && !name.contains(char::is_whitespace) {
            return (Some(name), text.trim());
        }
    }
    (None, line.trim())
}

/// Each console speaker sits alone in a conversation named after them.
fn console_message(speaker: &str, text: &str) -> InboundMessage {
    let id = speaker.to_lowercase();
    InboundMessage::text(
        ChannelAccount::new(id.clone(), speaker),
        ConversationAccount::new(format!("console-{id}")),
        CONSOLE_CHANNEL,
        text,
    )
}

/// Runs the `handoff shell` interactive REPL.
pub async fn run_shell(config: HandoffConfig) -> Result<(), HandoffError> {
    let stores = crate::open_stores(&config).await?;
    let relay = build_relay(&config, stores.clone(), Arc::new(ConsoleTransport))?;
    info!(mode = ?config.routing.mode, backend = ?config.storage.backend, "shell started");

    let mut rl = DefaultEditor::new()
        .map_err(|e| HandoffError::Internal(format!("failed to initialize readline: {e}")))?;

    println!("{}", "handoff shell".bold().green());
    println!(
        "Type {} to speak as alice. Type {} to exit.\n",
        "alice: hello".yellow(),
        "/quit".yellow()
    );

    let mut speaker: Option<String> = None;
    loop {
        let prompt = match &speaker {
            Some(name) => format!("{}> ", name.green()),
            None => format!("{}> ", "handoff".green()),
        };
        match rl.readline(&prompt) {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed == "/quit" || trimmed == "/exit" {
                    break;
                }
                if trimmed.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(&line);

                let (name, text) = parse_line(trimmed);
                if let Some(name) = name {
                    speaker = Some(name.to_string());
                }
                let Some(current) = speaker.as_deref() else {
                    eprintln!("{}", "start the line with a name, e.g. `alice: hi`".yellow());
                    continue;
                };
                if text.is_empty() {
                    continue;
                }

                if let Err(e) = relay.dispatch(&console_message(current, text)).await {
                    eprintln!("{}: {e}", "error".red());
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("{}: {e}", "error".red());
                break;
            }
        }
    }

    stores.shutdown().await?;
    println!("{}", "goodbye".dimmed());
    Ok(())
}
