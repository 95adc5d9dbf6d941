// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Text command surface and the exact reply strings agents and users see.

pub const WAITING_FOR_AGENT: &str = "Waiting for agent";
pub const CONNECTED_TO_BOT: &str = "Connected to bot";
pub const NOBODY_IN_QUEUE: &str = "Nobody in the queue.";
pub const RECONNECTED_TO_BOT: &str = "Reconnected to bot";
pub const INVALID_WHEN_CONNECTED: &str = "Command not valid when connected to user.";
pub const NOT_CONNECTED: &str = "Not connected to a user.";

/// Commands an end user may send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserCommand {
    /// `agent`: ask for a human.
    RequestAgent,
    /// `cancel`: go back to the bot.
    Cancel,
}

/// `#`-prefixed commands an agent may send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentCommand {
    List,
    Connect,
    Disconnect,
    /// Any other `#` text, kept as sent (trimmed).
    Unknown(String),
}

pub fn parse_user_command(text: &str) -> Option<UserCommand> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("agent") {
        Some(UserCommand::RequestAgent)
    } else if text.eq_ignore_ascii_case("cancel") {
        Some(UserCommand::Cancel)
    } else {
        None
    }
}

/// Parse agent text; `None` when it is not a `#` command at all.
pub fn parse_agent_command(text: &str) -> Option<AgentCommand> {
    let text = text.trim();
    if !text.starts_with('#') {
        return None;
    }
    let command = match text.to_ascii_lowercase().as_str() {
        "#list" => AgentCommand::List,
        "#connect" => AgentCommand::Connect,
        "#disconnect" => AgentCommand::Disconnect,
        _ => AgentCommand::Unknown(text.to_string()),
    };
    Some(command)
}

pub fn connected_to(name: &str) -> String {
    format!("Connected to {name}")
}

/// One `- name` line per waiting participant, or [`NOBODY_IN_QUEUE`].
pub fn format_queue<'a>(names: impl IntoIterator<Item = &'a str>) -> String {
    let lines: Vec<String> = names.into_iter().map(|n| format!("- {n}")).collect();
    if lines.is_empty() {
        NOBODY_IN_QUEUE.to_string()
    } else {
        lines.join("\n")
    }
}
