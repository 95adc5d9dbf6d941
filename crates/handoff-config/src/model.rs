// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Handoff routing layer.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Top-level Handoff configuration.
///
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HandoffConfig {
    /// Service identity and logging.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Handoff model and routing behavior.
    #[serde(default)]
    pub routing: RoutingConfig,

    /// How agent endpoints are recognized.
    #[serde(default)]
    pub roles: RolesConfig,

    /// Connection store backend.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Downstream responder used when no routing applies.
    #[serde(default)]
    pub bot: BotConfig,
}

/// Service identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Display name of the bot endpoint.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "handoff".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// The handoff model a deployment runs. The two models are never mixed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingMode {
    /// Per-user records with a FIFO queue of users waiting for an agent.
    #[default]
    Queue,
    /// Pending and established participant pairs.
    Connect,
}

impl fmt::Display for RoutingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutingMode::Queue => write!(f, "queue"),
            RoutingMode::Connect => write!(f, "connect"),
        }
    }
}

/// Routing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RoutingConfig {
    /// Which handoff model to run.
    #[serde(default)]
    pub mode: RoutingMode,

    /// Maximum number of logged messages kept per user (queue mode).
    #[serde(default = "default_max_logged_messages")]
    pub max_logged_messages: usize,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            mode: RoutingMode::default(),
            max_logged_messages: default_max_logged_messages(),
        }
    }
}

fn default_max_logged_messages() -> usize {
    200
}

/// Agent classification rules. A participant is an agent if any rule matches.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RolesConfig {
    /// Case-insensitive display-name prefix that marks an agent.
    #[serde(default = "default_agent_name_prefix")]
    pub agent_name_prefix: Option<String>,

    /// Channel user ids that are always agents.
    #[serde(default)]
    pub agent_user_ids: Vec<String>,
}

impl Default for RolesConfig {
    fn default() -> Self {
        Self {
            agent_name_prefix: default_agent_name_prefix(),
            agent_user_ids: Vec::new(),
        }
    }
}

fn default_agent_name_prefix() -> Option<String> {
    Some("agent".to_string())
}

/// Connection store backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Volatile in-process store.
    #[default]
    Memory,
    /// Durable SQLite table store.
    Sqlite,
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Which backend holds connections and users.
    #[serde(default)]
    pub backend: StorageBackend,

    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("handoff").join("handoff.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("handoff.db"))
        .to_string_lossy()
        .to_string()
}

fn default_wal_mode() -> bool {
    true
}

/// Downstream responder configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BotConfig {
    /// Reply sent for messages no routing rule or command consumed.
    #[serde(default = "default_fallback_reply")]
    pub fallback_reply: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            fallback_reply: default_fallback_reply(),
        }
    }
}

fn default_fallback_reply() -> String {
    "Hello World".to_string()
}
