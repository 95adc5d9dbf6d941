// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Handoff configuration system.

use handoff_config::diagnostic::{suggest_key, ConfigError};
use handoff_config::model::{HandoffConfig, RoutingMode, StorageBackend};
use handoff_config::{load_and_validate_str, load_config_from_str};

#[test]
fn full_config_deserializes() {
    let toml = r#"
[service]
name = "support-bot"
log_level = "debug"

[routing]
mode = "connect"
max_logged_messages = 50

[roles]
agent_name_prefix = "staff"
agent_user_ids = ["u-100", "u-200"]

[storage]
backend = "sqlite"
database_path = "/tmp/handoff-test.db"
wal_mode = false

[bot]
fallback_reply = "How can I help?"
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.service.name, "support-bot");
    assert_eq!(config.service.log_level, "debug");
    assert_eq!(config.routing.mode, RoutingMode::Connect);
    assert_eq!(config.routing.max_logged_messages, 50);
    assert_eq!(config.roles.agent_name_prefix.as_deref(), Some("staff"));
    assert_eq!(config.roles.agent_user_ids, vec!["u-100", "u-200"]);
    assert_eq!(config.storage.backend, StorageBackend::Sqlite);
    assert_eq!(config.storage.database_path, "/tmp/handoff-test.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.bot.fallback_reply, "How can I help?");
}

#[test]
fn empty_toml_uses_defaults() {
    let config = load_config_from_str("").expect("empty TOML should use defaults");
    let defaults = HandoffConfig::default();
    assert_eq!(config.routing.mode, defaults.routing.mode);
    assert_eq!(config.routing.max_logged_messages, 200);
    assert_eq!(config.bot.fallback_reply, "Hello World");
    assert_eq!(config.storage.backend, StorageBackend::Memory);
}

#[test]
fn partial_section_keeps_other_defaults() {
    let config = load_config_from_str("[roles]\nagent_user_ids = [\"a1\"]\n").unwrap();
    assert_eq!(config.roles.agent_user_ids, vec!["a1"]);
    assert_eq!(config.roles.agent_name_prefix.as_deref(), Some("agent"));
}

#[test]
fn unknown_key_reports_suggestion_and_span() {
    let toml = "[routing]\nmood = \"queue\"\n";
    let errors = load_and_validate_str(toml).expect_err("unknown key must fail");
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key,
            suggestion,
            valid_keys,
            span,
            ..
        } => {
            assert_eq!(key, "mood");
            assert_eq!(suggestion.as_deref(), Some("mode"));
            assert!(valid_keys.contains("max_logged_messages"));
            if let Some(span) = span {
                assert_eq!(span.offset(), toml.find("mood").unwrap());
            }
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

#[test]
fn unknown_section_is_rejected() {
    let errors = load_and_validate_str("[telemetry]\nenabled = true\n").unwrap_err();
    assert!(matches!(&errors[0], ConfigError::UnknownKey { key, .. } if key == "telemetry"));
}

#[test]
fn wrong_type_is_reported() {
    let errors = load_and_validate_str("[routing]\nmax_logged_messages = \"lots\"\n").unwrap_err();
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::InvalidType { detail, .. } if detail.contains("string"))),
        "got: {errors:?}"
    );
}

#[test]
fn semantic_errors_surface_through_load_and_validate() {
    let toml = r#"
[roles]
agent_name_prefix = ""

[storage]
backend = "sqlite"
database_path = ""
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    assert_eq!(errors.len(), 2, "got: {errors:?}");
    assert!(errors.iter().all(|e| matches!(e, ConfigError::Validation { .. })));
}

#[test]
fn valid_config_passes_load_and_validate() {
    let config = load_and_validate_str("[routing]\nmode = \"queue\"\n").unwrap();
    assert_eq!(config.routing.mode, RoutingMode::Queue);
}

#[test]
fn suggestions_cover_every_section() {
    assert_eq!(
        suggest_key("fallback_rply", &["fallback_reply"]),
        Some("fallback_reply".to_string())
    );
    assert_eq!(
        suggest_key("databse_path", &["backend", "database_path", "wal_mode"]),
        Some("database_path".to_string())
    );
    assert_eq!(
        suggest_key("log_levl", &["name", "log_level"]),
        Some("log_level".to_string())
    );
}

#[test]
fn validation_error_renders_code() {
    use miette::Diagnostic;

    let err = ConfigError::Validation {
        message: "x".into(),
    };
    let code = err.code().map(|c| c.to_string());
    assert_eq!(code.as_deref(), Some("handoff::config::validation"));
}
