// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes.

use crate::diagnostic::ConfigError;
use crate::model::{HandoffConfig, StorageBackend};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &HandoffConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let level = config.service.log_level.trim().to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "service.log_level `{}` must be one of {}",
                config.service.log_level,
                LOG_LEVELS.join(", ")
            ),
        });
    }

    if config.storage.backend == StorageBackend::Sqlite
        && config.storage.database_path.trim().is_empty()
    {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty when storage.backend = \"sqlite\""
                .to_string(),
        });
    }

    if config.routing.max_logged_messages == 0 {
        errors.push(ConfigError::Validation {
            message: "routing.max_logged_messages must be at least 1".to_string(),
        });
    }

    let has_prefix = config
        .roles
        .agent_name_prefix
        .as_deref()
        .is_some_and(|p| !p.trim().is_empty());
    if !has_prefix && config.roles.agent_user_ids.is_empty() {
        errors.push(ConfigError::Validation {
            message: "roles must set agent_name_prefix or agent_user_ids, otherwise no agent can ever connect"
                .to_string(),
        });
    }

    for (i, id) in config.roles.agent_user_ids.iter().enumerate() {
        if id.trim().is_empty() {
            errors.push(ConfigError::Validation {
                message: format!("roles.agent_user_ids[{i}] must not be empty"),
            });
        }
    }

    if config.bot.fallback_reply.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "bot.fallback_reply must not be empty".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has_message(errors: &[ConfigError], needle: &str) -> bool {
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains(needle)))
    }

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&HandoffConfig::default()).is_ok());
    }

    #[test]
    fn empty_database_path_fails_only_for_sqlite() {
        let mut config = HandoffConfig::default();
        config.storage.database_path = "".to_string();
        assert!(validate_config(&config).is_ok());

        config.storage.backend = StorageBackend::Sqlite;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "database_path"));
    }

    #[test]
    fn missing_agent_rules_fail_validation() {
        let mut config = HandoffConfig::default();
        config.roles.agent_name_prefix = Some("  ".to_string());
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "no agent can ever connect"));

        config.roles.agent_user_ids = vec!["agent-42".to_string()];
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn all_errors_are_collected() {
        let mut config = HandoffConfig::default();
        config.service.log_level = "loud".to_string();
        config.routing.max_logged_messages = 0;
        config.bot.fallback_reply = String::new();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(has_message(&errors, "log_level"));
        assert!(has_message(&errors, "max_logged_messages"));
        assert!(has_message(&errors, "fallback_reply"));
    }
}
