// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Agent role detection as an injected predicate.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use handoff_config::model::RolesConfig;
use handoff_core::ParticipantRef;

type Predicate = dyn Fn(&ParticipantRef) -> bool + Send + Sync;

/// Decides whether a participant is a human agent endpoint.
#[derive(Clone)]
pub struct AgentClassifier {
    predicate: Arc<Predicate>,
}

impl AgentClassifier {
    pub fn new(predicate: impl Fn(&ParticipantRef) -> bool + Send + Sync + 'static) -> Self {
        Self {
            predicate: Arc::new(predicate),
        }
    }

    pub fn is_agent(&self, participant: &ParticipantRef) -> bool {
        (self.predicate)(participant)
    }

    /// Nobody is an agent.
    pub fn never() -> Self {
        Self::new(|_| false)
    }

    /// Display name starts with `prefix`, ignoring ASCII case.
    pub fn name_prefix(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into().to_ascii_lowercase();
        Self::new(move |participant| {
            participant
                .display_name()
                .to_ascii_lowercase()
                .starts_with(&prefix)
        })
    }

    /// User id is one of `ids`.
    pub fn user_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: HashSet<String> = ids.into_iter().map(Into::into).collect();
        Self::new(move |participant| {
            participant
                .user
                .as_ref()
                .is_some_and(|user| ids.contains(&user.id))
        })
    }

    /// Matches when any of `classifiers` matches.
    pub fn any_of(classifiers: Vec<AgentClassifier>) -> Self {
        Self::new(move |participant| classifiers.iter().any(|c| c.is_agent(participant)))
    }

    /// Build from `[roles]`: an empty prefix is ignored.
    pub fn from_config(roles: &RolesConfig) -> Self {
        let mut rules = Vec::new();
        if let Some(prefix) = roles
            .agent_name_prefix
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
        {
            rules.push(Self::name_prefix(prefix));
        }
        if !roles.agent_user_ids.is_empty() {
            rules.push(Self::user_ids(roles.agent_user_ids.iter().cloned()));
        }
        match rules.len() {
            0 => Self::never(),
            1 => rules.remove(0),
            _ => Self::any_of(rules),
        }
    }
}

impl fmt::Debug for AgentClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentClassifier").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use handoff_core::{ChannelAccount, ConversationAccount};

    fn named(id: &str, name: &str) -> ParticipantRef {
        ParticipantRef::new(
            ChannelAccount::new(id, name),
            ConversationAccount::new("c"),
            "test",
        )
    }

    #[test]
    fn prefix_is_case_insensitive_and_falls_back_to_id() {
        let classifier = AgentClassifier::name_prefix("agent");
        assert!(classifier.is_agent(&named("1", "Agent Smith")));
        assert!(!classifier.is_agent(&named("2", "Alice")));

        let mut nameless = named("agent-7", "");
        nameless.user.as_mut().unwrap().name = None;
        assert!(classifier.is_agent(&nameless));
    }

    #[test]
    fn config_combines_rules() {
        let roles = RolesConfig {
            agent_name_prefix: Some("staff".into()),
            agent_user_ids: vec!["u-9".into()],
        };
        let classifier = AgentClassifier::from_config(&roles);
        assert!(classifier.is_agent(&named("x", "Staff Bob")));
        assert!(classifier.is_agent(&named("u-9", "Carol")));
        assert!(!classifier.is_agent(&named("u-1", "Dave")));
    }

    #[test]
    fn empty_config_classifies_nobody() {
        let roles = RolesConfig {
            agent_name_prefix: Some("  ".into()),
            agent_user_ids: Vec::new(),
        };
        assert!(!AgentClassifier::from_config(&roles).is_agent(&named("agent", "agent")));
    }
}
