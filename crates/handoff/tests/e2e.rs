// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end routing scenarios through the complete relay.
//!
//! Each test builds an isolated TestHarness per storage backend. Tests are
//! independent and order-insensitive.

use handoff_config::model::{RoutingMode, StorageBackend};
use handoff_core::{HandoffError, UserState};
use handoff_router::{RoutingOutcome, RoutingStores};
use handoff_test_utils::TestHarness;

const BACKENDS: [StorageBackend; 2] = [StorageBackend::Memory, StorageBackend::Sqlite];

async fn harness(mode: RoutingMode, backend: StorageBackend) -> TestHarness {
    TestHarness::builder()
        .with_mode(mode)
        .with_backend(backend)
        .build()
        .await
        .unwrap()
}

async fn user_state(harness: &TestHarness, user_id: &str, name: &str) -> UserState {
    let RoutingStores::Queue(store) = &harness.stores else {
        panic!("queue mode expected");
    };
    let who = harness.message(user_id, name, "").participant_ref();
    store.find_or_create_user(&who).await.unwrap().state
}

// ---- Queue mode: the full agent handoff scenario ----

#[tokio::test]
async fn queue_handoff_scenario() {
    for backend in BACKENDS {
        let h = harness(RoutingMode::Queue, backend).await;

        h.send_as("u1", "Alice", "agent").await.unwrap();
        assert_eq!(h.received_by("u1").await, vec!["Waiting for agent"]);
        assert_eq!(user_state(&h, "u1", "Alice").await, UserState::Queued);

        h.send_as("agent1", "agent1", "#list").await.unwrap();
        assert_eq!(h.last_received_by("agent1").await.unwrap(), "- Alice");

        h.send_as("agent1", "agent1", "#connect").await.unwrap();
        assert_eq!(
            h.last_received_by("agent1").await.unwrap(),
            "Connected to Alice"
        );
        assert_eq!(user_state(&h, "u1", "Alice").await, UserState::Agent);

        let outcome = h.send_as("agent1", "agent1", "hello").await.unwrap();
        assert!(matches!(outcome, RoutingOutcome::Forwarded { .. }));
        assert_eq!(
            h.received_by("u1").await,
            vec!["Waiting for agent", "hello"],
            "{backend:?}: user must receive only the forwarded text"
        );

        h.send_as("u1", "Alice", "thanks").await.unwrap();
        assert_eq!(h.last_received_by("agent1").await.unwrap(), "thanks");

        h.send_as("agent1", "agent1", "#disconnect").await.unwrap();
        assert_eq!(
            h.last_received_by("agent1").await.unwrap(),
            "Reconnected to bot"
        );
        assert_eq!(user_state(&h, "u1", "Alice").await, UserState::Bot);

        // Back with the bot.
        let outcome = h.send_as("u1", "Alice", "hi again").await.unwrap();
        assert_eq!(outcome, RoutingOutcome::Passthrough);
        assert_eq!(h.last_received_by("u1").await.unwrap(), "Hello World");
    }
}

#[tokio::test]
async fn queue_connects_oldest_first() {
    for backend in BACKENDS {
        let h = harness(RoutingMode::Queue, backend).await;
        for (id, name) in [("u1", "U1"), ("u2", "U2"), ("u3", "U3")] {
            h.send_as(id, name, "agent").await.unwrap();
        }
        h.send_as("agent1", "agent1", "#list").await.unwrap();
        assert_eq!(
            h.last_received_by("agent1").await.unwrap(),
            "- U1\n- U2\n- U3"
        );

        for (agent, expected) in [("agent1", "U1"), ("agent2", "U2"), ("agent3", "U3")] {
            h.send_as(agent, agent, "#connect").await.unwrap();
            assert_eq!(
                h.last_received_by(agent).await.unwrap(),
                format!("Connected to {expected}"),
                "{backend:?}"
            );
        }
        h.send_as("agent4", "agent4", "#connect").await.unwrap();
        assert_eq!(
            h.last_received_by("agent4").await.unwrap(),
            "Nobody in the queue."
        );
    }
}

#[tokio::test]
async fn queue_commands_rejected_while_connected() {
    let h = harness(RoutingMode::Queue, StorageBackend::Memory).await;
    h.send_as("u1", "Alice", "agent").await.unwrap();
    h.send_as("agent1", "agent1", "#connect").await.unwrap();

    for cmd in ["#list", "#connect", "#whatever"] {
        h.send_as("agent1", "agent1", cmd).await.unwrap();
        assert_eq!(
            h.last_received_by("agent1").await.unwrap(),
            "Command not valid when connected to user."
        );
    }
    assert_eq!(h.received_by("u1").await, vec!["Waiting for agent"]);
}

#[tokio::test]
async fn queue_cancel_returns_to_bot() {
    let h = harness(RoutingMode::Queue, StorageBackend::Memory).await;
    h.send_as("u1", "Alice", "agent").await.unwrap();
    h.send_as("u1", "Alice", "  CANCEL ").await.unwrap();
    assert_eq!(h.last_received_by("u1").await.unwrap(), "Connected to bot");
    assert_eq!(user_state(&h, "u1", "Alice").await, UserState::Bot);

    h.send_as("agent1", "agent1", "#list").await.unwrap();
    assert_eq!(
        h.last_received_by("agent1").await.unwrap(),
        "Nobody in the queue."
    );
}

#[tokio::test]
async fn queue_logs_both_sides_most_recent_first() {
    let h = TestHarness::builder()
        .with_max_logged_messages(3)
        .build()
        .await
        .unwrap();
    h.send_as("u1", "Alice", "agent").await.unwrap();
    h.send_as("agent1", "agent1", "#connect").await.unwrap();
    h.send_as("agent1", "agent1", "hi, how can I help").await.unwrap();
    h.send_as("u1", "Alice", "my order is late").await.unwrap();

    let RoutingStores::Queue(store) = &h.stores else {
        panic!("queue mode expected");
    };
    let who = h.message("u1", "Alice", "").participant_ref();
    let user = store.find_or_create_user(&who).await.unwrap();
    let log: Vec<(&str, &str)> = user
        .messages
        .iter()
        .map(|m| (m.from.as_str(), m.text.as_str()))
        .collect();
    assert_eq!(
        log,
        vec![
            ("Alice", "my order is late"),
            ("agent1", "hi, how can I help"),
            ("Alice", "agent"),
        ]
    );
}

// ---- Non-interference ----

#[tokio::test]
async fn unconnected_user_is_never_forwarded() {
    for mode in [RoutingMode::Queue, RoutingMode::Connect] {
        let h = harness(mode, StorageBackend::Memory).await;
        let outcome = h.send_as("u1", "Alice", "what are your hours?").await.unwrap();
        assert_eq!(outcome, RoutingOutcome::Passthrough);
        assert_eq!(h.transport.forward_count().await, 0);
        assert_eq!(h.received_by("u1").await, vec!["Hello World"]);
    }
}

#[tokio::test]
async fn unconnected_agent_chat_reaches_bot() {
    let h = harness(RoutingMode::Queue, StorageBackend::Memory).await;
    h.send_as("agent1", "agent1", "#frobnicate").await.unwrap();
    assert_eq!(h.last_received_by("agent1").await.unwrap(), "Hello World");
    h.send_as("agent1", "agent1", "#disconnect").await.unwrap();
    assert_eq!(
        h.last_received_by("agent1").await.unwrap(),
        "Not connected to a user."
    );
}

// ---- Connect mode: pending-set model ----

#[tokio::test]
async fn connect_mode_scenario() {
    for backend in BACKENDS {
        let h = harness(RoutingMode::Connect, backend).await;

        h.send_as("u1", "Alice", "agent").await.unwrap();
        h.send_as("u1", "Alice", "agent").await.unwrap();
        assert_eq!(
            h.received_by("u1").await,
            vec!["Waiting for agent", "Waiting for agent"]
        );

        h.send_as("agent1", "agent1", "#list").await.unwrap();
        assert_eq!(h.last_received_by("agent1").await.unwrap(), "- Alice");
        h.send_as("agent1", "agent1", "#connect").await.unwrap();
        assert_eq!(
            h.last_received_by("agent1").await.unwrap(),
            "Connected to Alice"
        );

        h.send_as("agent1", "agent1", "hello").await.unwrap();
        h.send_as("u1", "Alice", "hi").await.unwrap();
        assert_eq!(h.last_received_by("u1").await.unwrap(), "hello");
        assert_eq!(h.last_received_by("agent1").await.unwrap(), "hi");

        h.send_as("agent1", "agent1", "#list").await.unwrap();
        assert_eq!(
            h.last_received_by("agent1").await.unwrap(),
            "Command not valid when connected to user."
        );

        h.send_as("agent1", "agent1", "#disconnect").await.unwrap();
        assert_eq!(
            h.last_received_by("agent1").await.unwrap(),
            "Reconnected to bot",
            "{backend:?}"
        );
        let outcome = h.send_as("u1", "Alice", "still there?").await.unwrap();
        assert_eq!(outcome, RoutingOutcome::Passthrough);
    }
}

#[tokio::test]
async fn connect_mode_user_can_end_from_either_side() {
    let h = harness(RoutingMode::Connect, StorageBackend::Sqlite).await;
    h.send_as("u1", "Alice", "agent").await.unwrap();
    h.send_as("agent1", "agent1", "#connect").await.unwrap();

    // While connected, "cancel" is ordinary chat and is forwarded.
    h.send_as("u1", "Alice", "cancel").await.unwrap();
    assert_eq!(h.last_received_by("agent1").await.unwrap(), "cancel");

    h.send_as("agent1", "agent1", "#disconnect").await.unwrap();
    h.send_as("u1", "Alice", "cancel").await.unwrap();
    assert_eq!(h.last_received_by("u1").await.unwrap(), "Connected to bot");
}

// ---- Failure propagation ----

#[tokio::test]
async fn transport_failure_is_propagated_and_state_kept() {
    let h = harness(RoutingMode::Queue, StorageBackend::Memory).await;
    h.send_as("u1", "Alice", "agent").await.unwrap();
    h.send_as("agent1", "agent1", "#connect").await.unwrap();

    h.transport.fail_next_forward();
    let err = h.send_as("agent1", "agent1", "hello").await.unwrap_err();
    assert!(matches!(err, HandoffError::Transport { .. }));
    assert_eq!(user_state(&h, "u1", "Alice").await, UserState::Agent);

    h.send_as("agent1", "agent1", "hello again").await.unwrap();
    assert_eq!(h.last_received_by("u1").await.unwrap(), "hello again");
}

#[tokio::test]
async fn agent_ids_classify_without_prefix() {
    let h = TestHarness::builder()
        .with_agent_ids(&["support-7"])
        .with_fallback_reply("How can I help?")
        .build()
        .await
        .unwrap();
    h.send_as("u1", "Alice", "agent").await.unwrap();
    h.send_as("support-7", "Sam", "#connect").await.unwrap();
    assert_eq!(
        h.last_received_by("support-7").await.unwrap(),
        "Connected to Alice"
    );
    h.send_as("u2", "Bob", "hey").await.unwrap();
    assert_eq!(h.last_received_by("u2").await.unwrap(), "How can I help?");
}
