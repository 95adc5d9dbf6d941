// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade; without an installed recorder every call is a no-op.

use metrics::{describe_counter, describe_gauge};

/// Register all Handoff metric descriptions.
pub fn register_metrics() {
    describe_counter!(
        "handoff_messages_total",
        "Inbound messages by routing outcome"
    );
    describe_counter!(
        "handoff_connections_total",
        "Connection and queue lifecycle transitions"
    );
    describe_gauge!("handoff_queue_depth", "Users or participants waiting for an agent");
}

/// Record one routed message. `outcome` is forwarded, handled, passthrough or failed.
pub fn record_message(outcome: &'static str) {
    metrics::counter!("handoff_messages_total", "outcome" => outcome).increment(1);
}

/// Record a lifecycle transition such as `requested`, `established` or `ended`.
pub fn record_connection(event: &'static str) {
    metrics::counter!("handoff_connections_total", "event" => event).increment(1);
}

pub fn set_queue_depth(depth: usize) {
    metrics::gauge!("handoff_queue_depth").set(depth as f64);
}
