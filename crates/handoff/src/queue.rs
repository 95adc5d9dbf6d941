// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `handoff queue` command: a read-only view of who is waiting and who is
//! connected.

use chrono::{DateTime, Utc};
use colored::Colorize;
use serde_json::json;

use handoff_config::model::{HandoffConfig, StorageBackend};
use handoff_core::{EstablishedConnection, HandoffError, HandoffUser, PendingConnection};
use handoff_router::RoutingStores;

fn since(at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    match at {
        Some(at) => format!("{}s", (now - at).num_seconds().max(0)),
        None => "-".to_string(),
    }
}

fn render_users(queued: &[HandoffUser], now: DateTime<Utc>) -> String {
    if queued.is_empty() {
        return "nobody is waiting for an agent".to_string();
    }
    let mut out = String::new();
    for (i, user) in queued.iter().enumerate() {
        let last = user.messages.first().map(|m| m.text.as_str()).unwrap_or("");
        out.push_str(&format!(
            "{:>3}. {:<20} waiting {:>6}  {}\n",
            i + 1,
            user.display_name(),
            since(user.queued_at, now),
            last
        ));
    }
    out
}

fn render_connections(
    pending: &[PendingConnection],
    established: &[EstablishedConnection],
    now: DateTime<Utc>,
) -> String {
    let mut out = String::new();
    if pending.is_empty() {
        out.push_str("nobody is waiting for an agent\n");
    }
    for (i, p) in pending.iter().enumerate() {
        out.push_str(&format!(
            "{:>3}. {:<20} waiting {:>6}\n",
            i + 1,
            p.participant.display_name(),
            since(Some(p.requested_at), now)
        ));
    }
    for conn in established {
        let [a, b] = &conn.participants;
        out.push_str(&format!(
            "     {} <-> {} for {}\n",
            a.display_name(),
            b.display_name(),
            since(Some(conn.established_at), now)
        ));
    }
    out
}

/// Runs `handoff queue`.
pub async fn run_queue(config: &HandoffConfig, as_json: bool) -> Result<(), HandoffError> {
    if config.storage.backend == StorageBackend::Memory {
        eprintln!(
            "{}",
            "storage.backend is memory; no state survives between runs".yellow()
        );
    }
    let stores = crate::open_stores(config).await?;
    let now = Utc::now();

    match &stores {
        RoutingStores::Queue(store) => {
            let queued = store.list_queued().await?;
            if as_json {
                println!("{}", json!({ "queued": queued }));
            } else {
                print!("{}", render_users(&queued, now));
            }
        }
        RoutingStores::Connect(store) => {
            let pending = store.list_pending().await?;
            let established = store.list_established().await?;
            if as_json {
                println!(
                    "{}",
                    json!({ "pending": pending, "established": established })
                );
            } else {
                print!("{}", render_connections(&pending, &established, now));
            }
        }
    }

    stores.shutdown().await
}
