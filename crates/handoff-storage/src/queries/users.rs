// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Handoff-user rows, the message log and queue selection.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use handoff_core::{HandoffError, HandoffUser, LoggedMessage, ParticipantRef, UserState};

use crate::database::{from_millis, map_tr_err, to_millis, Database, StoreError};

struct UserRow {
    seq: i64,
    participant: String,
    state: String,
    agent_participant: Option<String>,
    queued_at: Option<i64>,
    created_at: i64,
}

/// Insert the user in the `bot` state unless present; returns its seq.
fn ensure_user(
    conn: &Connection,
    key: &str,
    participant: &ParticipantRef,
    at: DateTime<Utc>,
) -> Result<i64, StoreError> {
    conn.execute(
        "INSERT INTO handoff_users (partition_key, participant, state, created_at)
         VALUES (?1, ?2, 'bot', ?3)
         ON CONFLICT(partition_key) DO NOTHING",
        params![key, serde_json::to_string(participant)?, to_millis(at)],
    )?;
    let seq = conn.query_row(
        "SELECT seq FROM handoff_users WHERE partition_key = ?1",
        params![key],
        |row| row.get(0),
    )?;
    Ok(seq)
}

fn load_user(conn: &Connection, seq: i64) -> Result<HandoffUser, StoreError> {
    let row = conn.query_row(
        "SELECT seq, participant, state, agent_participant, queued_at, created_at
         FROM handoff_users WHERE seq = ?1",
        params![seq],
        |row| {
            Ok(UserRow {
                seq: row.get(0)?,
                participant: row.get(1)?,
                state: row.get(2)?,
                agent_participant: row.get(3)?,
                queued_at: row.get(4)?,
                created_at: row.get(5)?,
            })
        },
    )?;

    let mut stmt = conn.prepare(
        "SELECT sender, body, logged_at FROM handoff_messages
         WHERE user_seq = ?1 ORDER BY id DESC",
    )?;
    let messages = stmt
        .query_map(params![seq], |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?, r.get::<_, i64>(2)?))
        })?
        .map(|r| {
            let (from, text, at) = r?;
            Ok(LoggedMessage {
                from,
                text,
                at: from_millis(at)?,
            })
        })
        .collect::<Result<Vec<_>, StoreError>>()?;

    Ok(HandoffUser {
        participant: serde_json::from_str(&row.participant)?,
        messages,
        state: UserState::from_str(&row.state)
            .map_err(|_| StoreError::Corrupt(format!("unknown user state `{}`", row.state)))?,
        agent: row
            .agent_participant
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?,
        queued_at: row.queued_at.map(from_millis).transpose()?,
        seq: u64::try_from(row.seq)
            .map_err(|_| StoreError::Corrupt(format!("negative seq {}", row.seq)))?,
        created_at: from_millis(row.created_at)?,
    })
}

/// Seqs of the users claiming `agent_key`.
fn seqs_for_agent(conn: &Connection, agent_key: &str) -> Result<Vec<i64>, StoreError> {
    let mut stmt = conn.prepare("SELECT seq FROM handoff_users WHERE agent_key = ?1")?;
    let seqs = stmt
        .query_map(params![agent_key], |row| row.get(0))?
        .collect::<Result<Vec<i64>, _>>()?;
    Ok(seqs)
}

fn single_seq_for_agent(
    conn: &Connection,
    agent_key: &str,
    agent: &ParticipantRef,
) -> Result<Option<i64>, StoreError> {
    let seqs = seqs_for_agent(conn, agent_key)?;
    match seqs.as_slice() {
        [] => Ok(None),
        [seq] => Ok(Some(*seq)),
        _ => Err(HandoffError::ConsistencyViolation(format!(
            "agent {agent} is connected to {} users",
            seqs.len()
        ))
        .into()),
    }
}

/// Whether the row under `key` is waiting for or talking to an agent.
fn is_engaged_user(conn: &Connection, key: &str) -> Result<bool, StoreError> {
    let engaged = conn
        .query_row(
            "SELECT 1 FROM handoff_users
             WHERE partition_key = ?1 AND state IN ('queued', 'agent')",
            params![key],
            |_| Ok(()),
        )
        .optional()?
        .is_some();
    Ok(engaged)
}

fn mark_bot(conn: &Connection, seq: i64) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE handoff_users
         SET state = 'bot', queued_at = NULL, agent_key = NULL, agent_participant = NULL
         WHERE seq = ?1",
        params![seq],
    )?;
    Ok(())
}

pub async fn find_or_create_user(
    db: &Database,
    user: &ParticipantRef,
    at: DateTime<Utc>,
) -> Result<HandoffUser, HandoffError> {
    let key = user.key()?.partition_key();
    let user = user.clone();
    db.connection()
        .call(move |conn| -> Result<HandoffUser, StoreError> {
            let tx = conn.transaction()?;
            let seq = ensure_user(&tx, &key, &user, at)?;
            let record = load_user(&tx, seq)?;
            tx.commit()?;
            Ok(record)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn log_message(
    db: &Database,
    user: &ParticipantRef,
    from: &str,
    text: &str,
    at: DateTime<Utc>,
    limit: usize,
) -> Result<HandoffUser, HandoffError> {
    let key = user.key()?.partition_key();
    let (user, from, text) = (user.clone(), from.to_string(), text.to_string());
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    db.connection()
        .call(move |conn| -> Result<HandoffUser, StoreError> {
            let tx = conn.transaction()?;
            let seq = ensure_user(&tx, &key, &user, at)?;
            tx.execute(
                "INSERT INTO handoff_messages (user_seq, sender, body, logged_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![seq, from, text, to_millis(at)],
            )?;
            tx.execute(
                "DELETE FROM handoff_messages
                 WHERE user_seq = ?1 AND id NOT IN (
                     SELECT id FROM handoff_messages WHERE user_seq = ?1
                     ORDER BY id DESC LIMIT ?2
                 )",
                params![seq, limit],
            )?;
            let record = load_user(&tx, seq)?;
            tx.commit()?;
            Ok(record)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn find_user_by_agent(
    db: &Database,
    agent: &ParticipantRef,
) -> Result<Option<HandoffUser>, HandoffError> {
    let agent_key = agent.key()?.partition_key();
    let agent = agent.clone();
    db.connection()
        .call(move |conn| -> Result<Option<HandoffUser>, StoreError> {
            single_seq_for_agent(conn, &agent_key, &agent)?
                .map(|seq| load_user(conn, seq))
                .transpose()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn enqueue(
    db: &Database,
    user: &ParticipantRef,
    at: DateTime<Utc>,
) -> Result<HandoffUser, HandoffError> {
    let key = user.key()?.partition_key();
    let user = user.clone();
    db.connection()
        .call(move |conn| -> Result<HandoffUser, StoreError> {
            let tx = conn.transaction()?;
            if single_seq_for_agent(&tx, &key, &user)?.is_some() {
                return Err(HandoffError::already_connected(&user).into());
            }
            let seq = ensure_user(&tx, &key, &user, at)?;
            let state: String = tx.query_row(
                "SELECT state FROM handoff_users WHERE seq = ?1",
                params![seq],
                |row| row.get(0),
            )?;
            if state == UserState::Agent.to_string() {
                return Err(HandoffError::already_connected(&user).into());
            }
            tx.execute(
                "UPDATE handoff_users
                 SET state = 'queued', queued_at = ?2, agent_key = NULL, agent_participant = NULL
                 WHERE seq = ?1",
                params![seq, to_millis(at)],
            )?;
            let record = load_user(&tx, seq)?;
            tx.commit()?;
            Ok(record)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn dequeue(
    db: &Database,
    user: &ParticipantRef,
    at: DateTime<Utc>,
) -> Result<HandoffUser, HandoffError> {
    let key = user.key()?.partition_key();
    let user = user.clone();
    db.connection()
        .call(move |conn| -> Result<HandoffUser, StoreError> {
            let tx = conn.transaction()?;
            let seq = ensure_user(&tx, &key, &user, at)?;
            mark_bot(&tx, seq)?;
            let record = load_user(&tx, seq)?;
            tx.commit()?;
            Ok(record)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn connect_oldest_queued(
    db: &Database,
    agent: &ParticipantRef,
) -> Result<Option<HandoffUser>, HandoffError> {
    let agent_key = agent.key()?.partition_key();
    let agent = agent.clone();
    db.connection()
        .call(move |conn| -> Result<Option<HandoffUser>, StoreError> {
            let tx = conn.transaction()?;
            if single_seq_for_agent(&tx, &agent_key, &agent)?.is_some()
                || is_engaged_user(&tx, &agent_key)?
            {
                return Err(HandoffError::already_connected(&agent).into());
            }
            let oldest: Option<i64> = tx
                .query_row(
                    "SELECT seq FROM handoff_users
                     WHERE state = 'queued' AND partition_key <> ?1
                     ORDER BY queued_at ASC, seq ASC LIMIT 1",
                    params![agent_key],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(seq) = oldest else {
                return Ok(None);
            };
            tx.execute(
                "UPDATE handoff_users
                 SET state = 'agent', queued_at = NULL, agent_key = ?2, agent_participant = ?3
                 WHERE seq = ?1",
                params![seq, agent_key, serde_json::to_string(&agent)?],
            )?;
            let record = load_user(&tx, seq)?;
            tx.commit()?;
            Ok(Some(record))
        })
        .await
        .map_err(map_tr_err)
}

pub async fn disconnect_agent(
    db: &Database,
    agent: &ParticipantRef,
) -> Result<HandoffUser, HandoffError> {
    let agent_key = agent.key()?.partition_key();
    let agent = agent.clone();
    db.connection()
        .call(move |conn| -> Result<HandoffUser, StoreError> {
            let tx = conn.transaction()?;
            let Some(seq) = single_seq_for_agent(&tx, &agent_key, &agent)? else {
                return Err(HandoffError::not_connected(&agent).into());
            };
            mark_bot(&tx, seq)?;
            let record = load_user(&tx, seq)?;
            tx.commit()?;
            Ok(record)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn list_queued(db: &Database) -> Result<Vec<HandoffUser>, HandoffError> {
    db.connection()
        .call(|conn| -> Result<Vec<HandoffUser>, StoreError> {
            let mut stmt = conn.prepare(
                "SELECT seq FROM handoff_users WHERE state = 'queued'
                 ORDER BY queued_at ASC, seq ASC",
            )?;
            let seqs = stmt
                .query_map([], |row| row.get(0))?
                .collect::<Result<Vec<i64>, _>>()?;
            seqs.into_iter().map(|seq| load_user(conn, seq)).collect()
        })
        .await
        .map_err(map_tr_err)
}
