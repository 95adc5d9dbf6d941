// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pending and established connection rows.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Transaction};

use handoff_core::{
    EstablishedConnection, HandoffError, ParticipantRef, PendingConnection, RemovedConnection,
};

use crate::database::{from_millis, map_tr_err, to_millis, Database, StoreError};

/// Where a partition key currently sits, if anywhere.
enum Slot {
    Pending(i64),
    Established(i64),
}

fn find_slot(tx: &Transaction<'_>, key: &str) -> Result<Option<Slot>, StoreError> {
    let pending: Option<i64> = tx
        .query_row(
            "SELECT id FROM pending_connections WHERE partition_key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?;
    if let Some(id) = pending {
        return Ok(Some(Slot::Pending(id)));
    }
    let established: Option<i64> = tx
        .query_row(
            "SELECT id FROM established_connections WHERE first_key = ?1 OR second_key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(established.map(Slot::Established))
}

fn insert_established(
    tx: &Transaction<'_>,
    first: (&str, &ParticipantRef),
    second: (&str, &ParticipantRef),
    at: DateTime<Utc>,
) -> Result<(), StoreError> {
    tx.execute(
        "INSERT INTO established_connections
             (first_key, second_key, first_participant, second_participant, established_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            first.0,
            second.0,
            serde_json::to_string(first.1)?,
            serde_json::to_string(second.1)?,
            to_millis(at)
        ],
    )?;
    Ok(())
}

fn read_pending(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, i64)> {
    Ok((row.get(0)?, row.get(1)?))
}

fn parse_pending(raw: (String, i64)) -> Result<PendingConnection, StoreError> {
    Ok(PendingConnection {
        participant: serde_json::from_str(&raw.0)?,
        requested_at: from_millis(raw.1)?,
    })
}

fn read_established(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, String, i64)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

fn parse_established(raw: (String, String, i64)) -> Result<EstablishedConnection, StoreError> {
    Ok(EstablishedConnection::new(
        serde_json::from_str(&raw.0)?,
        serde_json::from_str(&raw.1)?,
        from_millis(raw.2)?,
    ))
}

pub async fn list_pending(db: &Database) -> Result<Vec<PendingConnection>, HandoffError> {
    db.connection()
        .call(|conn| -> Result<Vec<PendingConnection>, StoreError> {
            let mut stmt = conn.prepare(
                "SELECT participant, requested_at FROM pending_connections ORDER BY id ASC",
            )?;
            let rows = stmt.query_map([], read_pending)?;
            rows.map(|r| parse_pending(r?)).collect()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn add_pending(
    db: &Database,
    participant: &ParticipantRef,
    at: DateTime<Utc>,
) -> Result<PendingConnection, HandoffError> {
    let key = participant.key()?.partition_key();
    let participant = participant.clone();
    db.connection()
        .call(move |conn| -> Result<PendingConnection, StoreError> {
            let tx = conn.transaction()?;
            if find_slot(&tx, &key)?.is_some() {
                return Err(HandoffError::already_connected(&participant).into());
            }
            tx.execute(
                "INSERT INTO pending_connections (partition_key, participant, requested_at)
                 VALUES (?1, ?2, ?3)",
                params![key, serde_json::to_string(&participant)?, to_millis(at)],
            )?;
            tx.commit()?;
            Ok(PendingConnection {
                participant,
                requested_at: at,
            })
        })
        .await
        .map_err(map_tr_err)
}

pub async fn list_established(db: &Database) -> Result<Vec<EstablishedConnection>, HandoffError> {
    db.connection()
        .call(|conn| -> Result<Vec<EstablishedConnection>, StoreError> {
            let mut stmt = conn.prepare(
                "SELECT first_participant, second_participant, established_at
                 FROM established_connections ORDER BY id ASC",
            )?;
            let rows = stmt.query_map([], read_established)?;
            rows.map(|r| parse_established(r?)).collect()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn add_established(
    db: &Database,
    first: &ParticipantRef,
    second: &ParticipantRef,
    at: DateTime<Utc>,
) -> Result<EstablishedConnection, HandoffError> {
    let first_key = first.key()?.partition_key();
    let second_key = second.key()?.partition_key();
    if first_key == second_key {
        return Err(HandoffError::InvalidInput(format!(
            "{first}: cannot connect a participant to itself"
        )));
    }
    let (first, second) = (first.clone(), second.clone());
    db.connection()
        .call(move |conn| -> Result<EstablishedConnection, StoreError> {
            let tx = conn.transaction()?;
            for (key, participant) in [(&first_key, &first), (&second_key, &second)] {
                if find_slot(&tx, key)?.is_some() {
                    return Err(HandoffError::already_connected(participant).into());
                }
            }
            insert_established(&tx, (&first_key, &first), (&second_key, &second), at)?;
            tx.commit()?;
            Ok(EstablishedConnection::new(first, second, at))
        })
        .await
        .map_err(map_tr_err)
}

pub async fn promote_pending(
    db: &Database,
    target: &ParticipantRef,
    joiner: &ParticipantRef,
    at: DateTime<Utc>,
) -> Result<EstablishedConnection, HandoffError> {
    let target_key = target.key()?.partition_key();
    let joiner_key = joiner.key()?.partition_key();
    let (target, joiner) = (target.clone(), joiner.clone());
    db.connection()
        .call(move |conn| -> Result<EstablishedConnection, StoreError> {
            let tx = conn.transaction()?;
            if find_slot(&tx, &joiner_key)?.is_some() {
                return Err(HandoffError::already_connected(&joiner).into());
            }
            let pending: Option<(i64, String)> = tx
                .query_row(
                    "SELECT id, participant FROM pending_connections WHERE partition_key = ?1",
                    params![target_key],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            let Some((id, raw)) = pending else {
                return Err(HandoffError::no_such_pending(&target).into());
            };
            let stored: ParticipantRef = serde_json::from_str(&raw)?;

            tx.execute("DELETE FROM pending_connections WHERE id = ?1", params![id])?;
            insert_established(&tx, (&target_key, &stored), (&joiner_key, &joiner), at)?;
            tx.commit()?;
            Ok(EstablishedConnection::new(stored, joiner, at))
        })
        .await
        .map_err(map_tr_err)
}

pub async fn remove_by_participant(
    db: &Database,
    participant: &ParticipantRef,
) -> Result<Option<RemovedConnection>, HandoffError> {
    let key = participant.key()?.partition_key();
    db.connection()
        .call(move |conn| -> Result<Option<RemovedConnection>, StoreError> {
            let tx = conn.transaction()?;
            let removed = match find_slot(&tx, &key)? {
                None => None,
                Some(Slot::Pending(id)) => {
                    let raw = tx.query_row(
                        "SELECT participant, requested_at FROM pending_connections WHERE id = ?1",
                        params![id],
                        read_pending,
                    )?;
                    tx.execute("DELETE FROM pending_connections WHERE id = ?1", params![id])?;
                    Some(RemovedConnection::Pending(parse_pending(raw)?))
                }
                Some(Slot::Established(id)) => {
                    let raw = tx.query_row(
                        "SELECT first_participant, second_participant, established_at
                         FROM established_connections WHERE id = ?1",
                        params![id],
                        read_established,
                    )?;
                    tx.execute(
                        "DELETE FROM established_connections WHERE id = ?1",
                        params![id],
                    )?;
                    Some(RemovedConnection::Established(parse_established(raw)?))
                }
            };
            tx.commit()?;
            Ok(removed)
        })
        .await
        .map_err(map_tr_err)
}
