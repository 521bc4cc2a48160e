// SPDX-FileCopyrightText: 2026 Mailbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection store operations.
//!
//! One row per user per provider. The Gmail row owns the ingestion baseline
//! and the poll high-water mark; disconnecting Gmail cascades to the user's
//! messages.

use chrono::Utc;
use mailbridge_core::BridgeError;
use mailbridge_core::types::rfc3339_millis;
use rusqlite::params;

use crate::database::Database;
use crate::models::{Connection, Provider};

fn row_to_connection(row: &rusqlite::Row<'_>) -> Result<Connection, rusqlite::Error> {
    let provider: String = row.get(1)?;
    let provider = provider.parse::<Provider>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Connection {
        user_id: row.get(0)?,
        provider,
        account_email: row.get(2)?,
        baseline_at: row.get(3)?,
        baseline_ready: row.get::<_, i64>(4)? != 0,
        last_poll_at: row.get(5)?,
        last_checked_at: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

const CONNECTION_COLUMNS: &str = "user_id, provider, account_email, baseline_at, \
     baseline_ready, last_poll_at, last_checked_at, created_at, updated_at";

/// Insert or refresh a connection record.
///
/// Re-connecting an existing provider only refreshes the account email; the
/// baseline and poll state survive (a hard reset goes through
/// [`disconnect`]).
pub async fn upsert_connection(
    db: &Database,
    user_id: &str,
    provider: Provider,
    account_email: Option<&str>,
) -> Result<(), BridgeError> {
    let user_id = user_id.to_string();
    let provider = provider.to_string();
    let account_email = account_email.map(str::to_string);
    let now = rfc3339_millis(Utc::now());
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO connections (user_id, provider, account_email, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)
                 ON CONFLICT (user_id, provider) DO UPDATE SET
                     account_email = excluded.account_email,
                     updated_at = excluded.updated_at",
                params![user_id, provider, account_email, now],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Look up a user's connection for one provider.
pub async fn get_connection(
    db: &Database,
    user_id: &str,
    provider: Provider,
) -> Result<Option<Connection>, BridgeError> {
    let user_id = user_id.to_string();
    let provider = provider.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CONNECTION_COLUMNS} FROM connections
                 WHERE user_id = ?1 AND provider = ?2"
            ))?;
            let result = stmt.query_row(params![user_id, provider], row_to_connection);
            match result {
                Ok(connection) => Ok(Some(connection)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Fix the ingestion baseline for a user's Gmail connection.
///
/// Idempotent: if `baseline_at` is already set the call is a no-op and
/// returns `false`. The baseline is immutable once written.
pub async fn set_baseline(
    db: &Database,
    user_id: &str,
    baseline_at: &str,
) -> Result<bool, BridgeError> {
    let user_id = user_id.to_string();
    let baseline_at = baseline_at.to_string();
    let now = rfc3339_millis(Utc::now());
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE connections
                 SET baseline_at = ?1, baseline_ready = 0, last_poll_at = NULL, updated_at = ?2
                 WHERE user_id = ?3 AND provider = 'gmail' AND baseline_at IS NULL",
                params![baseline_at, now, user_id],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Mark the Gmail baseline as ready once the first ingestion pass completes.
pub async fn mark_baseline_ready(db: &Database, user_id: &str) -> Result<(), BridgeError> {
    let user_id = user_id.to_string();
    let now = rfc3339_millis(Utc::now());
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE connections SET baseline_ready = 1, updated_at = ?1
                 WHERE user_id = ?2 AND provider = 'gmail'",
                params![now, user_id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Advance the poll high-water mark to the `received_at` of the last fully
/// processed message.
pub async fn advance_last_poll(
    db: &Database,
    user_id: &str,
    last_poll_at: &str,
) -> Result<(), BridgeError> {
    let user_id = user_id.to_string();
    let last_poll_at = last_poll_at.to_string();
    let now = rfc3339_millis(Utc::now());
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE connections SET last_poll_at = ?1, updated_at = ?2
                 WHERE user_id = ?3 AND provider = 'gmail'",
                params![last_poll_at, now, user_id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Record the wall-clock completion time of a sync pass.
pub async fn touch_last_checked(
    db: &Database,
    user_id: &str,
    checked_at: &str,
) -> Result<(), BridgeError> {
    let user_id = user_id.to_string();
    let checked_at = checked_at.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE connections SET last_checked_at = ?1, updated_at = ?1
                 WHERE user_id = ?2 AND provider = 'gmail'",
                params![checked_at, user_id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Delete a connection. For Gmail this cascades to every message the user
/// has, in one transaction. Destructive and irreversible: callers must treat
/// it as a hard reset of sync state.
pub async fn disconnect(
    db: &Database,
    user_id: &str,
    provider: Provider,
) -> Result<(), BridgeError> {
    let user_id = user_id.to_string();
    let provider_str = provider.to_string();
    let cascade = provider == Provider::Gmail;
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM connections WHERE user_id = ?1 AND provider = ?2",
                params![user_id, provider_str],
            )?;
            if cascade {
                tx.execute("DELETE FROM messages WHERE user_id = ?1", params![user_id])?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}
