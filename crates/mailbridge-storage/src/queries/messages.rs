// SPDX-FileCopyrightText: 2026 Mailbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message store operations: dedup upsert, status lifecycle, query service
//! reads, and bounded-cache eviction.

use mailbridge_core::BridgeError;
use mailbridge_core::types::rfc3339_millis;
use rusqlite::params;

use crate::database::Database;
use crate::models::{InboxMessage, InboxSummary, MessageStatus, StatusCounts};

const MESSAGE_COLUMNS: &str = "user_id, message_id, thread_id, subject, sender, snippet, \
     preview, status, has_attachments, has_images, has_links, gmail_url, crm_record_url, \
     error, received_at, created_at, updated_at";

fn row_to_message(row: &rusqlite::Row<'_>) -> Result<InboxMessage, rusqlite::Error> {
    let status: String = row.get(7)?;
    let status = status.parse::<MessageStatus>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(InboxMessage {
        user_id: row.get(0)?,
        message_id: row.get(1)?,
        thread_id: row.get(2)?,
        subject: row.get(3)?,
        sender: row.get(4)?,
        snippet: row.get(5)?,
        preview: row.get(6)?,
        status,
        has_attachments: row.get::<_, i64>(8)? != 0,
        has_images: row.get::<_, i64>(9)? != 0,
        has_links: row.get::<_, i64>(10)? != 0,
        gmail_url: row.get(11)?,
        crm_record_url: row.get(12)?,
        error: row.get(13)?,
        received_at: row.get(14)?,
        created_at: row.get(15)?,
        updated_at: row.get(16)?,
    })
}

/// Insert a freshly ingested message, or refresh the header fields of an
/// existing row with the same `(user_id, message_id)`.
///
/// Re-ingestion never touches the lifecycle fields (`status`,
/// `crm_record_url`, `error`) — those move only through [`update_status`].
/// When the incoming header fields are byte-identical the upsert is a full
/// no-op, so overlapping fetch windows cause no `updated_at` churn.
pub async fn upsert_message(db: &Database, msg: &InboxMessage) -> Result<(), BridgeError> {
    let msg = msg.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO messages (user_id, message_id, thread_id, subject, sender,
                     snippet, preview, status, has_attachments, has_images, has_links,
                     gmail_url, crm_record_url, error, received_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                     ?15, ?16, ?17)
                 ON CONFLICT (user_id, message_id) DO UPDATE SET
                     thread_id = excluded.thread_id,
                     subject = excluded.subject,
                     sender = excluded.sender,
                     snippet = excluded.snippet,
                     preview = excluded.preview,
                     gmail_url = excluded.gmail_url,
                     has_attachments = excluded.has_attachments,
                     has_images = excluded.has_images,
                     has_links = excluded.has_links,
                     updated_at = excluded.updated_at
                 WHERE messages.thread_id IS NOT excluded.thread_id
                    OR messages.subject IS NOT excluded.subject
                    OR messages.sender IS NOT excluded.sender
                    OR messages.snippet IS NOT excluded.snippet
                    OR messages.preview IS NOT excluded.preview
                    OR messages.gmail_url IS NOT excluded.gmail_url
                    OR messages.has_attachments IS NOT excluded.has_attachments
                    OR messages.has_images IS NOT excluded.has_images
                    OR messages.has_links IS NOT excluded.has_links",
                params![
                    msg.user_id,
                    msg.message_id,
                    msg.thread_id,
                    msg.subject,
                    msg.sender,
                    msg.snippet,
                    msg.preview,
                    msg.status.to_string(),
                    msg.has_attachments,
                    msg.has_images,
                    msg.has_links,
                    msg.gmail_url,
                    msg.crm_record_url,
                    msg.error,
                    msg.received_at,
                    msg.created_at,
                    msg.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Apply an enrichment outcome to one message's lifecycle fields.
///
/// Enforces the status transition rules in one transaction: invalid
/// transitions return [`BridgeError::InvalidTransition`], a missing message
/// returns `Ok(false)`. A successful transition to `processed` clears the
/// diagnostic; `crm_record_url` is only overwritten when a new link is
/// provided.
pub async fn update_status(
    db: &Database,
    user_id: &str,
    message_id: &str,
    status: MessageStatus,
    crm_record_url: Option<&str>,
    error: Option<&str>,
) -> Result<bool, BridgeError> {
    let user_id = user_id.to_string();
    let message_id = message_id.to_string();
    let crm_record_url = crm_record_url.map(str::to_string);
    let error = error.map(str::to_string);
    let now = rfc3339_millis(chrono::Utc::now());

    let outcome = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let current = {
                let result = tx.query_row(
                    "SELECT status FROM messages WHERE user_id = ?1 AND message_id = ?2",
                    params![user_id, message_id],
                    |row| row.get::<_, String>(0),
                );
                match result {
                    Ok(s) => s,
                    Err(rusqlite::Error::QueryReturnedNoRows) => {
                        tx.commit()?;
                        return Ok(None);
                    }
                    Err(e) => return Err(e.into()),
                }
            };
            let current: MessageStatus = current.parse().map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?;

            if !current.can_transition_to(status) {
                tx.commit()?;
                return Ok(Some(Err((current, status))));
            }

            tx.execute(
                "UPDATE messages
                 SET status = ?1,
                     crm_record_url = COALESCE(?2, crm_record_url),
                     error = ?3,
                     updated_at = ?4
                 WHERE user_id = ?5 AND message_id = ?6",
                params![status.to_string(), crm_record_url, error, now, user_id, message_id],
            )?;
            tx.commit()?;
            Ok(Some(Ok(())))
        })
        .await
        .map_err(crate::database::map_tr_err)?;

    match outcome {
        None => Ok(false),
        Some(Ok(())) => Ok(true),
        Some(Err((from, to))) => Err(BridgeError::InvalidTransition { from, to }),
    }
}

/// Fetch one message by its dedup key.
pub async fn get_message(
    db: &Database,
    user_id: &str,
    message_id: &str,
) -> Result<Option<InboxMessage>, BridgeError> {
    let user_id = user_id.to_string();
    let message_id = message_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE user_id = ?1 AND message_id = ?2"
            ))?;
            let result = stmt.query_row(params![user_id, message_id], row_to_message);
            match result {
                Ok(msg) => Ok(Some(msg)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Query service read: most recently received first, optionally filtered by
/// exact status and by a case-insensitive substring over subject, sender,
/// preview, and snippet. Blank search terms are treated as absent.
pub async fn list_messages(
    db: &Database,
    user_id: &str,
    status: Option<MessageStatus>,
    search: Option<&str>,
    limit: usize,
) -> Result<Vec<InboxMessage>, BridgeError> {
    let user_id = user_id.to_string();
    let status = status.map(|s| s.to_string());
    let term = search
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase);
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE user_id = ?1
                   AND (?2 IS NULL OR status = ?2)
                   AND (?3 IS NULL
                        OR instr(lower(subject), ?3) > 0
                        OR instr(lower(coalesce(sender, '')), ?3) > 0
                        OR instr(lower(coalesce(preview, '')), ?3) > 0
                        OR instr(lower(coalesce(snippet, '')), ?3) > 0)
                 ORDER BY received_at DESC, id DESC
                 LIMIT ?4"
            ))?;
            let rows = stmt.query_map(
                params![user_id, status, term, limit as i64],
                row_to_message,
            )?;
            let mut messages = Vec::new();
            for row in rows {
                messages.push(row?);
            }
            Ok(messages)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Aggregate summary for one user, computed from the stored rows at read
/// time. `last_checked_at` comes off the Gmail connection row.
pub async fn summary(db: &Database, user_id: &str) -> Result<InboxSummary, BridgeError> {
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut counts = StatusCounts::default();
            let mut total = 0i64;
            {
                let mut stmt = conn.prepare(
                    "SELECT status, COUNT(*) FROM messages
                     WHERE user_id = ?1 GROUP BY status",
                )?;
                let rows = stmt.query_map(params![user_id], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
                })?;
                for row in rows {
                    let (status, count) = row?;
                    total += count;
                    match status.as_str() {
                        "new" => counts.new = count,
                        "processed" => counts.processed = count,
                        "error" => counts.error = count,
                        _ => {}
                    }
                }
            }

            let last_checked_at = {
                let result = conn.query_row(
                    "SELECT last_checked_at FROM connections
                     WHERE user_id = ?1 AND provider = 'gmail'",
                    params![user_id],
                    |row| row.get::<_, Option<String>>(0),
                );
                match result {
                    Ok(at) => at,
                    Err(rusqlite::Error::QueryReturnedNoRows) => None,
                    Err(e) => return Err(e.into()),
                }
            };

            Ok(InboxSummary {
                last_checked_at,
                counts,
                total,
            })
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Evict the oldest messages beyond the per-user retention cap.
///
/// The message store is a recency-bounded cache, not an archive; this runs
/// once at the end of every sync pass. Returns the number of evicted rows.
pub async fn evict_overflow(
    db: &Database,
    user_id: &str,
    cap: usize,
) -> Result<usize, BridgeError> {
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            let evicted = conn.execute(
                "DELETE FROM messages
                 WHERE user_id = ?1
                   AND id NOT IN (SELECT id FROM messages WHERE user_id = ?1
                                  ORDER BY received_at DESC, id DESC LIMIT ?2)",
                params![user_id, cap as i64],
            )?;
            Ok(evicted)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
