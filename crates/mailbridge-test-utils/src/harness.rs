// SPDX-FileCopyrightText: 2026 Mailbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Temp-database harness and fixture builders.

use chrono::{DateTime, Utc};
use tempfile::TempDir;

use mailbridge_core::types::RawMessage;
use mailbridge_storage::Database;

/// Open a migrated SQLite database in a fresh temp directory.
///
/// The returned `TempDir` must stay alive for as long as the database is
/// used; dropping it removes the files.
pub async fn temp_db() -> (Database, TempDir) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let db_path = dir.path().join("test.db");
    let db = Database::open(db_path.to_str().expect("utf-8 temp path"))
        .await
        .expect("open test database");
    (db, dir)
}

/// Build a plain raw message received at the given RFC 3339 instant.
pub fn raw_message(message_id: &str, received_at: &str) -> RawMessage {
    RawMessage {
        message_id: message_id.to_string(),
        thread_id: Some(format!("thread-{message_id}")),
        subject: Some(format!("Subject {message_id}")),
        sender: Some("Alice <alice@example.com>".to_string()),
        snippet: Some("a short snippet".to_string()),
        body_text: "Hello from the test mailbox.".to_string(),
        attachments: Vec::new(),
        received_at: received_at
            .parse::<DateTime<Utc>>()
            .expect("valid RFC 3339 fixture timestamp"),
        decode_error: None,
    }
}
