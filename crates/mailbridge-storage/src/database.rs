// SPDX-FileCopyrightText: 2026 Mailbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background
//! thread. Do NOT create additional Connection instances for writes.

use mailbridge_core::BridgeError;
use tokio_rusqlite::Connection;
use tracing::debug;

use crate::migrations;

/// Handle to the Mailbridge SQLite database.
///
/// Wraps a single `tokio_rusqlite::Connection`; all query modules accept
/// `&Database` and go through [`Database::connection`], which serializes
/// every closure on one background thread.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the database at `path`, apply PRAGMAs, and run all
    /// pending migrations.
    pub async fn open(path: &str) -> Result<Self, BridgeError> {
        if let Some(parent) = std::path::Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| BridgeError::Storage {
                source: Box::new(e),
            })?;
        }

        let conn = Connection::open(path)
            .await
            .map_err(|e| BridgeError::Storage {
                source: Box::new(e),
            })?;

        conn.call(|conn| {
            conn.pragma_update(None, "journal_mode", "WAL")?;
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            conn.pragma_update(None, "foreign_keys", "ON")?;
            conn.pragma_update(None, "busy_timeout", 5000)?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        conn.call(migrations::run_migrations)
            .await
            .map_err(|e| match e {
                tokio_rusqlite::Error::Error(e) => e,
                other => BridgeError::Storage {
                    source: Box::new(other),
                },
            })?;

        debug!(path, "database opened");
        Ok(Self { conn })
    }

    /// The underlying single-writer connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Checkpoint the WAL and close the connection.
    pub async fn close(self) -> Result<(), BridgeError> {
        self.conn
            .call(|conn| {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        self.conn
            .close()
            .await
            .map_err(|e| BridgeError::Storage {
                source: Box::new(e),
            })?;
        Ok(())
    }
}

/// Map a tokio-rusqlite error into the workspace error type.
pub fn map_tr_err(e: tokio_rusqlite::Error) -> BridgeError {
    BridgeError::Storage {
        source: Box::new(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn open_creates_file_and_schema() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("nested/dir/open.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        assert!(db_path.exists());

        // Migrations ran: both tables exist.
        let count: i64 = db
            .connection()
            .call(|conn| -> Result<i64, rusqlite::Error> {
                let n = conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master
                     WHERE type = 'table' AND name IN ('connections', 'messages')",
                    [],
                    |row| row.get(0),
                )?;
                Ok(n)
            })
            .await
            .unwrap();
        assert_eq!(count, 2);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn reopen_is_idempotent() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("reopen.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        db.close().await.unwrap();

        // Second open must not re-apply migrations destructively.
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        db.close().await.unwrap();
    }
}
