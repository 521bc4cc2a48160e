// SPDX-FileCopyrightText: 2026 Mailbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Incremental sync worker.
//!
//! One pass fetches mail received after the poll floor, classifies it, and
//! upserts it into the message cache. The floor is the later of the
//! connection baseline and the poll high-water mark, so a pass never
//! re-reads mail from before the connection and never skips mail delivered
//! while a pass was aborted.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use mailbridge_core::BridgeError;
use mailbridge_core::traits::MailboxProvider;
use mailbridge_core::types::{Connection, Provider, SyncReport, rfc3339_millis};
use mailbridge_storage::Database;
use mailbridge_storage::queries::{connections, messages};

use crate::classifier;

/// Polls the mailbox and maintains the bounded message cache.
///
/// Passes are single-flight per user: a trigger that arrives while a pass
/// for the same user is in flight coalesces into a no-op report instead of
/// queueing.
pub struct SyncWorker {
    db: Arc<Database>,
    mailbox: Arc<dyn MailboxProvider>,
    fetch_timeout: Duration,
    retention_cap: usize,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl SyncWorker {
    pub fn new(
        db: Arc<Database>,
        mailbox: Arc<dyn MailboxProvider>,
        fetch_timeout: Duration,
        retention_cap: usize,
    ) -> Self {
        Self {
            db,
            mailbox,
            fetch_timeout,
            retention_cap,
            locks: DashMap::new(),
        }
    }

    /// Run one sync pass for the user.
    ///
    /// Returns the number of messages upserted. A concurrent pass for the
    /// same user coalesces this trigger into `processed = 0`. Any error
    /// aborts the pass before the high-water mark advances, so a retry
    /// re-covers the same window and the idempotent upsert absorbs the
    /// overlap.
    pub async fn run_sync(
        &self,
        user_id: &str,
        max_messages: usize,
    ) -> Result<SyncReport, BridgeError> {
        let lock = self
            .locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let Ok(_guard) = lock.try_lock() else {
            debug!(user_id, "sync already in flight, coalescing trigger");
            return Ok(SyncReport { processed: 0 });
        };

        let conn = connections::get_connection(&self.db, user_id, Provider::Gmail)
            .await?
            .ok_or(BridgeError::NotConnected {
                provider: Provider::Gmail,
            })?;
        let report = self.run_pass(&conn, user_id, max_messages).await;
        if let Err(e) = &report {
            warn!(user_id, error = %e, "sync pass aborted");
        }
        report
    }

    async fn run_pass(
        &self,
        conn: &Connection,
        user_id: &str,
        max_messages: usize,
    ) -> Result<SyncReport, BridgeError> {
        let baseline = conn
            .baseline_at
            .as_deref()
            .ok_or(BridgeError::BaselineMissing)?;

        // Timestamps are RFC 3339 millis, so the lexicographic max is the
        // chronological max.
        let floor_str = match conn.last_poll_at.as_deref() {
            Some(last_poll) if last_poll > baseline => last_poll,
            _ => baseline,
        };
        let floor = floor_str
            .parse::<chrono::DateTime<chrono::Utc>>()
            .map_err(|e| BridgeError::Internal(format!("corrupt poll floor {floor_str:?}: {e}")))?;

        debug!(user_id, floor = floor_str, max_messages, "starting sync pass");

        let batch = tokio::time::timeout(
            self.fetch_timeout,
            self.mailbox.fetch_since(user_id, floor, max_messages),
        )
        .await
        .map_err(|_| BridgeError::Timeout {
            duration: self.fetch_timeout,
        })??;

        let mut processed = 0usize;
        let mut high_water: Option<String> = None;
        for raw in &batch {
            let row = classifier::classify(user_id, raw);
            let received_at = row.received_at.clone();
            messages::upsert_message(&self.db, &row).await?;
            processed += 1;
            high_water = Some(received_at);
        }

        if let Some(at) = high_water.as_deref() {
            connections::advance_last_poll(&self.db, user_id, at).await?;
        }
        let evicted = messages::evict_overflow(&self.db, user_id, self.retention_cap).await?;
        connections::touch_last_checked(&self.db, user_id, &rfc3339_millis(chrono::Utc::now()))
            .await?;
        if !conn.baseline_ready {
            connections::mark_baseline_ready(&self.db, user_id).await?;
        }

        info!(user_id, processed, evicted, "sync pass complete");
        Ok(SyncReport { processed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mailbridge_core::types::MessageStatus;
    use mailbridge_test_utils::{MockMailbox, raw_message, temp_db};

    async fn connected_worker(
        baseline_at: &str,
        cap: usize,
    ) -> (Arc<SyncWorker>, Arc<MockMailbox>, Arc<Database>, tempfile::TempDir) {
        let (db, dir) = temp_db().await;
        let db = Arc::new(db);
        connections::upsert_connection(&db, "u1", Provider::Gmail, Some("u1@example.com"))
            .await
            .unwrap();
        connections::set_baseline(&db, "u1", baseline_at).await.unwrap();
        let mailbox = Arc::new(MockMailbox::new());
        let worker = Arc::new(SyncWorker::new(
            db.clone(),
            mailbox.clone(),
            Duration::from_secs(5),
            cap,
        ));
        (worker, mailbox, db, dir)
    }

    #[tokio::test]
    async fn baseline_excludes_older_mail() {
        let (worker, mailbox, db, _dir) =
            connected_worker("2026-02-01T12:00:00.000Z", 100).await;

        mailbox.deliver(raw_message("old", "2026-02-01T11:59:59Z")).await;
        mailbox.deliver(raw_message("fresh", "2026-02-01T12:00:01Z")).await;

        let report = worker.run_sync("u1", 25).await.unwrap();
        assert_eq!(report.processed, 1);

        assert!(messages::get_message(&db, "u1", "old").await.unwrap().is_none());
        let fresh = messages::get_message(&db, "u1", "fresh")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fresh.status, MessageStatus::New);

        let conn = connections::get_connection(&db, "u1", Provider::Gmail)
            .await
            .unwrap()
            .unwrap();
        assert!(conn.baseline_ready);
        assert_eq!(conn.last_poll_at.as_deref(), Some("2026-02-01T12:00:01.000Z"));
        assert!(conn.last_checked_at.is_some());
    }

    #[tokio::test]
    async fn aborted_pass_leaves_marks_untouched_and_retry_fills_gap() {
        let (worker, mailbox, db, _dir) =
            connected_worker("2026-02-01T12:00:00.000Z", 100).await;

        mailbox.deliver(raw_message("m1", "2026-02-01T12:01:00Z")).await;
        mailbox.fail_next_fetch();

        let err = worker.run_sync("u1", 25).await.unwrap_err();
        assert!(matches!(err, BridgeError::Mailbox { .. }));

        let conn = connections::get_connection(&db, "u1", Provider::Gmail)
            .await
            .unwrap()
            .unwrap();
        assert!(conn.last_poll_at.is_none());
        assert!(!conn.baseline_ready);

        // Mail delivered between the failure and the retry is still in the
        // window, so nothing is skipped.
        mailbox.deliver(raw_message("m2", "2026-02-01T12:02:00Z")).await;
        let report = worker.run_sync("u1", 25).await.unwrap();
        assert_eq!(report.processed, 2);

        let conn = connections::get_connection(&db, "u1", Provider::Gmail)
            .await
            .unwrap()
            .unwrap();
        assert!(conn.baseline_ready);
        assert_eq!(conn.last_poll_at.as_deref(), Some("2026-02-01T12:02:00.000Z"));
    }

    #[tokio::test]
    async fn repeated_passes_do_not_duplicate() {
        let (worker, mailbox, db, _dir) =
            connected_worker("2026-02-01T12:00:00.000Z", 100).await;

        mailbox.deliver(raw_message("m1", "2026-02-01T12:01:00Z")).await;
        assert_eq!(worker.run_sync("u1", 25).await.unwrap().processed, 1);
        assert_eq!(worker.run_sync("u1", 25).await.unwrap().processed, 0);

        let all = messages::list_messages(&db, "u1", None, None, 50)
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn undecodable_message_lands_as_error_row() {
        let (worker, mailbox, db, _dir) =
            connected_worker("2026-02-01T12:00:00.000Z", 100).await;

        let mut broken = raw_message("broken", "2026-02-01T12:01:00Z");
        broken.decode_error = Some("no usable internalDate".to_string());
        mailbox.deliver(broken).await;
        mailbox.deliver(raw_message("fine", "2026-02-01T12:02:00Z")).await;

        // The broken message does not abort the pass; it becomes a visible
        // error row alongside the healthy one.
        let report = worker.run_sync("u1", 25).await.unwrap();
        assert_eq!(report.processed, 2);

        let row = messages::get_message(&db, "u1", "broken")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.status, MessageStatus::Error);
        assert_eq!(row.error.as_deref(), Some("no usable internalDate"));

        let fine = messages::get_message(&db, "u1", "fine")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fine.status, MessageStatus::New);
    }

    #[tokio::test]
    async fn fetch_timeout_aborts_the_pass() {
        let (db, _dir) = temp_db().await;
        let db = Arc::new(db);
        connections::upsert_connection(&db, "u1", Provider::Gmail, None)
            .await
            .unwrap();
        connections::set_baseline(&db, "u1", "2026-02-01T12:00:00.000Z")
            .await
            .unwrap();

        let mailbox = Arc::new(MockMailbox::new());
        mailbox.deliver(raw_message("m1", "2026-02-01T12:01:00Z")).await;
        mailbox.set_delay(Duration::from_millis(200)).await;

        let worker = SyncWorker::new(
            db.clone(),
            mailbox.clone(),
            Duration::from_millis(20),
            100,
        );
        let err = worker.run_sync("u1", 25).await.unwrap_err();
        assert!(matches!(err, BridgeError::Timeout { .. }));

        let conn = connections::get_connection(&db, "u1", Provider::Gmail)
            .await
            .unwrap()
            .unwrap();
        assert!(conn.last_poll_at.is_none());
    }

    #[tokio::test]
    async fn cache_is_bounded_across_passes() {
        let (worker, mailbox, db, _dir) = connected_worker("2026-02-01T12:00:00.000Z", 3).await;

        mailbox.deliver(raw_message("m1", "2026-02-01T12:01:00Z")).await;
        mailbox.deliver(raw_message("m2", "2026-02-01T12:02:00Z")).await;
        worker.run_sync("u1", 25).await.unwrap();

        mailbox.deliver(raw_message("m3", "2026-02-01T12:03:00Z")).await;
        mailbox.deliver(raw_message("m4", "2026-02-01T12:04:00Z")).await;
        worker.run_sync("u1", 25).await.unwrap();

        let remaining = messages::list_messages(&db, "u1", None, None, 50)
            .await
            .unwrap();
        let ids: Vec<_> = remaining.iter().map(|m| m.message_id.as_str()).collect();
        assert_eq!(ids, vec!["m4", "m3", "m2"]);
    }

    #[tokio::test]
    async fn concurrent_trigger_coalesces() {
        let (worker, mailbox, _db, _dir) =
            connected_worker("2026-02-01T12:00:00.000Z", 100).await;

        mailbox.deliver(raw_message("m1", "2026-02-01T12:01:00Z")).await;
        mailbox.set_delay(Duration::from_millis(100)).await;

        let first = tokio::spawn({
            let worker = worker.clone();
            async move { worker.run_sync("u1", 25).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let coalesced = worker.run_sync("u1", 25).await.unwrap();
        assert_eq!(coalesced.processed, 0);

        let report = first.await.unwrap().unwrap();
        assert_eq!(report.processed, 1);
        // Only the first trigger reached the mailbox.
        assert_eq!(mailbox.fetch_count(), 1);
    }

    #[tokio::test]
    async fn sync_requires_connection_and_baseline() {
        let (db, _dir) = temp_db().await;
        let db = Arc::new(db);
        let worker = SyncWorker::new(
            db.clone(),
            Arc::new(MockMailbox::new()),
            Duration::from_secs(5),
            100,
        );

        let err = worker.run_sync("u1", 25).await.unwrap_err();
        assert!(matches!(
            err,
            BridgeError::NotConnected {
                provider: Provider::Gmail
            }
        ));

        connections::upsert_connection(&db, "u1", Provider::Gmail, None)
            .await
            .unwrap();
        let err = worker.run_sync("u1", 25).await.unwrap_err();
        assert!(matches!(err, BridgeError::BaselineMissing));
    }
}
