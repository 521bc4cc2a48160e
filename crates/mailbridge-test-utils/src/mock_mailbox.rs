// SPDX-FileCopyrightText: 2026 Mailbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted mailbox adapter for deterministic testing.
//!
//! `MockMailbox` implements `MailboxProvider` over an in-memory message list,
//! enabling sync pipeline tests without a real Gmail account.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use mailbridge_core::BridgeError;
use mailbridge_core::traits::MailboxProvider;
use mailbridge_core::types::RawMessage;

/// A mock mailbox backed by a scripted message list.
///
/// `fetch_since` honors the provider contract: only messages with
/// `received_at` strictly greater than the floor, oldest first, truncated to
/// `max_messages`. Tests can append messages between passes, inject a
/// one-shot failure, or add a delay to hold a fetch open.
pub struct MockMailbox {
    messages: Arc<Mutex<Vec<RawMessage>>>,
    fail_next: AtomicBool,
    delay: Mutex<Option<Duration>>,
    fetch_count: AtomicUsize,
}

impl MockMailbox {
    /// Create an empty mock mailbox.
    pub fn new() -> Self {
        Self {
            messages: Arc::new(Mutex::new(Vec::new())),
            fail_next: AtomicBool::new(false),
            delay: Mutex::new(None),
            fetch_count: AtomicUsize::new(0),
        }
    }

    /// Create a mock mailbox pre-loaded with the given messages.
    pub fn with_messages(messages: Vec<RawMessage>) -> Self {
        Self {
            messages: Arc::new(Mutex::new(messages)),
            fail_next: AtomicBool::new(false),
            delay: Mutex::new(None),
            fetch_count: AtomicUsize::new(0),
        }
    }

    /// Append a message to the mailbox.
    pub async fn deliver(&self, message: RawMessage) {
        self.messages.lock().await.push(message);
    }

    /// Make the next `fetch_since` call fail with a mailbox error.
    pub fn fail_next_fetch(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Hold every fetch open for `duration` before returning.
    pub async fn set_delay(&self, duration: Duration) {
        *self.delay.lock().await = Some(duration);
    }

    /// Number of `fetch_since` calls that reached the mailbox, including
    /// injected failures.
    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }
}

impl Default for MockMailbox {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MailboxProvider for MockMailbox {
    async fn fetch_since(
        &self,
        _user_id: &str,
        floor: DateTime<Utc>,
        max_messages: usize,
    ) -> Result<Vec<RawMessage>, BridgeError> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);

        if let Some(duration) = *self.delay.lock().await {
            tokio::time::sleep(duration).await;
        }

        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(BridgeError::Mailbox {
                message: "injected fetch failure".to_string(),
                source: None,
            });
        }

        let mut batch: Vec<RawMessage> = self
            .messages
            .lock()
            .await
            .iter()
            .filter(|m| m.received_at > floor)
            .cloned()
            .collect();
        batch.sort_by_key(|m| m.received_at);
        batch.truncate(max_messages);
        Ok(batch)
    }
}
