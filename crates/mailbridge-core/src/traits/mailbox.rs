// SPDX-FileCopyrightText: 2026 Mailbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait seam for the external mailbox API.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::BridgeError;
use crate::types::RawMessage;

/// Adapter for the external mailbox the sync worker polls.
///
/// Implementations must return messages with `received_at` strictly greater
/// than `floor`, ordered oldest first, truncated to the `max_messages`
/// OLDEST in the window. The oldest-first order lets the caller advance its
/// high-water mark monotonically even when the batch is truncated.
///
/// A message that was fetched but could not be decoded is returned with
/// [`RawMessage::decode_error`] set (and `received_at` pinned at `floor`)
/// instead of being dropped, so it surfaces downstream as an error row.
#[async_trait]
pub trait MailboxProvider: Send + Sync {
    /// Fetch up to `max_messages` messages received after `floor`.
    async fn fetch_since(
        &self,
        user_id: &str,
        floor: DateTime<Utc>,
        max_messages: usize,
    ) -> Result<Vec<RawMessage>, BridgeError>;
}

/// Source of provider access tokens.
///
/// OAuth exchange and refresh live behind this seam; the sync pipeline only
/// ever asks for a usable bearer token.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Return a currently-valid access token for the user, refreshing if needed.
    async fn access_token(&self, user_id: &str) -> Result<String, BridgeError>;
}
