// SPDX-FileCopyrightText: 2026 Mailbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across the Mailbridge workspace.
//!
//! Persisted timestamps are UTC RFC 3339 with millisecond precision and a
//! trailing `Z`, so lexicographic order equals chronological order.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Format an instant the way every store column expects it.
pub fn rfc3339_millis(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Integration provider a connection record belongs to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Gmail,
    Hubspot,
}

/// Lifecycle status of an ingested message.
///
/// Closed enumeration with defined transitions: `new -> processed`,
/// `new -> error`, and `error -> processed` (re-enrichment retry).
/// `processed` is terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    New,
    Processed,
    Error,
}

impl MessageStatus {
    /// Whether the lifecycle permits moving from `self` to `next`.
    ///
    /// `error -> error` is allowed so a failed re-enrichment can refresh its
    /// diagnostic text. Nothing transitions out of `processed`.
    pub fn can_transition_to(self, next: MessageStatus) -> bool {
        matches!(
            (self, next),
            (MessageStatus::New, MessageStatus::Processed)
                | (MessageStatus::New, MessageStatus::Error)
                | (MessageStatus::Error, MessageStatus::Processed)
                | (MessageStatus::Error, MessageStatus::Error)
        )
    }
}

/// A per-user, per-provider connection record.
///
/// The Gmail row additionally carries the ingestion baseline and the poll
/// high-water mark; both stay `None` for HubSpot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    pub user_id: String,
    pub provider: Provider,
    pub account_email: Option<String>,
    /// Instant the mailbox connection was established. Immutable once set;
    /// mail received before it is never ingested.
    pub baseline_at: Option<String>,
    /// False until the first ingestion pass after baselining completes.
    pub baseline_ready: bool,
    /// `received_at` of the most recently fully-processed message.
    pub last_poll_at: Option<String>,
    /// Wall-clock completion time of the last sync pass.
    pub last_checked_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Derived content flags for an ingested message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageFlags {
    pub has_attachments: bool,
    pub has_images: bool,
    pub has_links: bool,
}

/// A stored inbox message, upserted by `(user_id, message_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboxMessage {
    pub user_id: String,
    /// Provider-assigned id; unique per user.
    pub message_id: String,
    pub thread_id: Option<String>,
    pub subject: String,
    pub sender: Option<String>,
    pub snippet: Option<String>,
    pub preview: Option<String>,
    pub status: MessageStatus,
    pub has_attachments: bool,
    pub has_images: bool,
    pub has_links: bool,
    pub gmail_url: String,
    pub crm_record_url: Option<String>,
    pub error: Option<String>,
    pub received_at: String,
    pub created_at: String,
    pub updated_at: String,
}

/// An attachment part reported by the mailbox API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentPart {
    pub filename: String,
    pub mime_type: String,
}

/// A raw message as fetched from the external mailbox, before classification.
#[derive(Debug, Clone)]
pub struct RawMessage {
    pub message_id: String,
    pub thread_id: Option<String>,
    pub subject: Option<String>,
    pub sender: Option<String>,
    pub snippet: Option<String>,
    pub body_text: String,
    pub attachments: Vec<AttachmentPart>,
    pub received_at: DateTime<Utc>,
    /// Diagnostic text when the provider fetched the message but could not
    /// decode it. Such a message still enters the pipeline so it surfaces
    /// as an `error` row instead of vanishing.
    pub decode_error: Option<String>,
}

/// Outcome reported by the external enrichment / CRM write-back step.
#[derive(Debug, Clone)]
pub enum EnrichmentOutcome {
    /// CRM write-back succeeded; link to the created record, if one exists.
    Success { crm_record_url: Option<String> },
    /// Enrichment failed; diagnostic text recorded on the message.
    Failure { detail: String },
}

/// Per-status message counts for one user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub new: i64,
    pub processed: i64,
    pub error: i64,
}

/// Aggregate inbox summary, computed from the message store at read time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboxSummary {
    pub last_checked_at: Option<String>,
    pub counts: StatusCounts,
    pub total: i64,
}

/// Result of one sync pass.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SyncReport {
    /// Messages upserted in this pass. Zero when a concurrent pass held the
    /// per-user lock and this trigger coalesced into a no-op.
    pub processed: usize,
}
