// SPDX-FileCopyrightText: 2026 Mailbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Status classifier: pure functions that turn a raw fetched message into a
//! storable inbox row.
//!
//! Classification derives content flags and deep links only; every freshly
//! ingested message starts in status `new`, and the lifecycle fields move
//! through the enrichment write-back, never through re-classification.

use chrono::Utc;
use mailbridge_core::types::{
    EnrichmentOutcome, InboxMessage, MessageFlags, MessageStatus, RawMessage, rfc3339_millis,
};

/// Preview text is capped so the message cache stays bounded in bytes, not
/// just in rows.
const PREVIEW_MAX_CHARS: usize = 500;

/// Build the storable row for a freshly fetched message.
///
/// A message the provider could not decode is classified straight into
/// `error` with the decode diagnostic attached.
pub fn classify(user_id: &str, raw: &RawMessage) -> InboxMessage {
    let flags = derive_flags(raw);
    let now = rfc3339_millis(Utc::now());
    let (status, error) = match &raw.decode_error {
        Some(detail) => (MessageStatus::Error, Some(detail.clone())),
        None => (MessageStatus::New, None),
    };
    InboxMessage {
        user_id: user_id.to_string(),
        message_id: raw.message_id.clone(),
        thread_id: raw.thread_id.clone(),
        subject: raw
            .subject
            .clone()
            .unwrap_or_else(|| "(no subject)".to_string()),
        sender: raw.sender.clone(),
        snippet: raw.snippet.clone(),
        preview: preview_of(&raw.body_text),
        status,
        has_attachments: flags.has_attachments,
        has_images: flags.has_images,
        has_links: flags.has_links,
        gmail_url: gmail_deep_link(raw.thread_id.as_deref(), &raw.message_id),
        crm_record_url: None,
        error,
        received_at: rfc3339_millis(raw.received_at),
        created_at: now.clone(),
        updated_at: now,
    }
}

/// Map an enrichment outcome onto the lifecycle fields of a row.
///
/// Returns `(status, crm_record_url, error)`; whether the transition is
/// legal against the stored row is decided at the storage layer.
pub fn apply_enrichment(
    outcome: &EnrichmentOutcome,
) -> (MessageStatus, Option<&str>, Option<&str>) {
    match outcome {
        EnrichmentOutcome::Success { crm_record_url } => {
            (MessageStatus::Processed, crm_record_url.as_deref(), None)
        }
        EnrichmentOutcome::Failure { detail } => {
            (MessageStatus::Error, None, Some(detail.as_str()))
        }
    }
}

/// Derive the content flags from the raw message parts and body.
pub fn derive_flags(raw: &RawMessage) -> MessageFlags {
    MessageFlags {
        has_attachments: raw.attachments.iter().any(|a| !a.filename.is_empty()),
        has_images: raw
            .attachments
            .iter()
            .any(|a| a.mime_type.starts_with("image/")),
        has_links: contains_link(&raw.body_text),
    }
}

/// Whether the body text contains an `http://` or `https://` URL.
fn contains_link(body: &str) -> bool {
    let lower = body.to_lowercase();
    lower.contains("http://") || lower.contains("https://")
}

/// Truncate the body text into a bounded, trimmed preview.
fn preview_of(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    let preview: String = trimmed.chars().take(PREVIEW_MAX_CHARS).collect();
    Some(preview)
}

/// Deep link into the Gmail web UI, preferring the thread view.
pub fn gmail_deep_link(thread_id: Option<&str>, message_id: &str) -> String {
    let target = thread_id.unwrap_or(message_id);
    format!("https://mail.google.com/mail/u/0/#inbox/{target}")
}

/// Deep link to a HubSpot contact record.
pub fn hubspot_record_url(portal_id: &str, contact_id: &str) -> String {
    format!("https://app.hubspot.com/contacts/{portal_id}/record/0-1/{contact_id}")
}
