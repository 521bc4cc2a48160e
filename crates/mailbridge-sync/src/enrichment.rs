// SPDX-FileCopyrightText: 2026 Mailbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Enrichment write-back.
//!
//! The external AI / CRM step reports its outcome for one message here;
//! this is the only path that moves a message out of status `new`.

use tracing::info;

use mailbridge_core::BridgeError;
use mailbridge_core::types::EnrichmentOutcome;
use mailbridge_storage::Database;
use mailbridge_storage::queries::messages;

use crate::classifier;

/// Apply an enrichment outcome to a stored message.
///
/// Success transitions the message to `processed` and records the CRM
/// record link; failure transitions it to `error` with the diagnostic
/// text. Returns `false` if the message does not exist (evicted or never
/// ingested). Transitions out of `processed` are rejected with
/// [`BridgeError::InvalidTransition`].
pub async fn record_enrichment(
    db: &Database,
    user_id: &str,
    message_id: &str,
    outcome: EnrichmentOutcome,
) -> Result<bool, BridgeError> {
    let (status, crm_record_url, error) = classifier::apply_enrichment(&outcome);
    let applied =
        messages::update_status(db, user_id, message_id, status, crm_record_url, error).await?;
    if applied {
        info!(user_id, message_id, "enrichment outcome recorded");
    }
    Ok(applied)
}
