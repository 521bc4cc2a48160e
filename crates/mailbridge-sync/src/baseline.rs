// SPDX-FileCopyrightText: 2026 Mailbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection completion hooks.
//!
//! Called once the external OAuth exchange has produced a working account.
//! The Gmail hook fixes the ingestion baseline before any mail is fetched;
//! the HubSpot hook triggers the one automatic first sync once both sides
//! are connected.

use chrono::Utc;
use tracing::{info, warn};

use mailbridge_core::BridgeError;
use mailbridge_core::types::{Connection, Provider, rfc3339_millis};
use mailbridge_storage::Database;
use mailbridge_storage::queries::connections;

use crate::worker::SyncWorker;

/// Record a completed Gmail connection and run the first ingestion pass.
///
/// The baseline is written before any fetch, so mail received earlier is
/// never ingested even if the first pass is slow or fails. A reconnect
/// without a prior disconnect keeps the original baseline.
///
/// A failed first pass is logged and left for the next sync trigger to
/// retry; `baseline_ready` stays false until a pass completes.
pub async fn establish_gmail_connection(
    db: &Database,
    worker: &SyncWorker,
    user_id: &str,
    account_email: Option<&str>,
    max_messages: usize,
) -> Result<Connection, BridgeError> {
    connections::upsert_connection(db, user_id, Provider::Gmail, account_email).await?;
    let fixed = connections::set_baseline(db, user_id, &rfc3339_millis(Utc::now())).await?;
    if fixed {
        info!(user_id, "gmail baseline established");
    }

    if let Err(e) = worker.run_sync(user_id, max_messages).await {
        warn!(user_id, error = %e, "initial ingestion pass failed, will retry on next sync");
    }

    connections::get_connection(db, user_id, Provider::Gmail)
        .await?
        .ok_or_else(|| BridgeError::Internal("connection vanished after upsert".to_string()))
}

/// Record a completed HubSpot connection.
///
/// If Gmail is already connected this also triggers the automatic first
/// sync, so a user who finishes the second OAuth flow sees their inbox
/// populate without a manual trigger.
pub async fn complete_hubspot_connection(
    db: &Database,
    worker: &SyncWorker,
    user_id: &str,
    account_email: Option<&str>,
    max_messages: usize,
) -> Result<Connection, BridgeError> {
    connections::upsert_connection(db, user_id, Provider::Hubspot, account_email).await?;

    let gmail = connections::get_connection(db, user_id, Provider::Gmail).await?;
    if gmail.is_some_and(|c| c.baseline_at.is_some()) {
        if let Err(e) = worker.run_sync(user_id, max_messages).await {
            warn!(user_id, error = %e, "post-connect sync failed, will retry on next sync");
        }
    }

    connections::get_connection(db, user_id, Provider::Hubspot)
        .await?
        .ok_or_else(|| BridgeError::Internal("connection vanished after upsert".to_string()))
}
