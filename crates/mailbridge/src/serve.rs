// SPDX-FileCopyrightText: 2026 Mailbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `mailbridge serve` command implementation.
//!
//! Wires the configured pieces together: SQLite storage, the Gmail mailbox
//! client, the sync worker, and the HTTP gateway.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use mailbridge_config::BridgeConfig;
use mailbridge_core::BridgeError;
use mailbridge_core::traits::{MailboxProvider, TokenSource};
use mailbridge_gateway::{GatewayState, start_server};
use mailbridge_storage::Database;
use mailbridge_sync::{GmailClient, SyncWorker};

/// Token source backed by the `MAILBRIDGE_GMAIL_TOKEN` environment variable.
///
/// Stands in for the external OAuth collaborator: deployments that run the
/// token exchange elsewhere inject the resulting access token here. Sync
/// fails with a not-connected style error when the variable is absent.
struct EnvTokenSource;

#[async_trait]
impl TokenSource for EnvTokenSource {
    async fn access_token(&self, _user_id: &str) -> Result<String, BridgeError> {
        std::env::var("MAILBRIDGE_GMAIL_TOKEN").map_err(|_| BridgeError::Mailbox {
            message: "no Gmail access token available (set MAILBRIDGE_GMAIL_TOKEN)".to_string(),
            source: None,
        })
    }
}

/// Runs the `mailbridge serve` command.
pub async fn run_serve(config: BridgeConfig) -> Result<(), BridgeError> {
    init_tracing(&config.server.log_level);

    info!("starting mailbridge serve");

    let db = Arc::new(Database::open(&config.storage.database_path).await?);
    info!(path = %config.storage.database_path, "storage ready");

    let mailbox: Arc<dyn MailboxProvider> = Arc::new(GmailClient::new(
        config.gmail.api_base.clone(),
        Arc::new(EnvTokenSource),
    )?);
    let worker = Arc::new(SyncWorker::new(
        db.clone(),
        mailbox,
        Duration::from_secs(config.sync.fetch_timeout_secs),
        config.sync.retention_cap,
    ));

    let state = GatewayState {
        db,
        worker,
        config: Arc::new(config),
    };
    start_server(state).await
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("mailbridge={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
