// SPDX-FileCopyrightText: 2026 Mailbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway REST API.
//!
//! Connection status and OAuth kickoff, sync triggering, and the inbox
//! query surface. Handlers validate inputs, delegate to the sync and
//! storage crates, and map [`BridgeError`] onto HTTP statuses.

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use mailbridge_core::BridgeError;
use mailbridge_core::types::{InboxMessage, MessageStatus, Provider, StatusCounts};
use mailbridge_storage::queries::{connections, messages};
use mailbridge_sync::record_enrichment;

use crate::server::GatewayState;

const DEFAULT_LIST_LIMIT: usize = 50;
const MAX_LIST_LIMIT: usize = 200;

/// Query string carrying only the acting user.
#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user_id: String,
}

/// Request body for the connect and disconnect endpoints.
#[derive(Debug, Deserialize)]
pub struct UserRequest {
    pub user_id: String,
}

/// Request body for POST /api/gmail/sync/start.
#[derive(Debug, Deserialize)]
pub struct SyncStartRequest {
    pub user_id: String,
    /// Per-pass fetch cap; defaults to `sync.max_messages` from config.
    #[serde(default)]
    pub max_messages: Option<usize>,
}

/// Request body for POST /api/inbox/enrichment.
#[derive(Debug, Deserialize)]
pub struct EnrichmentRequest {
    pub user_id: String,
    pub message_id: String,
    /// `true` for a successful CRM write-back.
    pub success: bool,
    #[serde(default)]
    pub crm_record_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Response body for GET /api/gmail/status.
#[derive(Debug, Serialize)]
pub struct GmailStatusResponse {
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline_ready: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_checked_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counts: Option<StatusCounts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<i64>,
}

/// Response body for GET /api/hubspot/status.
#[derive(Debug, Serialize)]
pub struct HubspotStatusResponse {
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Response body for the connect endpoints.
#[derive(Debug, Serialize)]
pub struct ConnectResponse {
    /// OAuth authorize URL the frontend should redirect the user to.
    pub redirect_url: String,
}

/// Response body for GET /api/inbox/messages.
#[derive(Debug, Serialize)]
pub struct MessageListResponse {
    /// Echo of the applied status filter, `"all"` when none.
    pub status: String,
    pub count: usize,
    pub messages: Vec<InboxMessage>,
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// GET /api/gmail/status
pub async fn get_gmail_status(
    State(state): State<GatewayState>,
    Query(q): Query<UserQuery>,
) -> Response {
    let conn = match connections::get_connection(&state.db, &q.user_id, Provider::Gmail).await {
        Ok(conn) => conn,
        Err(e) => return error_response(e),
    };
    let Some(conn) = conn else {
        return Json(GmailStatusResponse {
            connected: false,
            email: None,
            baseline_at: None,
            baseline_ready: None,
            last_checked_at: None,
            counts: None,
            total: None,
        })
        .into_response();
    };

    let summary = match messages::summary(&state.db, &q.user_id).await {
        Ok(summary) => summary,
        Err(e) => return error_response(e),
    };
    Json(GmailStatusResponse {
        connected: true,
        email: conn.account_email,
        baseline_at: conn.baseline_at,
        baseline_ready: Some(conn.baseline_ready),
        last_checked_at: conn.last_checked_at,
        counts: Some(summary.counts),
        total: Some(summary.total),
    })
    .into_response()
}

/// POST /api/gmail/connect
///
/// Returns the Google OAuth authorize URL; the token exchange happens in
/// the external OAuth collaborator, which calls back into the baseline
/// establisher once an account is usable.
pub async fn post_gmail_connect(
    State(state): State<GatewayState>,
    Json(body): Json<UserRequest>,
) -> Response {
    let gmail = &state.config.gmail;
    let (Some(client_id), Some(redirect_uri)) =
        (gmail.client_id.as_deref(), gmail.redirect_uri.as_deref())
    else {
        return error_response(BridgeError::Config(
            "gmail.client_id and gmail.redirect_uri must be configured".to_string(),
        ));
    };

    let mut url = match reqwest::Url::parse(&gmail.auth_base) {
        Ok(url) => url,
        Err(e) => {
            return error_response(BridgeError::Config(format!(
                "invalid gmail.auth_base: {e}"
            )));
        }
    };
    url.query_pairs_mut()
        .append_pair("client_id", client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("response_type", "code")
        .append_pair("scope", &gmail.scopes)
        .append_pair("access_type", "offline")
        .append_pair("prompt", "consent")
        .append_pair("state", &body.user_id);

    Json(ConnectResponse {
        redirect_url: url.to_string(),
    })
    .into_response()
}

/// POST /api/gmail/disconnect
///
/// Removes the connection and every cached message for the user.
/// Idempotent: disconnecting an unconnected user succeeds.
pub async fn post_gmail_disconnect(
    State(state): State<GatewayState>,
    Json(body): Json<UserRequest>,
) -> Response {
    match connections::disconnect(&state.db, &body.user_id, Provider::Gmail).await {
        Ok(()) => Json(serde_json::json!({"disconnected": true})).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /api/gmail/sync/start
pub async fn post_sync_start(
    State(state): State<GatewayState>,
    Json(body): Json<SyncStartRequest>,
) -> Response {
    let max_messages = body
        .max_messages
        .unwrap_or(state.config.sync.max_messages);
    if max_messages == 0 || max_messages > mailbridge_config::validation::MAX_MESSAGES_CEILING {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: format!(
                    "max_messages must be between 1 and {}",
                    mailbridge_config::validation::MAX_MESSAGES_CEILING
                ),
            }),
        )
            .into_response();
    }

    match state.worker.run_sync(&body.user_id, max_messages).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /api/hubspot/status
pub async fn get_hubspot_status(
    State(state): State<GatewayState>,
    Query(q): Query<UserQuery>,
) -> Response {
    match connections::get_connection(&state.db, &q.user_id, Provider::Hubspot).await {
        Ok(conn) => Json(HubspotStatusResponse {
            connected: conn.is_some(),
            email: conn.and_then(|c| c.account_email),
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /api/hubspot/connect
pub async fn post_hubspot_connect(
    State(state): State<GatewayState>,
    Json(body): Json<UserRequest>,
) -> Response {
    let hubspot = &state.config.hubspot;
    let (Some(client_id), Some(redirect_uri)) =
        (hubspot.client_id.as_deref(), hubspot.redirect_uri.as_deref())
    else {
        return error_response(BridgeError::Config(
            "hubspot.client_id and hubspot.redirect_uri must be configured".to_string(),
        ));
    };

    let authorize = format!("{}/authorize", hubspot.auth_base.trim_end_matches('/'));
    let mut url = match reqwest::Url::parse(&authorize) {
        Ok(url) => url,
        Err(e) => {
            return error_response(BridgeError::Config(format!(
                "invalid hubspot.auth_base: {e}"
            )));
        }
    };
    url.query_pairs_mut()
        .append_pair("client_id", client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("scope", &hubspot.scope)
        .append_pair("optional_scope", &hubspot.optional_scope)
        .append_pair("state", &body.user_id);

    Json(ConnectResponse {
        redirect_url: url.to_string(),
    })
    .into_response()
}

/// GET /api/inbox/summary
pub async fn get_inbox_summary(
    State(state): State<GatewayState>,
    Query(q): Query<UserQuery>,
) -> Response {
    match messages::summary(&state.db, &q.user_id).await {
        Ok(summary) => Json(summary).into_response(),
        Err(e) => error_response(e),
    }
}

/// Query string for GET /api/inbox/messages.
#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    pub user_id: String,
    /// `new`, `processed`, `error`, or `all` (default).
    #[serde(default)]
    pub status: Option<String>,
    /// Case-insensitive substring search term.
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// GET /api/inbox/messages
pub async fn get_inbox_messages(
    State(state): State<GatewayState>,
    Query(q): Query<MessagesQuery>,
) -> Response {
    let status = match q.status.as_deref() {
        None | Some("all") | Some("") => None,
        Some(raw) => match raw.parse::<MessageStatus>() {
            Ok(status) => Some(status),
            Err(_) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ErrorResponse {
                        error: format!(
                            "invalid status {raw:?}: expected new, processed, error, or all"
                        ),
                    }),
                )
                    .into_response();
            }
        },
    };
    let limit = q.limit.unwrap_or(DEFAULT_LIST_LIMIT).min(MAX_LIST_LIMIT);

    match messages::list_messages(&state.db, &q.user_id, status, q.query.as_deref(), limit).await
    {
        Ok(list) => Json(MessageListResponse {
            status: status.map_or_else(|| "all".to_string(), |s| s.to_string()),
            count: list.len(),
            messages: list,
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /api/inbox/enrichment
///
/// Write-back endpoint for the external enrichment step.
pub async fn post_enrichment(
    State(state): State<GatewayState>,
    Json(body): Json<EnrichmentRequest>,
) -> Response {
    let outcome = if body.success {
        mailbridge_core::types::EnrichmentOutcome::Success {
            crm_record_url: body.crm_record_url,
        }
    } else {
        mailbridge_core::types::EnrichmentOutcome::Failure {
            detail: body.error.unwrap_or_else(|| "enrichment failed".to_string()),
        }
    };

    match record_enrichment(&state.db, &body.user_id, &body.message_id, outcome).await {
        Ok(true) => Json(serde_json::json!({"applied": true})).into_response(),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("message {} not found", body.message_id),
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /health (public)
pub async fn get_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Map a domain error onto an HTTP response.
///
/// Caller mistakes (unconnected user, missing baseline, bad transition,
/// bad config input) are 400s; upstream mailbox failures and timeouts are
/// 502s so callers know a retry may succeed; storage and internal faults
/// are 500s.
fn error_response(err: BridgeError) -> Response {
    let status = match &err {
        BridgeError::Config(_)
        | BridgeError::NotConnected { .. }
        | BridgeError::BaselineMissing
        | BridgeError::InvalidTransition { .. } => StatusCode::BAD_REQUEST,
        BridgeError::Mailbox { .. } | BridgeError::Timeout { .. } => StatusCode::BAD_GATEWAY,
        BridgeError::Storage { .. } | BridgeError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    if status.is_server_error() {
        tracing::error!(error = %err, "handler failed");
    }
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}
