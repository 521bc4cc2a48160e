// SPDX-FileCopyrightText: 2026 Mailbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;

use axum::{
    Router,
    http::HeaderValue,
    middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;

use mailbridge_config::BridgeConfig;
use mailbridge_core::BridgeError;
use mailbridge_storage::Database;
use mailbridge_sync::SyncWorker;

use crate::auth::{AuthConfig, auth_middleware};
use crate::handlers;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    /// Storage handle used by query and connection handlers.
    pub db: Arc<Database>,
    /// Sync worker triggered by the sync endpoint.
    pub worker: Arc<SyncWorker>,
    /// Full service configuration (OAuth bases, sync defaults).
    pub config: Arc<BridgeConfig>,
}

/// Assemble the gateway router.
///
/// `/health` is public; everything under `/api` passes through the bearer
/// auth middleware.
pub fn build_router(state: GatewayState) -> Router {
    let auth = AuthConfig {
        bearer_token: state.config.server.bearer_token.clone(),
    };

    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/api/gmail/status", get(handlers::get_gmail_status))
        .route("/api/gmail/connect", post(handlers::post_gmail_connect))
        .route("/api/gmail/disconnect", post(handlers::post_gmail_disconnect))
        .route("/api/gmail/sync/start", post(handlers::post_sync_start))
        .route("/api/hubspot/status", get(handlers::get_hubspot_status))
        .route("/api/hubspot/connect", post(handlers::post_hubspot_connect))
        .route("/api/inbox/summary", get(handlers::get_inbox_summary))
        .route("/api/inbox/messages", get(handlers::get_inbox_messages))
        .route("/api/inbox/enrichment", post(handlers::post_enrichment))
        .route_layer(axum_middleware::from_fn_with_state(auth, auth_middleware))
        .with_state(state.clone());

    let cors = cors_layer(state.config.server.frontend_url.as_deref());

    Router::new().merge(public_routes).merge(api_routes).layer(cors)
}

/// Restrict CORS to the configured frontend origin when one is set.
fn cors_layer(frontend_url: Option<&str>) -> CorsLayer {
    match frontend_url.and_then(|url| url.parse::<HeaderValue>().ok()) {
        Some(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any),
        None => CorsLayer::permissive(),
    }
}

/// Start the gateway HTTP server and serve until shutdown.
pub async fn start_server(state: GatewayState) -> Result<(), BridgeError> {
    let addr = format!(
        "{}:{}",
        state.config.server.host, state.config.server.port
    );
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| BridgeError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("Gateway server listening on {addr}");

    axum::serve(listener, app)
        .await
        .map_err(|e| BridgeError::Internal(format!("gateway server error: {e}")))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use tower::ServiceExt;

    use mailbridge_test_utils::{MockMailbox, temp_db};

    async fn state_with(config_toml: &str) -> (GatewayState, tempfile::TempDir) {
        let config = Arc::new(
            mailbridge_config::load_and_validate_str(config_toml).expect("valid test config"),
        );
        let (db, dir) = temp_db().await;
        let db = Arc::new(db);
        let worker = Arc::new(SyncWorker::new(
            db.clone(),
            Arc::new(MockMailbox::new()),
            Duration::from_secs(5),
            config.sync.retention_cap,
        ));
        (GatewayState { db, worker, config }, dir)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_is_public() {
        let (state, _dir) = state_with("[server]\nbearer_token = \"secret\"").await;
        let app = build_router(state);

        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn api_requires_bearer_token() {
        let (state, _dir) = state_with("[server]\nbearer_token = \"secret\"").await;
        let app = build_router(state);

        let response = app
            .clone()
            .oneshot(
                Request::get("/api/inbox/summary?user_id=u1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .clone()
            .oneshot(
                Request::get("/api/inbox/summary?user_id=u1")
                    .header(header::AUTHORIZATION, "Bearer wrong")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(
                Request::get("/api/inbox/summary?user_id=u1")
                    .header(header::AUTHORIZATION, "Bearer secret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_token_disables_auth() {
        let (state, _dir) = state_with("").await;
        let app = build_router(state);

        let response = app
            .oneshot(
                Request::get("/api/gmail/status?user_id=u1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["connected"], false);
    }

    #[tokio::test]
    async fn invalid_status_filter_is_bad_request() {
        let (state, _dir) = state_with("").await;
        let app = build_router(state);

        let response = app
            .clone()
            .oneshot(
                Request::get("/api/inbox/messages?user_id=u1&status=bogus")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(
                Request::get("/api/inbox/messages?user_id=u1&status=all")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "all");
        assert_eq!(json["count"], 0);
    }

    #[tokio::test]
    async fn sync_for_unconnected_user_is_bad_request() {
        let (state, _dir) = state_with("").await;
        let app = build_router(state);

        let response = app
            .oneshot(
                Request::post("/api/gmail/sync/start")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"user_id": "u1"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("not connected"));
    }

    #[tokio::test]
    async fn gmail_connect_builds_authorize_url() {
        let (state, _dir) = state_with(
            "[gmail]\nclient_id = \"cid-123\"\nredirect_uri = \"http://localhost:8787/callback\"",
        )
        .await;
        let app = build_router(state);

        let response = app
            .oneshot(
                Request::post("/api/gmail/connect")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"user_id": "u1"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let url = json["redirect_url"].as_str().unwrap();
        assert!(url.starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
        assert!(url.contains("client_id=cid-123"));
        assert!(url.contains("state=u1"));
    }

    #[tokio::test]
    async fn connect_without_client_id_is_bad_request() {
        let (state, _dir) = state_with("").await;
        let app = build_router(state);

        let response = app
            .oneshot(
                Request::post("/api/hubspot/connect")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"user_id": "u1"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn enrichment_for_unknown_message_is_not_found() {
        let (state, _dir) = state_with("").await;
        let app = build_router(state);

        let response = app
            .oneshot(
                Request::post("/api/inbox/enrichment")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        r#"{"user_id": "u1", "message_id": "gone", "success": false}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
