// SPDX-FileCopyrightText: 2026 Mailbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Mailbridge sync service.
//!
//! All structs use `#[serde(deny_unknown_fields)]` so unrecognized keys are
//! rejected at startup with an actionable diagnostic.

use serde::{Deserialize, Serialize};

/// Top-level Mailbridge configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. Every section is optional and defaults to values
/// usable for local development.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    /// HTTP gateway settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Sync worker settings.
    #[serde(default)]
    pub sync: SyncConfig,

    /// Gmail integration settings.
    #[serde(default)]
    pub gmail: GmailConfig,

    /// HubSpot integration settings.
    #[serde(default)]
    pub hubspot: HubspotConfig,
}

/// HTTP gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bearer token required on API routes. `None` disables auth.
    #[serde(default)]
    pub bearer_token: Option<String>,

    /// Frontend origin allowed by CORS. `None` allows any origin.
    #[serde(default)]
    pub frontend_url: Option<String>,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            bearer_token: None,
            frontend_url: None,
            log_level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8787
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("mailbridge").join("mailbridge.db"))
        .and_then(|p| p.to_str().map(String::from))
        .unwrap_or_else(|| "mailbridge.db".to_string())
}

/// Sync worker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    /// Default batch ceiling when a sync request does not specify one.
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,

    /// Per-user message cache cap; oldest rows beyond it are evicted
    /// after each pass.
    #[serde(default = "default_retention_cap")]
    pub retention_cap: usize,

    /// Bounded timeout for one mailbox fetch, in seconds.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_messages: default_max_messages(),
            retention_cap: default_retention_cap(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

fn default_max_messages() -> usize {
    25
}

fn default_retention_cap() -> usize {
    100
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

/// Gmail integration configuration.
///
/// Only the OAuth authorize-URL pieces live here; token exchange happens in
/// the external OAuth collaborator.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GmailConfig {
    /// Google OAuth client id. `None` disables the connect flow.
    #[serde(default)]
    pub client_id: Option<String>,

    /// OAuth redirect URI registered with Google.
    #[serde(default)]
    pub redirect_uri: Option<String>,

    /// Requested OAuth scopes, space separated.
    #[serde(default = "default_gmail_scopes")]
    pub scopes: String,

    /// OAuth authorize endpoint base.
    #[serde(default = "default_gmail_auth_base")]
    pub auth_base: String,

    /// Gmail REST API base URL. Overridable for tests.
    #[serde(default = "default_gmail_api_base")]
    pub api_base: String,
}

impl Default for GmailConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            redirect_uri: None,
            scopes: default_gmail_scopes(),
            auth_base: default_gmail_auth_base(),
            api_base: default_gmail_api_base(),
        }
    }
}

fn default_gmail_scopes() -> String {
    "https://www.googleapis.com/auth/gmail.readonly".to_string()
}

fn default_gmail_auth_base() -> String {
    "https://accounts.google.com/o/oauth2/v2/auth".to_string()
}

fn default_gmail_api_base() -> String {
    "https://gmail.googleapis.com".to_string()
}

/// HubSpot integration configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HubspotConfig {
    /// HubSpot OAuth client id. `None` disables the connect flow.
    #[serde(default)]
    pub client_id: Option<String>,

    /// OAuth redirect URI registered with HubSpot.
    #[serde(default)]
    pub redirect_uri: Option<String>,

    /// Required OAuth scope string.
    #[serde(default = "default_hubspot_scope")]
    pub scope: String,

    /// Optional OAuth scopes, space separated. Empty means none.
    #[serde(default)]
    pub optional_scope: String,

    /// OAuth authorize endpoint base.
    #[serde(default = "default_hubspot_auth_base")]
    pub auth_base: String,
}

impl Default for HubspotConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            redirect_uri: None,
            scope: default_hubspot_scope(),
            optional_scope: String::new(),
            auth_base: default_hubspot_auth_base(),
        }
    }
}

fn default_hubspot_scope() -> String {
    "oauth crm.objects.contacts.write".to_string()
}

fn default_hubspot_auth_base() -> String {
    "https://app.hubspot.com/oauth".to_string()
}
