// SPDX-FileCopyrightText: 2026 Mailbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports the XDG hierarchy: `./mailbridge.toml` >
//! `~/.config/mailbridge/mailbridge.toml` > `/etc/mailbridge/mailbridge.toml`
//! with environment variable overrides via the `MAILBRIDGE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::BridgeConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/mailbridge/mailbridge.toml` (system-wide)
/// 3. `~/.config/mailbridge/mailbridge.toml` (user XDG config)
/// 4. `./mailbridge.toml` (local directory)
/// 5. `MAILBRIDGE_*` environment variables
pub fn load_config() -> Result<BridgeConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(BridgeConfig::default()))
        .merge(Toml::file("/etc/mailbridge/mailbridge.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("mailbridge/mailbridge.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("mailbridge.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Useful for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<BridgeConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(BridgeConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<BridgeConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(BridgeConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` so key names containing
/// underscores stay intact: `MAILBRIDGE_SERVER_BEARER_TOKEN` must map to
/// `server.bearer_token`, not `server.bearer.token`.
fn env_provider() -> Env {
    Env::prefixed("MAILBRIDGE_").map(|key| {
        // The key keeps the env var's original case; normalize before
        // matching the section prefix.
        let key_str = key.as_str().to_lowercase();
        let mapped = key_str
            .replacen("server_", "server.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("sync_", "sync.", 1)
            .replacen("gmail_", "gmail.", 1)
            .replacen("hubspot_", "hubspot.", 1);
        mapped.into()
    })
}
