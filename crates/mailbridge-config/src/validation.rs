// SPDX-FileCopyrightText: 2026 Mailbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks semantic constraints serde attributes cannot express: bind address
//! shape, non-empty paths, and sync bounds.

use crate::diagnostic::ConfigError;
use crate::model::BridgeConfig;

/// Hard ceiling on a single sync batch, matching the gateway's request bound.
pub const MAX_MESSAGES_CEILING: usize = 500;

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every failure rather than failing fast.
pub fn validate_config(config: &BridgeConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let host = config.server.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::Validation {
            message: "server.host must not be empty".to_string(),
        });
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(ConfigError::Validation {
                message: format!("server.host `{host}` is not a valid IP address or hostname"),
            });
        }
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if config.sync.max_messages == 0 || config.sync.max_messages > MAX_MESSAGES_CEILING {
        errors.push(ConfigError::Validation {
            message: format!(
                "sync.max_messages must be between 1 and {MAX_MESSAGES_CEILING}, got {}",
                config.sync.max_messages
            ),
        });
    }

    if config.sync.retention_cap == 0 {
        errors.push(ConfigError::Validation {
            message: "sync.retention_cap must be at least 1".to_string(),
        });
    }

    if config.sync.fetch_timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "sync.fetch_timeout_secs must be at least 1".to_string(),
        });
    }

    for (section, uri) in [
        ("gmail", config.gmail.redirect_uri.as_deref()),
        ("hubspot", config.hubspot.redirect_uri.as_deref()),
    ] {
        if let Some(uri) = uri
            && !uri.starts_with("http://")
            && !uri.starts_with("https://")
        {
            errors.push(ConfigError::Validation {
                message: format!("{section}.redirect_uri `{uri}` must be an http(s) URL"),
            });
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = BridgeConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn empty_database_path_fails_validation() {
        let mut config = BridgeConfig::default();
        config.storage.database_path = "".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(
            |e| matches!(e, ConfigError::Validation { message } if message.contains("database_path"))
        ));
    }

    #[test]
    fn oversized_batch_fails_validation() {
        let mut config = BridgeConfig::default();
        config.sync.max_messages = 10_000;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(
            |e| matches!(e, ConfigError::Validation { message } if message.contains("max_messages"))
        ));
    }

    #[test]
    fn zero_retention_cap_fails_validation() {
        let mut config = BridgeConfig::default();
        config.sync.retention_cap = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn bad_redirect_uri_fails_validation() {
        let mut config = BridgeConfig::default();
        config.gmail.redirect_uri = Some("ftp://example.com/callback".to_string());
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(
            |e| matches!(e, ConfigError::Validation { message } if message.contains("redirect_uri"))
        ));
    }

    #[test]
    fn valid_custom_config_passes() {
        let mut config = BridgeConfig::default();
        config.server.host = "0.0.0.0".to_string();
        config.storage.database_path = "/tmp/bridge.db".to_string();
        config.gmail.redirect_uri = Some("https://example.com/oauth/callback".to_string());
        assert!(validate_config(&config).is_ok());
    }
}
