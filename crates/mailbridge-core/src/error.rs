// SPDX-FileCopyrightText: 2026 Mailbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Mailbridge sync service.

use thiserror::Error;

use crate::types::{MessageStatus, Provider};

/// The primary error type used across Mailbridge crates.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Configuration errors (invalid TOML, missing required fields).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// External mailbox API errors (network failure, bad payload, auth).
    ///
    /// Always retriable: a pass aborted by this error never advances the
    /// poll high-water mark.
    #[error("mailbox error: {message}")]
    Mailbox {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The user has no connection record for the given provider.
    #[error("{provider} is not connected for this user")]
    NotConnected { provider: Provider },

    /// Sync was attempted before a Gmail baseline was established.
    #[error("baseline timestamp missing; reconnect Gmail to reset the baseline")]
    BaselineMissing,

    /// A message status transition violated the lifecycle rules.
    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: MessageStatus,
        to: MessageStatus,
    },

    /// An external call exceeded its bounded timeout.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}
