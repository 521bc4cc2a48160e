// SPDX-FileCopyrightText: 2026 Mailbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Mailbridge mailbox-to-CRM sync service.
//!
//! This crate provides the domain types, the error type, and the trait seams
//! (mailbox API, token source) used throughout the Mailbridge workspace.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::BridgeError;
pub use traits::{MailboxProvider, TokenSource};
pub use types::{
    Connection, EnrichmentOutcome, InboxMessage, InboxSummary, MessageFlags, MessageStatus,
    Provider, RawMessage, StatusCounts, SyncReport,
};
