// SPDX-FileCopyrightText: 2026 Mailbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain model types for storage entities.
//!
//! The canonical types live in `mailbridge-core::types` so the trait seams
//! can use them; this module re-exports them for convenience within the
//! storage crate.

pub use mailbridge_core::types::{
    Connection, InboxMessage, InboxSummary, MessageStatus, Provider, StatusCounts,
};
