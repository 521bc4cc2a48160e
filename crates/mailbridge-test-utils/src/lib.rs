// SPDX-FileCopyrightText: 2026 Mailbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Mailbridge integration tests.
//!
//! Provides a scripted mailbox adapter and a temp-database harness for fast,
//! deterministic, CI-runnable tests without external services.
//!
//! # Components
//!
//! - [`MockMailbox`] - Scripted mailbox provider with failure and delay injection
//! - [`harness`] - Temp-directory SQLite databases and fixture builders

pub mod harness;
pub mod mock_mailbox;

pub use harness::{raw_message, temp_db};
pub use mock_mailbox::MockMailbox;
