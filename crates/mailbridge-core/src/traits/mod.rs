// SPDX-FileCopyrightText: 2026 Mailbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait seams between the sync pipeline and its external collaborators.

pub mod mailbox;

pub use mailbox::{MailboxProvider, TokenSource};
