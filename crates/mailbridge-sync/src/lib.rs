// SPDX-FileCopyrightText: 2026 Mailbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mailbox synchronization pipeline.
//!
//! Turns a connected Gmail mailbox into rows in the bounded message cache:
//! the [`baseline`] module fixes the ingestion cutoff when a mailbox is
//! first connected, the [`worker`] polls for mail received after the
//! high-water mark, the [`classifier`] derives content flags and deep
//! links, and [`enrichment`] is the write-back entry point for the external
//! AI / CRM step. The [`gmail`] module is the REST adapter behind the
//! `MailboxProvider` seam.

pub mod baseline;
pub mod classifier;
pub mod enrichment;
pub mod gmail;
pub mod worker;

pub use baseline::{complete_hubspot_connection, establish_gmail_connection};
pub use enrichment::record_enrichment;
pub use gmail::GmailClient;
pub use worker::SyncWorker;
