// SPDX-FileCopyrightText: 2026 Mailbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Mailbridge sync service.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a
//! single-writer concurrency model via `tokio-rusqlite`, and typed
//! operations for the connection store and the bounded message cache.

pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;

pub use database::Database;
pub use models::*;
