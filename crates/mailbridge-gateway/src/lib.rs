// SPDX-FileCopyrightText: 2026 Mailbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP API gateway for the Mailbridge sync service.
//!
//! Exposes the connection, sync, and inbox query surface over axum with
//! bearer-token auth and CORS. All domain logic lives in the sync and
//! storage crates; handlers translate between HTTP shapes and those calls.

pub mod auth;
pub mod handlers;
pub mod server;

pub use server::{GatewayState, build_router, start_server};
