// SPDX-FileCopyrightText: 2026 Mailbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules, one per store.

pub mod connections;
pub mod messages;
