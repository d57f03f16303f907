// SPDX-FileCopyrightText: 2026 Coachmail Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence for coachmail threads and transcripts.
//!
//! One [`Database`] handle per process; every query goes through the single
//! tokio-rusqlite background thread. Schema lives in `migrations/` and is
//! applied on open.

pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;

pub use database::Database;
pub use models::{NewThreadMessage, ThreadMessageRow, ThreadRow};
