// SPDX-FileCopyrightText: 2026 Coachmail Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Schema migrations, embedded at build time from `migrations/*.sql`.

use tracing::debug;

use coachmail_core::CoachmailError;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Bring the schema up to date. Applied migrations are tracked by refinery
/// in its own `refinery_schema_history` table, so re-running is a no-op.
pub fn run_migrations(conn: &mut rusqlite::Connection) -> Result<(), CoachmailError> {
    let report = embedded::migrations::runner()
        .run(conn)
        .map_err(|e| CoachmailError::Storage {
            source: Box::new(e),
        })?;
    let applied = report.applied_migrations().len();
    if applied > 0 {
        debug!(applied, "schema migrations applied");
    }
    Ok(())
}
