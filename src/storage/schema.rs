//! Database schema and migrations.

use anyhow::Result;
use rusqlite::Connection;

/// Run all pending migrations.
pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS run_records (
            id TEXT PRIMARY KEY,
            job_name TEXT NOT NULL,
            command TEXT NOT NULL,
            outcome TEXT NOT NULL,
            exit_code INTEGER,
            output_excerpt TEXT,
            started_at TEXT NOT NULL,
            finished_at TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_run_records_started ON run_records(started_at);",
    )?;

    Ok(())
}
