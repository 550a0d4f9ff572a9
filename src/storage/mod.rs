//! SQLite log sink -- append-only run records behind a connection pool.

pub mod schema;

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use r2d2::Pool as R2D2Pool;
use r2d2_sqlite::SqliteConnectionManager;
use uuid::Uuid;

use crate::scheduler::{RunOutcome, RunRecord};

/// Connection Pool type
pub type Pool = R2D2Pool<SqliteConnectionManager>;

/// Open (or create) the SQLite database and return a connection pool.
pub fn open_pool(path: &str) -> Result<Pool> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }
    }

    let manager = SqliteConnectionManager::file(path).with_init(|c| {
        c.execute_batch(
            "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA temp_store = MEMORY;
                 PRAGMA foreign_keys = ON;
                 PRAGMA busy_timeout = 5000;",
        )
    });

    let pool = R2D2Pool::new(manager)?;

    // Run migrations on a single connection
    let conn = pool.get()?;
    schema::migrate(&conn)?;

    Ok(pool)
}

fn fmt_time(t: DateTime<Utc>) -> String {
    // Fixed-width RFC 3339 so lexicographic order in SQL matches time order.
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_time(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("malformed timestamp '{s}'"))?
        .with_timezone(&Utc))
}

/// Append one run record. Each append is a single INSERT; WAL journaling
/// keeps earlier records intact if the process dies mid-write.
pub fn append_run_record(pool: &Pool, record: &RunRecord) -> Result<()> {
    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO run_records (id, job_name, command, outcome, exit_code, output_excerpt, started_at, finished_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![
            record.id.to_string(),
            record.job_name,
            record.command,
            record.outcome.as_str(),
            record.exit_code,
            record.output_excerpt,
            fmt_time(record.started_at),
            record.finished_at.map(fmt_time),
        ],
    )?;
    Ok(())
}

/// Load the newest `limit` records, newest append first.
pub fn recent_records(pool: &Pool, limit: usize) -> Result<Vec<RunRecord>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT id, job_name, command, outcome, exit_code, output_excerpt, started_at, finished_at
         FROM run_records ORDER BY rowid DESC LIMIT ?1",
    )?;

    let rows = stmt.query_map([limit as i64], |row| {
        Ok(RawRecord {
            id: row.get(0)?,
            job_name: row.get(1)?,
            command: row.get(2)?,
            outcome: row.get(3)?,
            exit_code: row.get(4)?,
            output_excerpt: row.get(5)?,
            started_at: row.get(6)?,
            finished_at: row.get(7)?,
        })
    })?;

    let mut records = Vec::new();
    for raw in rows {
        records.push(raw?.into_record()?);
    }
    Ok(records)
}

/// Delete records older than `days`. Returns the number removed.
pub fn prune_older_than(pool: &Pool, days: u32) -> Result<usize> {
    let cutoff = Utc::now() - chrono::Duration::days(i64::from(days));
    let conn = pool.get()?;
    let removed = conn.execute(
        "DELETE FROM run_records WHERE started_at < ?1",
        rusqlite::params![fmt_time(cutoff)],
    )?;
    Ok(removed)
}

/// Row image before uuid/outcome/timestamp parsing.
struct RawRecord {
    id: String,
    job_name: String,
    command: String,
    outcome: String,
    exit_code: Option<i32>,
    output_excerpt: Option<String>,
    started_at: String,
    finished_at: Option<String>,
}

impl RawRecord {
    fn into_record(self) -> Result<RunRecord> {
        Ok(RunRecord {
            id: Uuid::parse_str(&self.id).context("malformed run record id")?,
            job_name: self.job_name,
            command: self.command,
            outcome: RunOutcome::parse(&self.outcome)
                .with_context(|| format!("unknown outcome '{}'", self.outcome))?,
            exit_code: self.exit_code,
            output_excerpt: self.output_excerpt,
            started_at: parse_time(&self.started_at)?,
            finished_at: self.finished_at.as_deref().map(parse_time).transpose()?,
        })
    }
}
