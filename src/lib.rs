//! batchwarden -- a periodic single-instance batch scheduler.
//!
//! One external command, one schedule, at most one run in flight. Every
//! fire produces exactly one [`scheduler::RunRecord`]: the outcome of the
//! run, or `skipped_overlap` when the previous run was still active.

pub mod config;
pub mod error;
pub mod job;
pub mod schedule;
pub mod scheduler;
pub mod storage;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;

use config::Config;
use job::CommandJob;
use schedule::ScheduleSpec;
use scheduler::{Engine, RunLock, RunRecord};

fn build_engine(cfg: &Config) -> Result<Engine> {
    let pool = storage::open_pool(&cfg.storage.db_path)?;
    let spec = ScheduleSpec::parse(&cfg.schedule.expr, Utc::now())?;
    let job = Arc::new(CommandJob::from_config(&cfg.job));
    let lock = RunLock::new(cfg.lock.lease_secs.map(Duration::from_secs));
    Ok(Engine::new(
        job,
        cfg.job.name.clone(),
        spec,
        lock,
        pool,
        cfg.storage.retention_days,
    ))
}

/// Start the daemon: open storage and drive the fire loop forever.
pub async fn run_daemon(cfg: &Config) -> Result<()> {
    cfg.validate()?;
    let engine = build_engine(cfg)?;
    engine.run_forever().await
}

/// Execute the configured job exactly once under the usual lock and
/// recording discipline, returning its run record.
pub async fn run_job_once(cfg: &Config) -> Result<RunRecord> {
    cfg.validate()?;
    let engine = build_engine(cfg)?;
    engine.run_once().await
}
