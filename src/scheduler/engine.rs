//! Main scheduler execution loop.
//!
//! One fire, one record: a fire either runs the job (lock acquired) or is
//! recorded as skipped (previous run still active). Job failures and log
//! write failures are non-fatal; the loop continues to the next fire. Only
//! a spawn failure terminates the daemon.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::job::Job;
use crate::schedule::ScheduleSpec;
use crate::scheduler::clock;
use crate::scheduler::history::RunRecord;
use crate::scheduler::lock::RunLock;
use crate::storage::{self, Pool};

pub struct Engine {
    job: Arc<dyn Job>,
    job_name: String,
    schedule: ScheduleSpec,
    lock: RunLock,
    pool: Pool,
    retention_days: Option<u32>,
}

impl Engine {
    pub fn new(
        job: Arc<dyn Job>,
        job_name: impl Into<String>,
        schedule: ScheduleSpec,
        lock: RunLock,
        pool: Pool,
        retention_days: Option<u32>,
    ) -> Self {
        Self {
            job,
            job_name: job_name.into(),
            schedule,
            lock,
            pool,
            retention_days,
        }
    }

    /// Drive the fire loop forever. Returns only on a fatal condition.
    pub async fn run_forever(&self) -> Result<()> {
        info!(job = %self.job_name, schedule = %self.schedule, "scheduler started");

        let (fatal_tx, mut fatal_rx) = mpsc::unbounded_channel();
        let mut last_fire: Option<DateTime<Utc>> = None;

        loop {
            let next = clock::next_fire(&self.schedule, Utc::now(), last_fire)
                .context("schedule yields no future fire instants")?;
            debug!(next = %next, "waiting for next fire");

            tokio::select! {
                _ = clock::wait_until(next) => {
                    last_fire = Some(next);
                    self.handle_fire(next, &fatal_tx);
                }
                Some(err) = fatal_rx.recv() => {
                    return Err(err.context("job runner hit a fatal condition"));
                }
            }
        }
    }

    /// React to one clock fire: run the job, or record the skip.
    ///
    /// The lock is taken before the run task is spawned and travels into it,
    /// so a second fire during the run observes it held.
    pub fn handle_fire(
        &self,
        fired_at: DateTime<Utc>,
        fatal_tx: &mpsc::UnboundedSender<anyhow::Error>,
    ) {
        match self.lock.try_acquire() {
            Some(guard) => {
                let job = Arc::clone(&self.job);
                let job_name = self.job_name.clone();
                let pool = self.pool.clone();
                let retention_days = self.retention_days;
                let fatal_tx = fatal_tx.clone();

                tokio::spawn(async move {
                    let _guard = guard;
                    match execute_and_record(job, &job_name, &pool, retention_days).await {
                        Ok(record) => {
                            info!(
                                job = %job_name,
                                outcome = %record.outcome,
                                exit_code = ?record.exit_code,
                                "job finished"
                            );
                        }
                        Err(e) => {
                            let _ = fatal_tx.send(e);
                        }
                    }
                });
            }
            None => {
                warn!(job = %self.job_name, fired_at = %fired_at, "previous run still active, skipping fire");
                let record = RunRecord::skipped_overlap(
                    self.job_name.clone(),
                    self.job.describe(),
                    fired_at,
                );
                if let Err(e) = storage::append_run_record(&self.pool, &record) {
                    error!(error = %e, "failed to append skip record");
                }
            }
        }
    }

    /// Execute the job exactly once under the usual lock and recording
    /// discipline. Used by the `once` CLI command.
    pub async fn run_once(&self) -> Result<RunRecord> {
        let _guard = self
            .lock
            .try_acquire()
            .context("another run is already active")?;
        execute_and_record(
            Arc::clone(&self.job),
            &self.job_name,
            &self.pool,
            self.retention_days,
        )
        .await
    }
}

/// Run the job and append its record. `Err` only on spawn failure; a failed
/// append is logged and the record still returned.
async fn execute_and_record(
    job: Arc<dyn Job>,
    job_name: &str,
    pool: &Pool,
    retention_days: Option<u32>,
) -> Result<RunRecord> {
    let started_at = Utc::now();
    let output = job.execute().await?;
    let finished_at = Utc::now();

    let record = RunRecord::completed(
        job_name.to_string(),
        job.describe(),
        &output,
        started_at,
        finished_at,
    );
    if let Err(e) = storage::append_run_record(pool, &record) {
        error!(error = %e, "failed to append run record");
    }

    if let Some(days) = retention_days {
        match storage::prune_older_than(pool, days) {
            Ok(0) => {}
            Ok(removed) => debug!(removed, days, "pruned old run records"),
            Err(e) => warn!(error = %e, "failed to prune old run records"),
        }
    }

    Ok(record)
}
