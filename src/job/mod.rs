use crate::error::SchedulerError;

pub mod command;

pub use command::CommandJob;

/// Final status of one job execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Succeeded,
    Failed,
    TimedOut,
}

/// Captured result of one job execution.
#[derive(Debug, Clone)]
pub struct JobOutput {
    pub status: JobStatus,
    /// Exit code when the job exited normally; None when it was killed.
    pub exit_code: Option<i32>,
    /// Combined stdout/stderr, bounded.
    pub excerpt: String,
    pub truncated: bool,
}

/// A runnable batch job.
///
/// The engine drives at most one of these at a time. Production uses
/// [`CommandJob`]; tests substitute in-process fakes.
#[async_trait::async_trait]
pub trait Job: Send + Sync {
    /// Run the job to completion (or timeout) and report what happened.
    ///
    /// An `Err` means the job could not be started at all; the engine treats
    /// that as fatal.
    async fn execute(&self) -> Result<JobOutput, SchedulerError>;

    /// Human-readable command line for run records.
    fn describe(&self) -> String;
}
