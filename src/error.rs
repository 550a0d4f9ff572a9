use thiserror::Error;

/// Errors surfaced by the scheduler library.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The schedule expression is neither a valid cron expression nor an
    /// interval shorthand.
    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),

    /// The job process could not be spawned or reaped. Treated as fatal by
    /// the engine: if the OS cannot fork, retrying next interval will not
    /// help.
    #[error("job process error: {0}")]
    Process(#[from] std::io::Error),
}
