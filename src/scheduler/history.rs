//! Run records -- the persisted outcome of each fire.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::job::{JobOutput, JobStatus};

/// Outcome of one scheduled fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Success,
    Failure,
    TimedOut,
    SkippedOverlap,
}

impl RunOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunOutcome::Success => "success",
            RunOutcome::Failure => "failure",
            RunOutcome::TimedOut => "timed_out",
            RunOutcome::SkippedOverlap => "skipped_overlap",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(RunOutcome::Success),
            "failure" => Some(RunOutcome::Failure),
            "timed_out" => Some(RunOutcome::TimedOut),
            "skipped_overlap" => Some(RunOutcome::SkippedOverlap),
            _ => None,
        }
    }
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record of one job invocation or skipped fire. Immutable once written.
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub id: Uuid,
    pub job_name: String,
    pub command: String,
    pub outcome: RunOutcome,
    pub exit_code: Option<i32>,
    pub output_excerpt: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunRecord {
    /// Record for a completed execution.
    pub fn completed(
        job_name: String,
        command: String,
        output: &JobOutput,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> Self {
        let outcome = match output.status {
            JobStatus::Succeeded => RunOutcome::Success,
            JobStatus::Failed => RunOutcome::Failure,
            JobStatus::TimedOut => RunOutcome::TimedOut,
        };
        Self {
            id: Uuid::new_v4(),
            job_name,
            command,
            outcome,
            exit_code: output.exit_code,
            output_excerpt: Some(output.excerpt.clone()),
            started_at,
            finished_at: Some(finished_at),
        }
    }

    /// Record for a fire skipped because the previous run was still active.
    pub fn skipped_overlap(job_name: String, command: String, fired_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_name,
            command,
            outcome: RunOutcome::SkippedOverlap,
            exit_code: None,
            output_excerpt: None,
            started_at: fired_at,
            finished_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_string_round_trip() {
        for outcome in [
            RunOutcome::Success,
            RunOutcome::Failure,
            RunOutcome::TimedOut,
            RunOutcome::SkippedOverlap,
        ] {
            assert_eq!(RunOutcome::parse(outcome.as_str()), Some(outcome));
        }
        assert_eq!(RunOutcome::parse("bogus"), None);
    }

    #[test]
    fn test_skipped_record_has_no_execution_fields() {
        let r = RunRecord::skipped_overlap("j".into(), "cmd".into(), Utc::now());
        assert_eq!(r.outcome, RunOutcome::SkippedOverlap);
        assert!(r.exit_code.is_none());
        assert!(r.output_excerpt.is_none());
        assert!(r.finished_at.is_none());
    }
}
