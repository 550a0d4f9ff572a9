//! Schedule expressions and fire-instant computation.
//!
//! Two formats are accepted: a cron expression (5-field, or 6/7-field with
//! seconds, evaluated in UTC) and an interval shorthand like `"1h"`, `"30m"`
//! or `"90s"`. Interval schedules are anchored to an instant supplied at
//! parse time, normally the daemon start.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use cron::Schedule as CronSchedule;

use crate::error::SchedulerError;

/// A recurring fire-time specification.
///
/// Invariant: `next_after` yields a deterministic, strictly increasing
/// sequence of instants.
#[derive(Debug, Clone)]
pub struct ScheduleSpec {
    expr: String,
    kind: ScheduleKind,
}

#[derive(Debug, Clone)]
enum ScheduleKind {
    Cron(Box<CronSchedule>),
    Every {
        period: Duration,
        anchor: DateTime<Utc>,
    },
}

impl ScheduleSpec {
    /// Parse a schedule expression. Interval shorthands fire at
    /// `anchor + k * period` for k >= 1.
    pub fn parse(expr: &str, anchor: DateTime<Utc>) -> Result<Self, SchedulerError> {
        let trimmed = expr.trim();
        if trimmed.is_empty() {
            return Err(SchedulerError::InvalidSchedule(
                "empty schedule expression".to_string(),
            ));
        }

        if let Some(period) = parse_interval(trimmed) {
            if period.is_zero() {
                return Err(SchedulerError::InvalidSchedule(format!(
                    "'{trimmed}': interval must be positive"
                )));
            }
            let period = Duration::from_std(period).map_err(|_| {
                SchedulerError::InvalidSchedule(format!("'{trimmed}': interval too large"))
            })?;
            return Ok(Self {
                expr: trimmed.to_string(),
                kind: ScheduleKind::Every { period, anchor },
            });
        }

        // The cron crate requires a seconds field; accept classic 5-field
        // expressions by pinning seconds to 0.
        let normalized = if trimmed.split_whitespace().count() == 5 {
            format!("0 {trimmed}")
        } else {
            trimmed.to_string()
        };
        let schedule = CronSchedule::from_str(&normalized)
            .map_err(|e| SchedulerError::InvalidSchedule(format!("'{trimmed}': {e}")))?;

        Ok(Self {
            expr: trimmed.to_string(),
            kind: ScheduleKind::Cron(Box::new(schedule)),
        })
    }

    /// The first fire instant strictly after `now`.
    pub fn next_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match &self.kind {
            ScheduleKind::Cron(schedule) => schedule.after(&now).next(),
            ScheduleKind::Every { period, anchor } => {
                let period_ms = period.num_milliseconds();
                let elapsed_ms = (now - *anchor).num_milliseconds().max(0);
                let periods = elapsed_ms / period_ms + 1;
                anchor.checked_add_signed(Duration::milliseconds(periods * period_ms))
            }
        }
    }

    /// The next `count` fire instants after `from`, for previews.
    pub fn upcoming(&self, from: DateTime<Utc>, count: usize) -> Vec<DateTime<Utc>> {
        let mut fires = Vec::with_capacity(count);
        let mut cursor = from;
        while fires.len() < count {
            match self.next_after(cursor) {
                Some(t) => {
                    cursor = t;
                    fires.push(t);
                }
                None => break,
            }
        }
        fires
    }

    pub fn expr(&self) -> &str {
        &self.expr
    }
}

impl fmt::Display for ScheduleSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expr)
    }
}

/// Parse `"90s"` / `"30m"` / `"1h"` / `"2d"` into a duration.
/// Returns None for anything that is not an interval shorthand.
fn parse_interval(expr: &str) -> Option<std::time::Duration> {
    if !expr.is_ascii() || expr.len() < 2 {
        return None;
    }
    let (value, unit) = expr.split_at(expr.len() - 1);
    let value: u64 = value.parse().ok()?;
    let secs = match unit {
        "s" => value,
        "m" => value.checked_mul(60)?,
        "h" => value.checked_mul(3600)?,
        "d" => value.checked_mul(86_400)?,
        _ => return None,
    };
    Some(std::time::Duration::from_secs(secs))
}
