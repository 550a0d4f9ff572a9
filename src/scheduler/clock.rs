//! Fire-instant computation and exact wakeups.

use chrono::{DateTime, Utc};

use crate::schedule::ScheduleSpec;

/// Compute the next fire instant.
///
/// The basis is the later of `now` and the previous fire, so a wall-clock
/// step backwards can never re-fire an instant, and instants missed while
/// the process was down are skipped rather than bursted.
pub fn next_fire(
    spec: &ScheduleSpec,
    now: DateTime<Utc>,
    last_fire: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    let basis = match last_fire {
        Some(prev) if prev > now => prev,
        _ => now,
    };
    spec.next_after(basis)
}

/// Sleep until `instant`. Returns immediately if it has already passed.
pub async fn wait_until(instant: DateTime<Utc>) {
    let delay = (instant - Utc::now()).to_std().unwrap_or_default();
    if !delay.is_zero() {
        tokio::time::sleep_until(tokio::time::Instant::now() + delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn spec() -> ScheduleSpec {
        ScheduleSpec::parse("1h", "2026-03-01T00:00:00Z".parse().unwrap()).unwrap()
    }

    #[test]
    fn test_fires_are_strictly_increasing_and_unique() {
        let spec = spec();
        let mut now: DateTime<Utc> = "2026-03-01T00:30:00Z".parse().unwrap();
        let mut last = None;
        let mut seen = Vec::new();
        for _ in 0..6 {
            let fire = next_fire(&spec, now, last).unwrap();
            assert!(!seen.contains(&fire));
            if let Some(prev) = last {
                assert!(fire > prev);
            }
            seen.push(fire);
            last = Some(fire);
            now = fire;
        }
    }

    #[test]
    fn test_clock_step_back_does_not_refire() {
        let spec = spec();
        let fire: DateTime<Utc> = next_fire(&spec, "2026-03-01T00:30:00Z".parse().unwrap(), None).unwrap();
        // Wall clock jumps back behind the fire we already handled.
        let stepped_back = fire - Duration::minutes(10);
        let next = next_fire(&spec, stepped_back, Some(fire)).unwrap();
        assert!(next > fire);
    }

    #[test]
    fn test_missed_instants_are_skipped() {
        let spec = spec();
        let now: DateTime<Utc> = "2026-03-02T07:10:00Z".parse().unwrap();
        let next = next_fire(&spec, now, None).unwrap();
        assert!(next > now);
        assert!(next - now <= Duration::hours(1));
    }

    #[tokio::test]
    async fn test_wait_until_past_instant_returns_immediately() {
        let start = std::time::Instant::now();
        wait_until(Utc::now() - Duration::seconds(5)).await;
        assert!(start.elapsed() < std::time::Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_wait_until_sleeps_to_instant() {
        let start = std::time::Instant::now();
        wait_until(Utc::now() + Duration::milliseconds(200)).await;
        assert!(start.elapsed() >= std::time::Duration::from_millis(150));
    }
}
