//! # Crash Timer Engine
//!
//! The countdown is always recomputed from the authoritative end timestamp,
//! never decremented locally, so repeated ticks cannot drift. Whoever displays
//! a crashing branch calls [`compute_remaining`] once per tick and releases
//! its [`TickHandle`] as soon as the branch stops crashing or leaves the view.

pub mod clock;
pub mod scheduler;

pub use clock::{Clock, SystemClock};
pub use scheduler::{Scheduler, TickCallback, TickHandle, TokioScheduler};

use chrono::{DateTime, Utc};
use crash::{CrashTimerState, CrashWindow};

/// Computes the live countdown of a branch at `now`.
///
/// Pure: the same window and instant always give the same answer.
///
/// * An inactive branch, or one whose end can be neither read nor derived
///   from `start + duration`, reports `remaining = 0, expired = true`.
/// * Once `now >= end` the result is `remaining = 0, expired = true` no matter
///   how far past the end `now` is.
///
/// An `expired` result only says the local clock has reached the end. The
/// caller must re-fetch the branch to learn whether the crash actually ended.
pub fn compute_remaining<W>(window: &W, now: DateTime<Utc>) -> CrashTimerState
where
    W: CrashWindow + ?Sized,
{
    if !window.is_active() {
        return CrashTimerState::ended();
    }
    let Some(end) = window.effective_end_time() else {
        return CrashTimerState::ended();
    };
    if now >= end {
        return CrashTimerState::ended();
    }

    let remaining = (end - now).num_seconds().max(0) as u64;
    CrashTimerState::new(remaining, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use crash::{BranchCrashState, BranchId};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 8, 20, 0, 0).unwrap()
    }

    fn crashing(duration: u32) -> BranchCrashState {
        BranchCrashState::new(BranchId::new("b1"), "Harbour").started_at(t0(), duration)
    }

    #[test]
    fn test_derives_end_from_start_and_duration() {
        let state = crashing(15);
        let now = t0() + Duration::minutes(14) + Duration::seconds(30);
        let timer = compute_remaining(&state, now);
        assert_eq!(timer.remaining_seconds(), 30);
        assert!(!timer.expired());
    }

    #[test]
    fn test_repeated_calls_are_identical() {
        let now = t0() + Duration::seconds(61);
        for duration in [5, 10, 15, 30, 60] {
            let state = crashing(duration);
            let first = compute_remaining(&state, now);
            let second = compute_remaining(&state, now);
            assert_eq!(first, second);
            assert_eq!(
                first.remaining_seconds(),
                u64::from(duration) * 60 - 61,
                "duration {}",
                duration
            );
        }
    }

    #[test]
    fn test_expired_at_and_after_end() {
        let state = crashing(5);
        let end = t0() + Duration::minutes(5);
        for overshoot in [0, 1, 59, 3600, 86_400 * 30] {
            let timer = compute_remaining(&state, end + Duration::seconds(overshoot));
            assert!(timer.expired(), "overshoot {}", overshoot);
            assert_eq!(timer.remaining_seconds(), 0);
        }
    }

    #[test]
    fn test_explicit_end_time_wins_over_duration() {
        let state = crashing(60).with_end_time(Some(t0() + Duration::minutes(2)));
        let timer = compute_remaining(&state, t0() + Duration::minutes(1));
        assert_eq!(timer.remaining_seconds(), 60);
    }

    #[test]
    fn test_missing_start_and_end_is_not_crashing() {
        let json = r#"{"branchId":"b9","active":true}"#;
        let state: BranchCrashState = serde_json::from_str(json).unwrap();
        assert_eq!(compute_remaining(&state, t0()), CrashTimerState::ended());
    }

    #[test]
    fn test_inactive_branch_reports_ended() {
        let state = crashing(15).ended_at(t0() + Duration::minutes(3));
        assert_eq!(
            compute_remaining(&state, t0() + Duration::minutes(1)),
            CrashTimerState::ended()
        );
    }

    #[test]
    fn test_sub_second_remainder_rounds_down() {
        let state = crashing(5);
        let now = t0() + Duration::minutes(5) - Duration::milliseconds(400);
        let timer = compute_remaining(&state, now);
        assert_eq!(timer.remaining_seconds(), 0);
        assert!(!timer.expired());
    }
}
