//! Derives countdown state from a session record and the current wall clock.
//!
//! A running session never trusts a remembered counter: remaining time is
//! `duration − ((now − startTime) − totalPausedTime)`, so closing the process,
//! sleeping the machine or pausing on another client cannot introduce drift.

use chrono::{DateTime, Utc};

use crate::models::{SessionStatus, TimerSession};

use super::TimerStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciled {
    pub status: TimerStatus,
    pub time_left: u64,
    pub initial_time: u64,
}

impl Reconciled {
    pub const IDLE: Reconciled = Reconciled {
        status: TimerStatus::Idle,
        time_left: 0,
        initial_time: 0,
    };
}

/// Pure and idempotent: the same record and instant always give the same result.
pub fn reconcile(session: Option<&TimerSession>, now: DateTime<Utc>) -> Reconciled {
    let Some(session) = session else {
        return Reconciled::IDLE;
    };

    let initial_time = session.duration_secs();
    match session.status {
        SessionStatus::Running => Reconciled {
            status: TimerStatus::Running,
            time_left: running_time_left(session, now),
            initial_time,
        },
        SessionStatus::Paused => Reconciled {
            status: TimerStatus::Paused,
            time_left: initial_time.saturating_sub(session.elapsed_secs()),
            initial_time,
        },
        SessionStatus::Stopped | SessionStatus::Completed => Reconciled::IDLE,
    }
}

/// Seconds left for a running record, floored and clamped to `[0, duration]`.
pub fn running_time_left(session: &TimerSession, now: DateTime<Utc>) -> u64 {
    let initial = session.duration_secs() as f64;
    let passed_since_start = (now - session.start_time).num_milliseconds() as f64 / 1000.0;
    let paused = if session.total_paused_time.is_finite() {
        session.total_paused_time.max(0.0)
    } else {
        0.0
    };

    let remaining = initial - (passed_since_start - paused);
    remaining.floor().clamp(0.0, initial) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap()
    }

    fn session(status: SessionStatus, minutes: f64) -> TimerSession {
        TimerSession {
            id: "s1".into(),
            user_id: None,
            selected_duration: minutes,
            start_time: t0(),
            end_time: None,
            status,
            elapsed_time: 0.0,
            pause_start_time: None,
            total_paused_time: 0.0,
            name: None,
            note: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn no_session_is_idle() {
        assert_eq!(reconcile(None, t0()), Reconciled::IDLE);
    }

    #[test]
    fn running_subtracts_wall_clock_minus_pauses() {
        let mut s = session(SessionStatus::Running, 25.0);
        s.total_paused_time = 120.0;
        let now = t0() + Duration::seconds(600);

        let result = reconcile(Some(&s), now);
        assert_eq!(result.status, TimerStatus::Running);
        assert_eq!(result.initial_time, 1500);
        assert_eq!(result.time_left, 1500 - (600 - 120));
    }

    #[test]
    fn running_is_idempotent() {
        let s = session(SessionStatus::Running, 25.0);
        let now = t0() + Duration::milliseconds(61_500);
        let first = reconcile(Some(&s), now);
        let second = reconcile(Some(&s), now);
        assert_eq!(first, second);
        assert_eq!(first.time_left, 1438);
    }

    #[test]
    fn running_past_deadline_clamps_to_zero() {
        let s = session(SessionStatus::Running, 0.5);
        let result = reconcile(Some(&s), t0() + Duration::hours(3));
        assert_eq!(result.time_left, 0);
        assert_eq!(result.status, TimerStatus::Running);
    }

    #[test]
    fn start_time_in_future_never_exceeds_duration() {
        let s = session(SessionStatus::Running, 10.0);
        let result = reconcile(Some(&s), t0() - Duration::seconds(5));
        assert_eq!(result.time_left, 600);
    }

    #[test]
    fn paused_ignores_wall_clock() {
        let mut s = session(SessionStatus::Paused, 25.0);
        s.elapsed_time = 600.0;
        for offset in [0, 60, 86_400] {
            let result = reconcile(Some(&s), t0() + Duration::seconds(offset));
            assert_eq!(result.status, TimerStatus::Paused);
            assert_eq!(result.time_left, 900);
        }
    }

    #[test]
    fn terminal_records_reconcile_to_idle() {
        for status in [SessionStatus::Stopped, SessionStatus::Completed] {
            let s = session(status, 25.0);
            assert_eq!(reconcile(Some(&s), t0()), Reconciled::IDLE);
        }
    }
}
