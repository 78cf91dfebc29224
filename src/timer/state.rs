use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{error::Mutation, models::TimerSession};

use super::reconcile::Reconciled;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum FinishReason {
    Stopped,
    Completed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum TimerStatus {
    #[default]
    Idle,
    Running,
    Paused,
    Finished(FinishReason),
}

impl TimerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerStatus::Idle => "idle",
            TimerStatus::Running => "running",
            TimerStatus::Paused => "paused",
            TimerStatus::Finished(FinishReason::Stopped) => "stopped",
            TimerStatus::Finished(FinishReason::Completed) => "completed",
        }
    }
}

impl fmt::Display for TimerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Readout handed to the UI after every tick and mutation.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub status: TimerStatus,
    pub time_left: u64,
    pub initial_time: u64,
    pub name: Option<String>,
    pub active_session: Option<TimerSession>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    pub status: TimerStatus,
    pub initial_time: u64,
    pub time_left: u64,
    /// Label for the active session, or the pending label for the next start.
    pub name: Option<String>,
    pub note: Option<String>,
    /// Cached copy of the active session record; `None` once it is terminal.
    pub session: Option<TimerSession>,
    /// Most recent terminal session, kept for display after the pointer clears.
    pub last_session: Option<TimerSession>,
    #[serde(skip)]
    pub in_flight: Option<Mutation>,
    /// Set when a paused session was resumed without contacting the store, so
    /// the cached record still says `paused`.
    #[serde(skip)]
    pub resumed_locally: bool,
    #[serde(skip)]
    pub warned: bool,
    #[serde(skip)]
    pub ticks: u32,
}

impl TimerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            status: self.status,
            time_left: self.time_left,
            initial_time: self.initial_time,
            name: self.name.clone(),
            active_session: self.session.clone(),
        }
    }

    pub fn active_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.id.as_str())
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some() && matches!(self.status, TimerStatus::Running | TimerStatus::Paused)
    }

    /// Seconds actually run so far, derived from the local countdown.
    pub fn elapsed_secs(&self) -> u64 {
        self.initial_time.saturating_sub(self.time_left)
    }

    pub fn select_duration(&mut self, seconds: u64) {
        *self = Self {
            status: TimerStatus::Idle,
            initial_time: seconds,
            time_left: seconds,
            ..Self::default()
        };
    }

    pub fn begin_session(&mut self, session: TimerSession) {
        let initial = session.duration_secs();
        self.status = TimerStatus::Running;
        self.initial_time = initial;
        self.time_left = initial;
        self.name = session.name.clone();
        self.note = session.note.clone();
        self.session = Some(session);
        self.resumed_locally = false;
        self.warned = false;
        self.ticks = 0;
    }

    /// Takes a canonical record and the countdown derived from it.
    pub fn adopt(&mut self, session: TimerSession, reconciled: Reconciled) {
        if reconciled.status == TimerStatus::Idle {
            self.clear_pointer(Some(session));
            self.initial_time = 0;
            return;
        }

        self.status = reconciled.status;
        self.initial_time = reconciled.initial_time;
        self.time_left = reconciled.time_left;
        self.name = session.name.clone();
        self.note = session.note.clone();
        self.session = Some(session);
        self.resumed_locally = false;
        self.warned = false;
        self.ticks = 0;
    }

    pub fn finish(&mut self, reason: FinishReason, record: TimerSession) {
        self.status = TimerStatus::Finished(reason);
        self.time_left = 0;
        self.session = None;
        self.last_session = Some(record);
        self.resumed_locally = false;
        self.in_flight = None;
    }

    /// Drops the active pointer and shows an idle, zeroed countdown.
    pub fn clear_pointer(&mut self, last: Option<TimerSession>) {
        self.status = TimerStatus::Idle;
        self.time_left = 0;
        self.name = None;
        self.note = None;
        self.session = None;
        if last.is_some() {
            self.last_session = last;
        }
        self.resumed_locally = false;
        self.warned = false;
        self.ticks = 0;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
