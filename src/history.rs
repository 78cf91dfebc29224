//! Local projection of the user's sessions as listed by the store.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{SessionStatus, TimerSession};

#[derive(Debug, Clone, Default)]
pub struct SessionHistory {
    sessions: Vec<TimerSession>,
}

/// One row of the history view.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    pub name: Option<String>,
    pub note: Option<String>,
    pub planned_secs: u64,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub elapsed_secs: u64,
    pub paused_secs: u64,
    pub status: SessionStatus,
}

impl From<&TimerSession> for HistoryEntry {
    fn from(session: &TimerSession) -> Self {
        Self {
            id: session.id.clone(),
            name: session.name.clone(),
            note: session.note.clone(),
            planned_secs: session.duration_secs(),
            started_at: session.start_time,
            ended_at: session.end_time,
            elapsed_secs: session.elapsed_secs(),
            paused_secs: session.total_paused_time.max(0.0).round() as u64,
            status: session.status,
        }
    }
}

impl SessionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&mut self, sessions: Vec<TimerSession>) {
        self.sessions = sessions;
    }

    /// Replaces the matching entry in place, or prepends a new one.
    pub fn upsert(&mut self, session: TimerSession) {
        match self.sessions.iter_mut().find(|s| s.id == session.id) {
            Some(existing) => *existing = session,
            None => self.sessions.insert(0, session),
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<TimerSession> {
        let index = self.sessions.iter().position(|s| s.id == id)?;
        Some(self.sessions.remove(index))
    }

    pub fn get(&self, id: &str) -> Option<&TimerSession> {
        self.sessions.iter().find(|s| s.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Most recently started session that is still running or paused.
    pub fn active(&self) -> Option<&TimerSession> {
        self.sessions
            .iter()
            .filter(|s| s.status.is_active())
            .max_by_key(|s| s.start_time)
    }

    pub fn sessions(&self) -> &[TimerSession] {
        &self.sessions
    }

    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.sessions.iter().map(HistoryEntry::from).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    fn session(id: &str, status: SessionStatus, offset_mins: i64) -> TimerSession {
        TimerSession {
            id: id.into(),
            user_id: None,
            selected_duration: 25.0,
            start_time: Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap()
                + Duration::minutes(offset_mins),
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
    fn upsert_replaces_in_place_or_prepends() {
        let mut history = SessionHistory::new();
        history.replace(vec![
            session("a", SessionStatus::Completed, 0),
            session("b", SessionStatus::Stopped, 30),
        ]);

        history.upsert(session("c", SessionStatus::Running, 60));
        let ids: Vec<_> = history.sessions().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);

        let mut updated = session("a", SessionStatus::Completed, 0);
        updated.name = Some("renamed".into());
        history.upsert(updated);
        assert_eq!(history.len(), 3);
        assert_eq!(history.sessions()[1].name.as_deref(), Some("renamed"));
    }

    #[test]
    fn remove_is_by_id() {
        let mut history = SessionHistory::new();
        history.replace(vec![session("a", SessionStatus::Completed, 0)]);
        assert!(history.contains("a"));
        assert!(!history.contains("zzz"));

        assert!(history.remove("a").is_some());
        assert!(history.remove("a").is_none());
        assert!(history.is_empty());
    }

    #[test]
    fn active_prefers_latest_non_terminal() {
        let mut history = SessionHistory::new();
        history.replace(vec![
            session("old", SessionStatus::Paused, 0),
            session("done", SessionStatus::Completed, 90),
            session("new", SessionStatus::Running, 60),
        ]);
        assert_eq!(history.active().map(|s| s.id.as_str()), Some("new"));
    }

    #[test]
    fn entries_project_totals() {
        let mut s = session("a", SessionStatus::Stopped, 0);
        s.elapsed_time = 612.4;
        s.total_paused_time = 30.0;
        let mut history = SessionHistory::new();
        history.replace(vec![s]);

        let entry = &history.entries()[0];
        assert_eq!(entry.planned_secs, 1500);
        assert_eq!(entry.elapsed_secs, 612);
        assert_eq!(entry.paused_secs, 30);
        assert_eq!(entry.status, SessionStatus::Stopped);
    }
}
