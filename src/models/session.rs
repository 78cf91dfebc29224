//! Session records as returned by the session store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    Running,
    Paused,
    Stopped,
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Running => "running",
            SessionStatus::Paused => "paused",
            SessionStatus::Stopped => "stopped",
            SessionStatus::Completed => "completed",
        }
    }

    /// `running` or `paused`.
    pub fn is_active(&self) -> bool {
        matches!(self, SessionStatus::Running | SessionStatus::Paused)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }
}

/// Canonical session record. `elapsed_time` is only meaningful at mutation
/// boundaries; while running, elapsed time is derived from `start_time`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimerSession {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Planned duration in minutes; fractional values are allowed.
    pub selected_duration: f64,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    #[serde(default)]
    pub elapsed_time: f64,
    #[serde(default)]
    pub pause_start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_paused_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl TimerSession {
    /// Planned duration in whole seconds.
    pub fn duration_secs(&self) -> u64 {
        minutes_to_secs(self.selected_duration)
    }

    /// Recorded active runtime in whole seconds.
    pub fn elapsed_secs(&self) -> u64 {
        if self.elapsed_time.is_finite() && self.elapsed_time > 0.0 {
            self.elapsed_time.round() as u64
        } else {
            0
        }
    }
}

pub fn minutes_to_secs(minutes: f64) -> u64 {
    if minutes.is_finite() && minutes > 0.0 {
        (minutes * 60.0).round() as u64
    } else {
        0
    }
}

pub fn secs_to_minutes(secs: u64) -> f64 {
    secs as f64 / 60.0
}

/// Mutation responses arrive either bare or wrapped as `{"timerSession": {...}}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SessionEnvelope {
    #[serde(rename_all = "camelCase")]
    Wrapped { timer_session: TimerSession },
    Bare(TimerSession),
}

impl SessionEnvelope {
    pub fn into_session(self) -> TimerSession {
        match self {
            SessionEnvelope::Wrapped { timer_session } => timer_session,
            SessionEnvelope::Bare(session) => session,
        }
    }
}

/// Body of `POST /timers/start`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StartSession {
    pub selected_duration: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Body of `PUT /timers/{id}/details`.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct SessionDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record() -> serde_json::Value {
        json!({
            "_id": "665f1c",
            "userId": "u1",
            "selectedDuration": 25,
            "startTime": "2024-06-01T10:00:00Z",
            "endTime": null,
            "elapsedTime": 0,
            "status": "running",
            "pauseStartTime": null,
            "totalPausedTime": 0,
            "name": "Deep work"
        })
    }

    #[test]
    fn decodes_backend_id_key_and_status() {
        let session: TimerSession = serde_json::from_value(record()).unwrap();
        assert_eq!(session.id, "665f1c");
        assert_eq!(session.status, SessionStatus::Running);
        assert_eq!(session.duration_secs(), 1500);
        assert_eq!(session.name.as_deref(), Some("Deep work"));
        assert!(session.note.is_none());
    }

    #[test]
    fn rejects_unknown_status() {
        let mut value = record();
        value["status"] = json!("exploded");
        assert!(serde_json::from_value::<TimerSession>(value).is_err());
    }

    #[test]
    fn envelope_accepts_wrapped_and_bare() {
        let wrapped: SessionEnvelope =
            serde_json::from_value(json!({ "timerSession": record() })).unwrap();
        let bare: SessionEnvelope = serde_json::from_value(record()).unwrap();
        assert_eq!(wrapped.into_session(), bare.into_session());
    }

    #[test]
    fn fractional_minutes_round_to_seconds() {
        assert_eq!(minutes_to_secs(0.5), 30);
        assert_eq!(minutes_to_secs(61.0 / 60.0), 61);
        assert_eq!(minutes_to_secs(-1.0), 0);
        assert_eq!(minutes_to_secs(f64::NAN), 0);
    }

    #[test]
    fn start_body_skips_missing_fields() {
        let body = StartSession {
            selected_duration: 0.5,
            name: None,
            note: None,
        };
        assert_eq!(
            serde_json::to_value(body).unwrap(),
            json!({ "selectedDuration": 0.5 })
        );
    }
}
