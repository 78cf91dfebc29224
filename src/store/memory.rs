use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    error::{Mutation, StoreError},
    models::{SessionDetails, SessionStatus, StartSession, TimerSession},
    timer::Clock,
};

use super::SessionStore;

/// A mutation as received by [`MemorySessionStore`].
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    Start { selected_duration: f64 },
    Pause { id: String, elapsed_time: u64 },
    Stop { id: String, elapsed_time: u64 },
    Complete { id: String, elapsed_time: u64 },
    Rename { id: String, name: String },
    Details { id: String },
    Delete { id: String },
    List,
}

#[derive(Default)]
struct Inner {
    sessions: Vec<TimerSession>,
    calls: Vec<StoreCall>,
    fail_next: Option<(Mutation, String)>,
}

/// In-process session store with the same bookkeeping as the backend:
/// `startTime` is stamped once, paused spans accumulate into
/// `totalPausedTime`, and terminal sessions reject further lifecycle calls.
#[derive(Clone)]
pub struct MemorySessionStore {
    clock: Arc<dyn Clock>,
    inner: Arc<Mutex<Inner>>,
}

impl MemorySessionStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    /// Makes the next call of `mutation` fail with `message`.
    pub async fn fail_next(&self, mutation: Mutation, message: impl Into<String>) {
        self.inner.lock().await.fail_next = Some((mutation, message.into()));
    }

    pub async fn calls(&self) -> Vec<StoreCall> {
        self.inner.lock().await.calls.clone()
    }

    pub async fn get(&self, id: &str) -> Option<TimerSession> {
        self.inner
            .lock()
            .await
            .sessions
            .iter()
            .find(|s| s.id == id)
            .cloned()
    }

    /// Removes a session behind the engine's back, as another client would.
    pub async fn forget(&self, id: &str) {
        self.inner.lock().await.sessions.retain(|s| s.id != id);
    }

    pub async fn insert(&self, session: TimerSession) {
        self.inner.lock().await.sessions.insert(0, session);
    }
}

impl Inner {
    fn record(&mut self, mutation: Mutation, call: StoreCall) -> Result<(), StoreError> {
        self.calls.push(call);
        match self.fail_next.take() {
            Some((failing, message)) if failing == mutation => Err(StoreError::Api {
                status: 500,
                message,
            }),
            other => {
                self.fail_next = other;
                Ok(())
            }
        }
    }

    fn find_mut(&mut self, id: &str) -> Result<&mut TimerSession, StoreError> {
        self.sessions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })
    }

    fn end(
        &mut self,
        id: &str,
        elapsed_time: u64,
        status: SessionStatus,
        now: DateTime<Utc>,
    ) -> Result<TimerSession, StoreError> {
        let session = self.find_mut(id)?;
        if session.status.is_terminal() {
            return Err(StoreError::Rejected(format!(
                "session {id} is already {}",
                session.status.as_str()
            )));
        }

        if let Some(paused_at) = session.pause_start_time.take() {
            session.total_paused_time += paused_secs(paused_at, now);
        }
        session.status = status;
        session.elapsed_time = elapsed_time as f64;
        session.end_time = Some(now);
        session.updated_at = Some(now);
        Ok(session.clone())
    }
}

fn paused_secs(since: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    ((now - since).num_milliseconds().max(0) as f64 / 1000.0).floor()
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn start(&self, request: &StartSession) -> Result<TimerSession, StoreError> {
        let now = self.clock.now();
        let mut inner = self.inner.lock().await;
        inner.record(
            Mutation::Start,
            StoreCall::Start {
                selected_duration: request.selected_duration,
            },
        )?;

        if !(request.selected_duration.is_finite() && request.selected_duration > 0.0) {
            return Err(StoreError::Rejected("selectedDuration must be positive".into()));
        }

        let session = TimerSession {
            id: Uuid::new_v4().to_string(),
            user_id: None,
            selected_duration: request.selected_duration,
            start_time: now,
            end_time: None,
            status: SessionStatus::Running,
            elapsed_time: 0.0,
            pause_start_time: None,
            total_paused_time: 0.0,
            name: request.name.clone(),
            note: request.note.clone(),
            created_at: Some(now),
            updated_at: Some(now),
        };
        inner.sessions.insert(0, session.clone());
        Ok(session)
    }

    async fn pause(&self, id: &str, elapsed_time: u64) -> Result<TimerSession, StoreError> {
        let now = self.clock.now();
        let mut inner = self.inner.lock().await;
        inner.record(
            Mutation::Pause,
            StoreCall::Pause {
                id: id.to_string(),
                elapsed_time,
            },
        )?;

        let session = inner.find_mut(id)?;
        if session.status.is_terminal() {
            return Err(StoreError::Rejected(format!(
                "session {id} is already {}",
                session.status.as_str()
            )));
        }
        // Pausing again from a locally resumed session closes the earlier span.
        if let Some(paused_at) = session.pause_start_time.take() {
            session.total_paused_time += paused_secs(paused_at, now);
        }
        session.status = SessionStatus::Paused;
        session.elapsed_time = elapsed_time as f64;
        session.pause_start_time = Some(now);
        session.updated_at = Some(now);
        Ok(session.clone())
    }

    async fn stop(&self, id: &str, elapsed_time: u64) -> Result<TimerSession, StoreError> {
        let now = self.clock.now();
        let mut inner = self.inner.lock().await;
        inner.record(
            Mutation::Stop,
            StoreCall::Stop {
                id: id.to_string(),
                elapsed_time,
            },
        )?;
        inner.end(id, elapsed_time, SessionStatus::Stopped, now)
    }

    async fn complete(&self, id: &str, elapsed_time: u64) -> Result<TimerSession, StoreError> {
        let now = self.clock.now();
        let mut inner = self.inner.lock().await;
        inner.record(
            Mutation::Complete,
            StoreCall::Complete {
                id: id.to_string(),
                elapsed_time,
            },
        )?;
        inner.end(id, elapsed_time, SessionStatus::Completed, now)
    }

    async fn rename(&self, id: &str, name: &str) -> Result<TimerSession, StoreError> {
        let now = self.clock.now();
        let mut inner = self.inner.lock().await;
        inner.record(
            Mutation::Rename,
            StoreCall::Rename {
                id: id.to_string(),
                name: name.to_string(),
            },
        )?;
        let session = inner.find_mut(id)?;
        session.name = Some(name.to_string());
        session.updated_at = Some(now);
        Ok(session.clone())
    }

    async fn update_details(
        &self,
        id: &str,
        details: &SessionDetails,
    ) -> Result<TimerSession, StoreError> {
        let now = self.clock.now();
        let mut inner = self.inner.lock().await;
        inner.record(Mutation::Details, StoreCall::Details { id: id.to_string() })?;
        let session = inner.find_mut(id)?;
        if let Some(name) = &details.name {
            session.name = Some(name.clone());
        }
        if let Some(note) = &details.note {
            session.note = Some(note.clone());
        }
        session.updated_at = Some(now);
        Ok(session.clone())
    }

    async fn delete(&self, id: &str) -> Result<String, StoreError> {
        let mut inner = self.inner.lock().await;
        inner.record(Mutation::Delete, StoreCall::Delete { id: id.to_string() })?;
        let before = inner.sessions.len();
        inner.sessions.retain(|s| s.id != id);
        if inner.sessions.len() == before {
            return Err(StoreError::NotFound { id: id.to_string() });
        }
        Ok(id.to_string())
    }

    async fn list(&self) -> Result<Vec<TimerSession>, StoreError> {
        let mut inner = self.inner.lock().await;
        inner.record(Mutation::List, StoreCall::List)?;
        Ok(inner.sessions.clone())
    }
}
