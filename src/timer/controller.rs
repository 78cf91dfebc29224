use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use log::{debug, error, info, warn};
use tokio::sync::{broadcast, watch, Mutex};

use crate::{
    error::{Mutation, StoreError, TimerError, TimerResult},
    history::{HistoryEntry, SessionHistory},
    models::{secs_to_minutes, SessionDetails, SessionStatus, StartSession, TimerSession},
    store::SessionStore,
};

use super::{
    reconcile::{reconcile, running_time_left},
    ticker::{TickDriver, TickFlow, TickHandler},
    Clock, FinishReason, TimerEvent, TimerSnapshot, TimerState, TimerStatus,
};

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct TimerConfig {
    pub tick_interval: Duration,
    /// Remaining seconds at which the pre-expiry cue fires.
    pub warning_threshold_secs: Option<u64>,
    /// Re-derive the countdown from the wall clock every N ticks.
    pub resync_every_ticks: Option<u32>,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            warning_threshold_secs: Some(12),
            resync_every_ticks: Some(10),
        }
    }
}

/// The reconciliation engine. Cheap to clone; all clones drive the same timer.
#[derive(Clone)]
pub struct TimerController {
    state: Arc<Mutex<TimerState>>,
    history: Arc<Mutex<SessionHistory>>,
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    ticker: Arc<TickDriver>,
    tick_generation: Arc<AtomicU64>,
    events: broadcast::Sender<TimerEvent>,
    snapshot_tx: Arc<watch::Sender<TimerSnapshot>>,
    config: TimerConfig,
}

struct SessionTicks {
    controller: TimerController,
    generation: u64,
}

#[async_trait]
impl TickHandler for SessionTicks {
    async fn on_tick(&self) -> TickFlow {
        self.controller.handle_tick(self.generation).await
    }

    async fn on_expire(&self) {
        if let Err(err) = self.controller.complete().await {
            error!("Failed to complete expired session: {err}");
        }
    }
}

impl TimerController {
    pub fn new(store: Arc<dyn SessionStore>, clock: Arc<dyn Clock>, config: TimerConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (snapshot_tx, _) = watch::channel(TimerSnapshot::default());

        Self {
            state: Arc::new(Mutex::new(TimerState::new())),
            history: Arc::new(Mutex::new(SessionHistory::new())),
            store,
            clock,
            ticker: Arc::new(TickDriver::new(config.tick_interval)),
            tick_generation: Arc::new(AtomicU64::new(0)),
            events,
            snapshot_tx: Arc::new(snapshot_tx),
            config,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TimerEvent> {
        self.events.subscribe()
    }

    /// Readout that updates on every tick and mutation.
    pub fn watch(&self) -> watch::Receiver<TimerSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub async fn snapshot(&self) -> TimerSnapshot {
        self.state.lock().await.snapshot()
    }

    pub async fn history(&self) -> Vec<TimerSession> {
        self.history.lock().await.sessions().to_vec()
    }

    pub async fn history_entries(&self) -> Vec<HistoryEntry> {
        self.history.lock().await.entries()
    }

    /// True while a running session exists on the store; the UI may warn
    /// before exiting, but nothing depends on it.
    pub async fn should_confirm_exit(&self) -> bool {
        let state = self.state.lock().await;
        state.status == TimerStatus::Running && state.session.is_some()
    }

    pub async fn is_ticking(&self) -> bool {
        self.ticker.is_running().await
    }

    /// Tears down the tick loop.
    pub async fn shutdown(&self) {
        self.tick_generation.fetch_add(1, Ordering::SeqCst);
        self.ticker.shutdown().await;
    }

    // ---------------------------------------------------------------------
    // Duration selection
    // ---------------------------------------------------------------------

    /// Sets the duration for the next session. Fails with
    /// [`TimerError::ConfirmationRequired`] while a session is active.
    pub async fn select_duration(&self, seconds: u64) -> TimerResult<TimerSnapshot> {
        if seconds == 0 {
            return Err(TimerError::InvalidDuration);
        }

        let mut state = self.state.lock().await;
        if let Some(mutation) = state.in_flight {
            return Err(TimerError::Busy(mutation));
        }
        if state.is_active() {
            return Err(TimerError::ConfirmationRequired);
        }

        state.select_duration(seconds);
        self.publish(&state);
        Ok(state.snapshot())
    }

    /// Confirmed variant of [`select_duration`](Self::select_duration): stops
    /// the active session first.
    pub async fn replace_duration(&self, seconds: u64) -> TimerResult<TimerSnapshot> {
        if seconds == 0 {
            return Err(TimerError::InvalidDuration);
        }

        let active = self.state.lock().await.is_active();
        if active {
            self.stop().await?;
        }
        self.select_duration(seconds).await
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    /// Starts a session for the selected duration. With a paused session
    /// this resumes it instead.
    pub async fn start(
        &self,
        name: Option<String>,
        note: Option<String>,
    ) -> TimerResult<TimerSnapshot> {
        let (duration, name, note) = {
            let mut state = self.state.lock().await;
            if let Some(mutation) = state.in_flight {
                return Err(TimerError::Busy(mutation));
            }

            let status = state.status;
            if status == TimerStatus::Running {
                return Err(TimerError::InvalidTransition {
                    action: "start",
                    status,
                });
            }
            if status == TimerStatus::Paused && state.session.is_some() {
                drop(state);
                return self.resume().await;
            }
            if state.initial_time == 0 {
                return Err(TimerError::InvalidDuration);
            }

            let name = clean_name(name)
                .or_else(|| state.name.clone())
                .unwrap_or_else(|| default_session_name(self.clock.now()));
            let note = note.or_else(|| state.note.clone());
            state.in_flight = Some(Mutation::Start);
            (state.initial_time, name, note)
        };

        let request = StartSession {
            selected_duration: secs_to_minutes(duration),
            name: Some(name),
            note,
        };

        match self.store.start(&request).await {
            Ok(session) => {
                let snapshot = {
                    let mut state = self.state.lock().await;
                    state.in_flight = None;
                    state.begin_session(session.clone());
                    self.publish(&state);
                    state.snapshot()
                };
                info!(
                    "Started session {} for {}s",
                    session.id,
                    snapshot.initial_time
                );
                self.history.lock().await.upsert(session);
                self.start_ticker().await;
                Ok(snapshot)
            }
            Err(err) => {
                self.state.lock().await.in_flight = None;
                Err(self.fail(Mutation::Start, err))
            }
        }
    }

    pub async fn start_with(
        &self,
        seconds: u64,
        name: Option<String>,
        note: Option<String>,
    ) -> TimerResult<TimerSnapshot> {
        self.select_duration(seconds).await?;
        self.start(name, note).await
    }

    pub async fn pause(&self) -> TimerResult<TimerSnapshot> {
        let (prior, id, elapsed) = {
            let mut state = self.state.lock().await;
            let id = state
                .active_id()
                .map(str::to_string)
                .ok_or(TimerError::NoActiveSession)?;
            if state.status != TimerStatus::Running {
                return Err(TimerError::InvalidTransition {
                    action: "pause",
                    status: state.status,
                });
            }
            if let Some(mutation) = state.in_flight {
                return Err(TimerError::Busy(mutation));
            }

            let prior = (state.status, state.time_left);
            state.in_flight = Some(Mutation::Pause);
            state.status = TimerStatus::Paused;
            self.publish(&state);
            (prior, id, state.elapsed_secs())
        };
        self.stop_ticker().await;

        match self.store.pause(&id, elapsed).await {
            Ok(record) => {
                let now = self.clock.now();
                let snapshot = {
                    let mut state = self.state.lock().await;
                    state.in_flight = None;
                    let reconciled = reconcile(Some(&record), now);
                    state.adopt(record.clone(), reconciled);
                    self.publish(&state);
                    state.snapshot()
                };
                info!("Paused session {id} after {elapsed}s");
                self.history.lock().await.upsert(record);
                Ok(snapshot)
            }
            Err(err) => {
                self.recover(&id, prior, &err).await;
                Err(self.fail(Mutation::Pause, err))
            }
        }
    }

    /// Resumes a paused session from the cached record without contacting
    /// the store. The store learns about it at the next pause, stop or
    /// completion.
    pub async fn resume(&self) -> TimerResult<TimerSnapshot> {
        let (snapshot, time_left) = {
            let mut state = self.state.lock().await;
            let session = state.session.clone().ok_or(TimerError::NoActiveSession)?;
            if state.status != TimerStatus::Paused {
                return Err(TimerError::InvalidTransition {
                    action: "resume",
                    status: state.status,
                });
            }
            if let Some(mutation) = state.in_flight {
                return Err(TimerError::Busy(mutation));
            }

            if session.status == SessionStatus::Paused {
                state.time_left = state.initial_time.saturating_sub(session.elapsed_secs());
            }
            state.status = TimerStatus::Running;
            state.resumed_locally = true;
            state.ticks = 0;
            self.publish(&state);
            info!(
                "Resumed session {} locally with {}s left",
                session.id, state.time_left
            );
            (state.snapshot(), state.time_left)
        };

        if time_left == 0 {
            self.complete().await?;
            return Ok(self.snapshot().await);
        }

        self.start_ticker().await;
        Ok(snapshot)
    }

    pub async fn stop(&self) -> TimerResult<TimerSession> {
        let (prior, id, elapsed) = {
            let mut state = self.state.lock().await;
            let id = state
                .active_id()
                .map(str::to_string)
                .ok_or(TimerError::NoActiveSession)?;
            if !matches!(state.status, TimerStatus::Running | TimerStatus::Paused) {
                return Err(TimerError::InvalidTransition {
                    action: "stop",
                    status: state.status,
                });
            }
            if let Some(mutation) = state.in_flight {
                return Err(TimerError::Busy(mutation));
            }

            let prior = (state.status, state.time_left);
            state.in_flight = Some(Mutation::Stop);
            state.status = TimerStatus::Finished(FinishReason::Stopped);
            self.publish(&state);
            (prior, id, state.elapsed_secs())
        };
        self.stop_ticker().await;

        match self.store.stop(&id, elapsed).await {
            Ok(record) => {
                {
                    let mut state = self.state.lock().await;
                    state.finish(FinishReason::Stopped, record.clone());
                    self.publish(&state);
                }
                info!("Stopped session {id} after {elapsed}s");
                self.history.lock().await.upsert(record.clone());
                Ok(record)
            }
            Err(err) => {
                self.recover(&id, prior, &err).await;
                Err(self.fail(Mutation::Stop, err))
            }
        }
    }

    /// Natural expiry: runs when the countdown reaches zero while running.
    pub async fn complete(&self) -> TimerResult<TimerSession> {
        let (id, elapsed) = {
            let mut state = self.state.lock().await;
            let id = state
                .active_id()
                .map(str::to_string)
                .ok_or(TimerError::NoActiveSession)?;
            if state.status != TimerStatus::Running || state.time_left > 0 {
                return Err(TimerError::InvalidTransition {
                    action: "complete",
                    status: state.status,
                });
            }
            if let Some(mutation) = state.in_flight {
                return Err(TimerError::Busy(mutation));
            }

            state.in_flight = Some(Mutation::Complete);
            state.status = TimerStatus::Finished(FinishReason::Completed);
            self.publish(&state);
            (id, state.initial_time)
        };
        self.stop_ticker().await;
        self.emit(TimerEvent::Expired {
            session_id: id.clone(),
        });

        match self.store.complete(&id, elapsed).await {
            Ok(record) => {
                {
                    let mut state = self.state.lock().await;
                    state.finish(FinishReason::Completed, record.clone());
                    self.publish(&state);
                }
                info!("Completed session {id} ({elapsed}s)");
                self.history.lock().await.upsert(record.clone());
                self.emit(TimerEvent::SessionCompleted(record.clone()));
                Ok(record)
            }
            Err(err) => {
                // Left running at zero; the next sync retries the completion.
                self.recover(&id, (TimerStatus::Running, 0), &err).await;
                Err(self.fail(Mutation::Complete, err))
            }
        }
    }

    /// Back to idle. An active session is stopped on the store first.
    pub async fn reset(&self) -> TimerResult<TimerSnapshot> {
        let active = {
            let state = self.state.lock().await;
            if let Some(mutation) = state.in_flight {
                return Err(TimerError::Busy(mutation));
            }
            state.is_active()
        };
        if active {
            self.stop().await?;
        }

        self.stop_ticker().await;
        let mut state = self.state.lock().await;
        state.reset();
        self.publish(&state);
        info!("Timer reset");
        Ok(state.snapshot())
    }

    // ---------------------------------------------------------------------
    // Names, notes, deletion
    // ---------------------------------------------------------------------

    /// Renames the active session, or sets the label for the next start when
    /// nothing is active.
    pub async fn rename(&self, name: &str) -> TimerResult<Option<TimerSession>> {
        let name = clean_name(Some(name.to_string())).ok_or(TimerError::InvalidName)?;
        let active_id = {
            let state = self.state.lock().await;
            state.active_id().map(str::to_string)
        };

        match active_id {
            Some(id) => self.rename_session(&id, &name).await.map(Some),
            None => {
                let mut state = self.state.lock().await;
                state.name = Some(name);
                self.publish(&state);
                Ok(None)
            }
        }
    }

    pub async fn rename_session(&self, id: &str, name: &str) -> TimerResult<TimerSession> {
        let name = clean_name(Some(name.to_string())).ok_or(TimerError::InvalidName)?;

        if let Some(current) = self.known_session(id).await {
            if current.name.as_deref() == Some(name.as_str()) {
                debug!("Session {id} already named {name:?}");
                return Ok(current);
            }
        }

        match self.store.rename(id, &name).await {
            Ok(record) => {
                self.history.lock().await.upsert(record.clone());
                self.update_active_labels(id, Some(&name), None).await;
                info!("Renamed session {id}");
                Ok(record)
            }
            Err(err) => {
                if matches!(err, StoreError::NotFound { .. }) {
                    self.drop_stale(id).await;
                }
                Err(self.fail(Mutation::Rename, err))
            }
        }
    }

    pub async fn update_details(
        &self,
        id: &str,
        name: Option<String>,
        note: Option<String>,
    ) -> TimerResult<TimerSession> {
        let name = match name {
            Some(raw) => Some(clean_name(Some(raw)).ok_or(TimerError::InvalidName)?),
            None => None,
        };
        let details = SessionDetails { name, note };

        match self.store.update_details(id, &details).await {
            Ok(record) => {
                self.history.lock().await.upsert(record.clone());
                self.update_active_labels(id, details.name.as_deref(), details.note.as_deref())
                    .await;
                info!("Updated details of session {id}");
                Ok(record)
            }
            Err(err) => {
                if matches!(err, StoreError::NotFound { .. }) {
                    self.drop_stale(id).await;
                }
                Err(self.fail(Mutation::Details, err))
            }
        }
    }

    /// Deletes a session. Deleting the active session stops it first and
    /// leaves the engine idle.
    pub async fn delete(&self, id: &str) -> TimerResult<()> {
        let stop_first = {
            let state = self.state.lock().await;
            state.active_id() == Some(id) && state.is_active()
        };
        if stop_first {
            match self.stop().await {
                // Already gone on the store; the engine is idle now.
                Ok(_) | Err(TimerError::StaleSession { .. }) => {}
                Err(err) => return Err(err),
            }
        }

        match self.store.delete(id).await {
            Ok(_) => {}
            Err(StoreError::NotFound { .. }) => {
                debug!("Session {id} was already gone on the store");
            }
            Err(err) => return Err(self.fail(Mutation::Delete, err)),
        }

        self.history.lock().await.remove(id);

        let cleared = {
            let mut state = self.state.lock().await;
            let last_matches = state.last_session.as_ref().map(|s| s.id.as_str()) == Some(id);
            if last_matches {
                state.last_session = None;
            }
            if state.active_id() == Some(id) || (state.session.is_none() && last_matches) {
                state.clear_pointer(None);
                state.initial_time = 0;
                self.publish(&state);
                true
            } else {
                false
            }
        };
        if cleared {
            self.stop_ticker().await;
        }
        info!("Deleted session {id}");
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Reconciliation
    // ---------------------------------------------------------------------

    /// Reconciles against a cached record without contacting the store.
    pub async fn restore(&self, cached: Option<TimerSession>) -> TimerSnapshot {
        self.adopt(cached).await
    }

    /// Fetches the session list, refreshes history and reconciles the active
    /// session against it.
    pub async fn sync(&self) -> TimerResult<TimerSnapshot> {
        let sessions = self
            .store
            .list()
            .await
            .map_err(|err| self.fail(Mutation::List, err))?;

        let cached_id = self
            .state
            .lock()
            .await
            .active_id()
            .map(str::to_string);

        let (record, stale) = {
            let mut history = self.history.lock().await;
            history.replace(sessions);
            match cached_id {
                Some(id) if !history.contains(&id) => (history.active().cloned(), Some(id)),
                Some(id) => (history.get(&id).cloned(), None),
                None => (history.active().cloned(), None),
            }
        };

        if let Some(id) = stale {
            self.drop_stale(&id).await;
        }

        Ok(self.adopt(record).await)
    }

    async fn adopt(&self, record: Option<TimerSession>) -> TimerSnapshot {
        let reconciled = reconcile(record.as_ref(), self.clock.now());

        let (snapshot, status, time_left) = {
            let mut state = self.state.lock().await;
            if state.in_flight.is_some() {
                // The pending mutation will hand back the canonical record.
                return state.snapshot();
            }

            match record {
                None => {
                    if state.session.is_some() {
                        state.clear_pointer(None);
                        state.initial_time = 0;
                    }
                }
                Some(record) => {
                    let keep_local = state.active_id() == Some(record.id.as_str())
                        && state.resumed_locally
                        && state.status == TimerStatus::Running
                        && record.status == SessionStatus::Paused;

                    if keep_local {
                        state.name = record.name.clone();
                        state.note = record.note.clone();
                        state.session = Some(record);
                    } else {
                        debug!(
                            "Reconciled session {} as {} with {}s left",
                            record.id, reconciled.status, reconciled.time_left
                        );
                        state.adopt(record, reconciled);
                    }
                }
            }

            self.publish(&state);
            (state.snapshot(), state.status, state.time_left)
        };

        match status {
            TimerStatus::Running if time_left == 0 => {
                if let Err(err) = self.complete().await {
                    warn!("Completion after reconciliation failed: {err}");
                }
                self.snapshot().await
            }
            TimerStatus::Running => {
                self.start_ticker().await;
                snapshot
            }
            _ => {
                self.stop_ticker().await;
                snapshot
            }
        }
    }

    // ---------------------------------------------------------------------
    // Ticking
    // ---------------------------------------------------------------------

    async fn start_ticker(&self) {
        let spawned = self
            .ticker
            .start(|| SessionTicks {
                controller: self.clone(),
                generation: self.tick_generation.fetch_add(1, Ordering::SeqCst) + 1,
            })
            .await;
        if spawned {
            debug!("Tick driver started");
        }
    }

    async fn stop_ticker(&self) {
        self.tick_generation.fetch_add(1, Ordering::SeqCst);
        self.ticker.stop().await;
    }

    async fn handle_tick(&self, generation: u64) -> TickFlow {
        let mut state = self.state.lock().await;
        if self.tick_generation.load(Ordering::SeqCst) != generation
            || state.status != TimerStatus::Running
            || state.in_flight.is_some()
        {
            return TickFlow::Stop;
        }

        let before = state.time_left;
        state.ticks = state.ticks.wrapping_add(1);

        let resync_due = self
            .config
            .resync_every_ticks
            .map(|every| every > 0 && state.ticks % every == 0)
            .unwrap_or(false);
        let wall_clock = if resync_due && !state.resumed_locally {
            state
                .session
                .as_ref()
                .filter(|s| s.status == SessionStatus::Running)
                .map(|s| running_time_left(s, self.clock.now()))
        } else {
            None
        };

        let decremented = before.saturating_sub(1);
        state.time_left = match wall_clock {
            Some(derived) => derived.min(decremented),
            None => decremented,
        };

        self.emit(TimerEvent::Tick {
            time_left: state.time_left,
        });

        if let Some(threshold) = self.config.warning_threshold_secs {
            let crossed = before > threshold && state.time_left <= threshold;
            if crossed && !state.warned && state.time_left > 0 {
                state.warned = true;
                self.emit(TimerEvent::Warning {
                    time_left: state.time_left,
                });
            }
        }

        self.publish(&state);

        if state.time_left == 0 {
            TickFlow::Expire
        } else {
            TickFlow::Continue
        }
    }

    // ---------------------------------------------------------------------
    // Helpers
    // ---------------------------------------------------------------------

    fn publish(&self, state: &TimerState) {
        let snapshot = state.snapshot();
        self.snapshot_tx.send_replace(snapshot.clone());
        self.emit(TimerEvent::StateChanged(snapshot));
    }

    fn emit(&self, event: TimerEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn fail(&self, mutation: Mutation, err: StoreError) -> TimerError {
        warn!("Session store {mutation} failed: {err}");
        let err = TimerError::from_store(mutation, err);
        self.emit(TimerEvent::MutationFailed {
            mutation: mutation.to_string(),
            message: err.to_string(),
        });
        err
    }

    /// Undoes an optimistic transition after a failed mutation.
    async fn recover(&self, id: &str, prior: (TimerStatus, u64), err: &StoreError) {
        if matches!(err, StoreError::NotFound { .. }) {
            self.state.lock().await.in_flight = None;
            self.drop_stale(id).await;
            return;
        }

        let (status, time_left) = prior;
        {
            let mut state = self.state.lock().await;
            state.in_flight = None;
            state.status = status;
            state.time_left = time_left;
            self.publish(&state);
        }
        warn!("Rolled session {id} back to {status}");

        if status == TimerStatus::Running && time_left > 0 {
            self.start_ticker().await;
        }
    }

    async fn drop_stale(&self, id: &str) {
        let was_active = {
            let mut state = self.state.lock().await;
            if state.active_id() == Some(id) {
                state.clear_pointer(None);
                state.initial_time = 0;
                self.publish(&state);
                true
            } else {
                false
            }
        };
        if was_active {
            self.stop_ticker().await;
        }
        self.history.lock().await.remove(id);
        warn!("Session {id} no longer exists on the store");
        self.emit(TimerEvent::StaleSession { id: id.to_string() });
    }

    async fn known_session(&self, id: &str) -> Option<TimerSession> {
        let cached = {
            let state = self.state.lock().await;
            state.session.clone().filter(|s| s.id == id)
        };
        match cached {
            Some(session) => Some(session),
            None => self.history.lock().await.get(id).cloned(),
        }
    }

    async fn update_active_labels(&self, id: &str, name: Option<&str>, note: Option<&str>) {
        let mut state = self.state.lock().await;
        if state.active_id() != Some(id) {
            return;
        }
        if let Some(name) = name {
            state.name = Some(name.to_string());
            if let Some(session) = state.session.as_mut() {
                session.name = Some(name.to_string());
            }
        }
        if let Some(note) = note {
            state.note = Some(note.to_string());
            if let Some(session) = state.session.as_mut() {
                session.note = Some(note.to_string());
            }
        }
        self.publish(&state);
    }
}

fn clean_name(name: Option<String>) -> Option<String> {
    name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())
}

fn default_session_name(now: DateTime<Utc>) -> String {
    format!(
        "Session {}",
        now.with_timezone(&Local).format("%Y-%m-%d %H:%M")
    )
}
