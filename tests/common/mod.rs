#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::{
    broadcast::{self, error::TryRecvError},
    Semaphore,
};

use focus_timer_lib::{
    models::{SessionDetails, StartSession, TimerSession},
    store::{MemorySessionStore, SessionStore},
    timer::ManualClock,
    StoreError, TimerConfig, TimerController, TimerEvent,
};

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap()
}

/// Engine over an in-memory store, with the wall clock and tokio's paused
/// clock advanced in lockstep.
pub struct Harness {
    pub clock: ManualClock,
    pub store: Arc<MemorySessionStore>,
    pub controller: TimerController,
    pub events: broadcast::Receiver<TimerEvent>,
    pub seen: Vec<TimerEvent>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(TimerConfig::default())
    }

    pub fn with_config(config: TimerConfig) -> Self {
        let clock = ManualClock::new(t0());
        let store = Arc::new(MemorySessionStore::new(Arc::new(clock.clone())));
        let controller = TimerController::new(store.clone(), Arc::new(clock.clone()), config);
        Self::assemble(clock, store, controller)
    }

    /// Pause calls wait for a permit on the returned semaphore.
    pub fn with_gated_pause() -> (Self, Arc<Semaphore>) {
        let clock = ManualClock::new(t0());
        let store = Arc::new(MemorySessionStore::new(Arc::new(clock.clone())));
        let gate = Arc::new(Semaphore::new(0));
        let gated = GatedPauseStore {
            inner: store.clone(),
            gate: gate.clone(),
        };
        let controller = TimerController::new(
            Arc::new(gated),
            Arc::new(clock.clone()),
            TimerConfig::default(),
        );
        (Self::assemble(clock, store, controller), gate)
    }

    fn assemble(
        clock: ManualClock,
        store: Arc<MemorySessionStore>,
        controller: TimerController,
    ) -> Self {
        let events = controller.subscribe();
        Self {
            clock,
            store,
            controller,
            events,
            seen: Vec::new(),
        }
    }

    /// Second engine sharing the store and clock, as after a page reload.
    pub fn reload(&self) -> TimerController {
        TimerController::new(
            self.store.clone(),
            Arc::new(self.clock.clone()),
            TimerConfig::default(),
        )
    }

    pub async fn advance(&mut self, secs: u64) {
        for _ in 0..secs {
            self.clock.advance_secs(1);
            tokio::time::advance(Duration::from_secs(1)).await;
            settle().await;
            self.drain();
        }
    }

    /// Moves only the wall clock, as if the process had been away.
    pub fn advance_wall_clock(&self, secs: i64) {
        self.clock.advance_secs(secs);
    }

    pub fn drain(&mut self) {
        loop {
            match self.events.try_recv() {
                Ok(event) => self.seen.push(event),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
    }

    pub fn count(&self, pred: impl Fn(&TimerEvent) -> bool) -> usize {
        self.seen.iter().filter(|e| pred(e)).count()
    }

    pub async fn active(&self) -> TimerSession {
        self.controller
            .snapshot()
            .await
            .active_session
            .expect("an active session")
    }
}

pub async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

/// Delegates to the memory store; `pause` blocks until the gate hands out a
/// permit.
struct GatedPauseStore {
    inner: Arc<MemorySessionStore>,
    gate: Arc<Semaphore>,
}

#[async_trait]
impl SessionStore for GatedPauseStore {
    async fn start(&self, request: &StartSession) -> Result<TimerSession, StoreError> {
        self.inner.start(request).await
    }

    async fn pause(&self, id: &str, elapsed_time: u64) -> Result<TimerSession, StoreError> {
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| StoreError::Transport("gate closed".into()))?;
        self.inner.pause(id, elapsed_time).await
    }

    async fn stop(&self, id: &str, elapsed_time: u64) -> Result<TimerSession, StoreError> {
        self.inner.stop(id, elapsed_time).await
    }

    async fn complete(&self, id: &str, elapsed_time: u64) -> Result<TimerSession, StoreError> {
        self.inner.complete(id, elapsed_time).await
    }

    async fn rename(&self, id: &str, name: &str) -> Result<TimerSession, StoreError> {
        self.inner.rename(id, name).await
    }

    async fn update_details(
        &self,
        id: &str,
        details: &SessionDetails,
    ) -> Result<TimerSession, StoreError> {
        self.inner.update_details(id, details).await
    }

    async fn delete(&self, id: &str) -> Result<String, StoreError> {
        self.inner.delete(id).await
    }

    async fn list(&self) -> Result<Vec<TimerSession>, StoreError> {
        self.inner.list().await
    }
}
