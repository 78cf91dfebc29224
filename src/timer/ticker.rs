use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickFlow {
    Continue,
    /// Stop quietly; the owner already moved on.
    Stop,
    /// The countdown hit zero; run the expiry hook and stop.
    Expire,
}

#[async_trait]
pub trait TickHandler: Send + Sync + 'static {
    async fn on_tick(&self) -> TickFlow;

    async fn on_expire(&self);
}

struct ActiveLoop {
    handle: JoinHandle<()>,
    cancel_token: CancellationToken,
}

impl ActiveLoop {
    fn is_live(&self) -> bool {
        !self.handle.is_finished() && !self.cancel_token.is_cancelled()
    }
}

/// Cooperative fixed-period tick loop. At most one loop exists at a time.
pub struct TickDriver {
    period: Duration,
    active: Mutex<Option<ActiveLoop>>,
}

impl TickDriver {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            active: Mutex::new(None),
        }
    }

    pub async fn is_running(&self) -> bool {
        self.active
            .lock()
            .await
            .as_ref()
            .map(ActiveLoop::is_live)
            .unwrap_or(false)
    }

    /// Starts ticking unless a loop is already live. `make_handler` is only
    /// called when a new loop is spawned. Returns whether a loop was spawned.
    pub async fn start<H, F>(&self, make_handler: F) -> bool
    where
        H: TickHandler,
        F: FnOnce() -> H,
    {
        let mut guard = self.active.lock().await;
        if guard.as_ref().map(ActiveLoop::is_live).unwrap_or(false) {
            return false;
        }

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(tick_loop(
            self.period,
            make_handler(),
            cancel_token.clone(),
        ));

        *guard = Some(ActiveLoop {
            handle,
            cancel_token,
        });
        true
    }

    /// Signals the loop to stop without waiting for it. Safe to call from
    /// inside a handler; a tick already in progress finishes first.
    pub async fn stop(&self) {
        if let Some(active) = self.active.lock().await.take() {
            active.cancel_token.cancel();
        }
    }

    /// Stops the loop and waits for it to exit. Must not be called from a handler.
    pub async fn shutdown(&self) {
        let active = self.active.lock().await.take();
        if let Some(active) = active {
            active.cancel_token.cancel();
            if let Err(err) = active.handle.await {
                if !err.is_cancelled() {
                    log::error!("tick loop failed to join: {err}");
                }
            }
        }
    }
}

async fn tick_loop<H: TickHandler>(period: Duration, handler: H, cancel_token: CancellationToken) {
    // The first tick lands one full period after start.
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Burst);

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                debug!("tick loop cancelled");
                break;
            }
            _ = interval.tick() => {
                match handler.on_tick().await {
                    TickFlow::Continue => {}
                    TickFlow::Stop => break,
                    TickFlow::Expire => {
                        handler.on_expire().await;
                        break;
                    }
                }
            }
        }
    }
}
