use serde::Serialize;

use crate::{error::Mutation, models::TimerSession};

use super::TimerSnapshot;

/// Side-effect notifications for the UI layer (audio cues, exit guards,
/// transient notices). Delivered over a broadcast channel; slow subscribers
/// may miss ticks but never block the engine.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TimerEvent {
    StateChanged(TimerSnapshot),
    #[serde(rename_all = "camelCase")]
    Tick { time_left: u64 },
    /// Pre-expiry cue.
    #[serde(rename_all = "camelCase")]
    Warning { time_left: u64 },
    /// The countdown reached zero; fired before the completion mutation.
    #[serde(rename_all = "camelCase")]
    Expired { session_id: String },
    SessionCompleted(TimerSession),
    #[serde(rename_all = "camelCase")]
    MutationFailed { mutation: String, message: String },
    /// The cached session no longer exists on the store.
    StaleSession { id: String },
}
