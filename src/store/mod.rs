//! The backend of record for timer sessions.
//!
//! Every mutation returns the canonical session record; the engine only ever
//! caches what a store hands back.

use async_trait::async_trait;

use crate::{
    error::StoreError,
    models::{SessionDetails, StartSession, TimerSession},
};

pub mod http;
pub mod memory;

pub use http::HttpSessionStore;
pub use memory::{MemorySessionStore, StoreCall};

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// `POST /timers/start`
    async fn start(&self, request: &StartSession) -> Result<TimerSession, StoreError>;

    /// `PUT /timers/{id}/pause`
    async fn pause(&self, id: &str, elapsed_time: u64) -> Result<TimerSession, StoreError>;

    /// `PUT /timers/{id}/stop`
    async fn stop(&self, id: &str, elapsed_time: u64) -> Result<TimerSession, StoreError>;

    /// `PUT /timers/{id}/complete`. A second completion must be rejected.
    async fn complete(&self, id: &str, elapsed_time: u64) -> Result<TimerSession, StoreError>;

    /// `PUT /timers/{id}`
    async fn rename(&self, id: &str, name: &str) -> Result<TimerSession, StoreError>;

    /// `PUT /timers/{id}/details`
    async fn update_details(
        &self,
        id: &str,
        details: &SessionDetails,
    ) -> Result<TimerSession, StoreError>;

    /// `DELETE /timers/{id}`; returns the deleted id.
    async fn delete(&self, id: &str) -> Result<String, StoreError>;

    /// `GET /timers/me`
    async fn list(&self) -> Result<Vec<TimerSession>, StoreError>;
}
