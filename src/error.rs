use std::fmt;

use thiserror::Error;

use crate::timer::TimerStatus;

/// Backend mutations, used to label failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    Start,
    Pause,
    Stop,
    Complete,
    Rename,
    Details,
    Delete,
    List,
}

impl Mutation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mutation::Start => "start",
            Mutation::Pause => "pause",
            Mutation::Stop => "stop",
            Mutation::Complete => "complete",
            Mutation::Rename => "rename",
            Mutation::Details => "details",
            Mutation::Delete => "delete",
            Mutation::List => "list",
        }
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced by a session store.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    #[error("session store transport error: {0}")]
    Transport(String),

    #[error("session store error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("session {id} not found")]
    NotFound { id: String },

    #[error("session store rejected the request: {0}")]
    Rejected(String),

    #[error("session store parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport(value.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value.to_string())
    }
}

/// Engine errors. None of these are fatal: the engine has already reverted
/// to its last known-good state when one is returned.
#[derive(Debug, Error)]
pub enum TimerError {
    #[error("duration must be greater than zero")]
    InvalidDuration,

    #[error("session name must not be empty")]
    InvalidName,

    #[error("no active timer session")]
    NoActiveSession,

    #[error("a timer session is active; confirm to replace it")]
    ConfirmationRequired,

    #[error("{0} already in progress")]
    Busy(Mutation),

    #[error("cannot {action} while timer is {status}")]
    InvalidTransition {
        action: &'static str,
        status: TimerStatus,
    },

    #[error("{mutation} rejected: {message}")]
    MutationRejected { mutation: Mutation, message: String },

    #[error("session {id} no longer exists")]
    StaleSession { id: String },
}

impl TimerError {
    pub(crate) fn from_store(mutation: Mutation, err: StoreError) -> Self {
        match err {
            StoreError::NotFound { id } => TimerError::StaleSession { id },
            StoreError::Api { message, .. } => TimerError::MutationRejected { mutation, message },
            other => TimerError::MutationRejected {
                mutation,
                message: other.to_string(),
            },
        }
    }
}

pub type TimerResult<T> = std::result::Result<T, TimerError>;
