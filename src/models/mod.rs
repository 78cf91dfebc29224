pub mod session;

pub use session::{
    minutes_to_secs, secs_to_minutes, SessionDetails, SessionEnvelope, SessionStatus,
    StartSession, TimerSession,
};
