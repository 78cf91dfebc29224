pub mod cache;
pub mod duration;
pub mod error;
pub mod history;
pub mod models;
pub mod settings;
pub mod store;
pub mod timer;

pub use error::{Mutation, StoreError, TimerError, TimerResult};
pub use models::{SessionStatus, TimerSession};
pub use timer::{TimerConfig, TimerController, TimerEvent, TimerSnapshot, TimerStatus};

/// Initializes logging. `RUST_LOG` wins; otherwise `FOCUS_TIMER_DEBUG=1`
/// switches from info to debug.
pub fn init_logging() {
    let level = if settings::debug_enabled() {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level).parse_default_env();
    // A second init (tests, embedding) keeps the first logger.
    let _ = builder.try_init();
}
