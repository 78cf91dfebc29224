pub mod clock;
pub mod controller;
pub mod events;
pub mod reconcile;
pub mod state;
pub mod ticker;

pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::{TimerConfig, TimerController};
pub use events::TimerEvent;
pub use reconcile::{reconcile, Reconciled};
pub use state::{FinishReason, TimerSnapshot, TimerState, TimerStatus};
pub use ticker::{TickDriver, TickFlow, TickHandler};
