mod engine;
mod session;
mod ticker;

pub use engine::{
    format_elapsed, minutes_to_commit, PersistedTimer, TimerEngine, TimerState, TimerStatus,
};
pub use session::{TimeLedger, TimerSession, TimerStateStore};
pub use ticker::Ticker;
