use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::TimerStatus;

/// Every timer transition produces an Event.
/// The CLI prints them; callers that only care about side effects ignore them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    TimerStarted {
        task_id: String,
        at: DateTime<Utc>,
    },
    TimerPaused {
        task_id: String,
        elapsed_secs: u64,
        at: DateTime<Utc>,
    },
    TimerResumed {
        task_id: String,
        elapsed_secs: u64,
        at: DateTime<Utc>,
    },
    /// Session ended. `committed_minutes` is what the session owes the task;
    /// zero means nothing is committed.
    TimerStopped {
        task_id: String,
        elapsed_secs: u64,
        committed_minutes: u32,
        at: DateTime<Utc>,
    },
    /// Minutes were added to the task's accumulated time.
    TimeCommitted {
        task_id: String,
        minutes: u32,
        time_spent: u32,
        at: DateTime<Utc>,
    },
    /// Session recovered from persisted state at process start.
    TimerRestored {
        task_id: String,
        elapsed_secs: u64,
        status: TimerStatus,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        status: TimerStatus,
        task_id: Option<String>,
        elapsed_secs: u64,
        display: String,
        at: DateTime<Utc>,
    },
}

impl Event {
    /// Short tag used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::TimerStarted { .. } => "timer_started",
            Event::TimerPaused { .. } => "timer_paused",
            Event::TimerResumed { .. } => "timer_resumed",
            Event::TimerStopped { .. } => "timer_stopped",
            Event::TimeCommitted { .. } => "time_committed",
            Event::TimerRestored { .. } => "timer_restored",
            Event::StateSnapshot { .. } => "state_snapshot",
        }
    }
}
