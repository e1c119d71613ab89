//! Timer engine implementation.
//!
//! The engine is a pure state machine over a second counter. It does not use
//! internal threads and does not read the clock: the caller drives it by
//! calling `tick()` once per second while it is running.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running(task) <-> Paused(task) -> Idle
//! ```
//!
//! Starting a different task while a session is active stops the current
//! session first; the resulting `TimerStopped` event carries the minutes owed
//! to the old task.
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = TimerEngine::new();
//! engine.start("task-1");
//! // Once per second:
//! engine.tick();
//! let stopped = engine.stop(); // Some(Event::TimerStopped { .. })
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::events::Event;

/// Timer state. Running and paused sessions carry the id of their task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum TimerState {
    #[default]
    Idle,
    Running {
        task_id: String,
    },
    Paused {
        task_id: String,
    },
}

/// Data-free view of [`TimerState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerStatus {
    Idle,
    Running,
    Paused,
}

impl TimerState {
    pub fn status(&self) -> TimerStatus {
        match self {
            TimerState::Idle => TimerStatus::Idle,
            TimerState::Running { .. } => TimerStatus::Running,
            TimerState::Paused { .. } => TimerStatus::Paused,
        }
    }

    pub fn task_id(&self) -> Option<&str> {
        match self {
            TimerState::Idle => None,
            TimerState::Running { task_id } | TimerState::Paused { task_id } => Some(task_id),
        }
    }
}

/// The record kept in client-local storage between runs.
///
/// Field names match the `timerState` record written by earlier clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedTimer {
    pub task_id: Option<String>,
    #[serde(alias = "seconds")]
    pub elapsed_seconds: u64,
    pub is_running: bool,
    pub is_paused: bool,
}

/// Minutes a session of `elapsed_secs` commits to its task.
///
/// Whole minutes, rounded down, but never less than one for a session that
/// ran at all. A session with zero elapsed seconds commits nothing.
pub fn minutes_to_commit(elapsed_secs: u64) -> u32 {
    if elapsed_secs == 0 {
        return 0;
    }
    let minutes = u32::try_from(elapsed_secs / 60).unwrap_or(u32::MAX);
    minutes.max(1)
}

/// Format seconds as zero-padded `HH:MM:SS`. Hours are not wrapped.
pub fn format_elapsed(elapsed_secs: u64) -> String {
    let hours = elapsed_secs / 3600;
    let minutes = (elapsed_secs % 3600) / 60;
    let secs = elapsed_secs % 60;
    format!("{hours:02}:{minutes:02}:{secs:02}")
}

/// Core timer engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerEngine {
    state: TimerState,
    elapsed_secs: u64,
}

impl TimerEngine {
    /// Create an idle engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild an engine from a persisted record.
    ///
    /// A running record comes back running, so ticking resumes from the saved
    /// count. Time that passed while the process was away is not added.
    pub fn from_persisted(record: &PersistedTimer) -> Self {
        let state = match (&record.task_id, record.is_running, record.is_paused) {
            (Some(task_id), _, true) => TimerState::Paused {
                task_id: task_id.clone(),
            },
            (Some(task_id), true, false) => TimerState::Running {
                task_id: task_id.clone(),
            },
            _ => TimerState::Idle,
        };
        let elapsed_secs = if state == TimerState::Idle {
            0
        } else {
            record.elapsed_seconds
        };
        Self {
            state,
            elapsed_secs,
        }
    }

    /// The record to persist for the current state. `None` when idle: an
    /// idle session has nothing to recover.
    pub fn to_persisted(&self) -> Option<PersistedTimer> {
        let task_id = self.state.task_id()?.to_string();
        Some(PersistedTimer {
            task_id: Some(task_id),
            elapsed_seconds: self.elapsed_secs,
            // A paused session is still an open session.
            is_running: true,
            is_paused: matches!(self.state, TimerState::Paused { .. }),
        })
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> &TimerState {
        &self.state
    }

    pub fn status(&self) -> TimerStatus {
        self.state.status()
    }

    pub fn current_task_id(&self) -> Option<&str> {
        self.state.task_id()
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed_secs
    }

    /// The tick source should be active exactly when this is true.
    pub fn is_ticking(&self) -> bool {
        matches!(self.state, TimerState::Running { .. })
    }

    pub fn elapsed_display(&self) -> String {
        format_elapsed(self.elapsed_secs)
    }

    /// Build a full state snapshot event.
    pub fn snapshot(&self) -> Event {
        Event::StateSnapshot {
            status: self.status(),
            task_id: self.current_task_id().map(str::to_string),
            elapsed_secs: self.elapsed_secs,
            display: self.elapsed_display(),
            at: Utc::now(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start timing `task_id`.
    ///
    /// Returns the events produced, in order: a `TimerStopped` for the
    /// previous task when switching, then `TimerStarted`. Starting the task
    /// that already owns the session returns nothing.
    pub fn start(&mut self, task_id: &str) -> Vec<Event> {
        if self.state.task_id() == Some(task_id) {
            return Vec::new();
        }
        // Idle engines have nothing to stop.
        let mut events: Vec<Event> = self.stop().into_iter().collect();
        self.state = TimerState::Running {
            task_id: task_id.to_string(),
        };
        self.elapsed_secs = 0;
        events.push(Event::TimerStarted {
            task_id: task_id.to_string(),
            at: Utc::now(),
        });
        events
    }

    pub fn pause(&mut self) -> Option<Event> {
        match &self.state {
            TimerState::Running { task_id } => {
                let task_id = task_id.clone();
                self.state = TimerState::Paused {
                    task_id: task_id.clone(),
                };
                Some(Event::TimerPaused {
                    task_id,
                    elapsed_secs: self.elapsed_secs,
                    at: Utc::now(),
                })
            }
            _ => None,
        }
    }

    pub fn resume(&mut self) -> Option<Event> {
        match &self.state {
            TimerState::Paused { task_id } => {
                let task_id = task_id.clone();
                self.state = TimerState::Running {
                    task_id: task_id.clone(),
                };
                Some(Event::TimerResumed {
                    task_id,
                    elapsed_secs: self.elapsed_secs,
                    at: Utc::now(),
                })
            }
            _ => None,
        }
    }

    /// End the session. The event reports the minutes owed to the task;
    /// committing them is the caller's job.
    pub fn stop(&mut self) -> Option<Event> {
        let task_id = self.state.task_id()?.to_string();
        let elapsed_secs = self.elapsed_secs;
        self.state = TimerState::Idle;
        self.elapsed_secs = 0;
        Some(Event::TimerStopped {
            task_id,
            elapsed_secs,
            committed_minutes: minutes_to_commit(elapsed_secs),
            at: Utc::now(),
        })
    }

    /// Advance one second. Returns false (and does nothing) unless running.
    pub fn tick(&mut self) -> bool {
        if !self.is_ticking() {
            return false;
        }
        self.elapsed_secs = self.elapsed_secs.saturating_add(1);
        true
    }
}
