//! Timer session: the engine plus its persistence and time commits.
//!
//! A `TimerSession` is constructed once per process (usually with
//! [`TimerSession::restore`]) and passed by reference to whatever drives it.
//! Every state change is written to the [`TimerStateStore`]; stopping a
//! session commits its minutes through a [`TimeLedger`].
//!
//! Several processes can share one store (a `timer watch` in one shell, a
//! `timer stop` in another). Before each tick the session compares the stored
//! record with the last one it wrote or read; if they differ, the stored
//! record wins and the engine is rebuilt from it.

use chrono::Utc;
use tracing::{debug, info, warn};

use super::engine::{PersistedTimer, TimerEngine};
use crate::error::Result;
use crate::events::Event;
use crate::task::Task;

/// Durable client-local storage for the single timer record.
pub trait TimerStateStore {
    fn load_timer(&self) -> Result<Option<PersistedTimer>>;
    fn save_timer(&self, record: &PersistedTimer) -> Result<()>;
    fn clear_timer(&self) -> Result<()>;
}

/// Where stopped sessions commit their minutes.
///
/// Implementations read the task's current `time_spent`, add `minutes`, and
/// write it back. This is not an atomic increment.
pub trait TimeLedger {
    fn add_time_to_task(&mut self, task_id: &str, minutes: u32) -> Result<Task>;
}

pub struct TimerSession<S: TimerStateStore> {
    engine: TimerEngine,
    store: S,
    /// The record this session last saw in the store.
    synced: Option<PersistedTimer>,
}

impl<S: TimerStateStore> TimerSession<S> {
    /// Start a fresh idle session without reading the store.
    pub fn new(store: S) -> Self {
        Self {
            engine: TimerEngine::new(),
            store,
            synced: None,
        }
    }

    /// Rebuild the session from the persisted record, if any.
    ///
    /// An unreadable record is logged and cleared; the session starts idle.
    pub fn restore(store: S) -> (Self, Option<Event>) {
        let record = match store.load_timer() {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "discarding unreadable timer state");
                if let Err(e) = store.clear_timer() {
                    warn!(error = %e, "failed to clear unreadable timer state");
                }
                None
            }
        };
        let Some(record) = record else {
            return (Self::new(store), None);
        };

        let engine = TimerEngine::from_persisted(&record);
        let task_id = engine.current_task_id().map(str::to_string);
        let mut session = Self {
            engine,
            store,
            synced: Some(record.clone()),
        };
        let Some(task_id) = task_id else {
            warn!(?record, "persisted timer has no open session, clearing it");
            session.persist();
            return (session, None);
        };
        info!(
            task_id = %task_id,
            elapsed_secs = session.engine.elapsed_secs(),
            status = ?session.engine.status(),
            "timer restored"
        );
        let event = Event::TimerRestored {
            task_id,
            elapsed_secs: session.engine.elapsed_secs(),
            status: session.engine.status(),
            at: Utc::now(),
        };
        (session, Some(event))
    }

    pub fn engine(&self) -> &TimerEngine {
        &self.engine
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn elapsed_time_display(&self) -> String {
        self.engine.elapsed_display()
    }

    pub fn snapshot(&self) -> Event {
        self.engine.snapshot()
    }

    /// Start timing `task_id`, committing any other task's session first.
    pub fn start_timer<L: TimeLedger + ?Sized>(&mut self, task_id: &str, ledger: &mut L) -> Vec<Event> {
        let events = self.engine.start(task_id);
        if events.is_empty() {
            debug!(task_id, "timer already owns this task, ignoring start");
            return events;
        }
        self.persist();

        let mut out = Vec::with_capacity(events.len() + 1);
        for event in events {
            let committed = self.commit(&event, ledger);
            out.push(event);
            out.extend(committed);
        }
        out
    }

    pub fn pause_timer(&mut self) -> Option<Event> {
        let event = self.engine.pause();
        match event {
            Some(_) => self.persist(),
            None => debug!(status = ?self.engine.status(), "pause ignored"),
        }
        event
    }

    pub fn resume_timer(&mut self) -> Option<Event> {
        let event = self.engine.resume();
        match event {
            Some(_) => self.persist(),
            None => debug!(status = ?self.engine.status(), "resume ignored"),
        }
        event
    }

    /// Stop the session and commit its minutes. Returns the stop event
    /// followed by the commit event when one happened.
    pub fn stop_timer<L: TimeLedger + ?Sized>(&mut self, ledger: &mut L) -> Vec<Event> {
        let Some(event) = self.engine.stop() else {
            debug!("stop ignored, timer is idle");
            return Vec::new();
        };
        self.persist();
        let committed = self.commit(&event, ledger);
        let mut out = vec![event];
        out.extend(committed);
        out
    }

    /// One-second cadence hook. Persists the new count.
    ///
    /// Returns false without counting when the session is not running,
    /// including when another process stopped or paused it.
    pub fn tick(&mut self) -> bool {
        if self.engine.is_ticking() {
            self.adopt_stored_record();
        }
        let advanced = self.engine.tick();
        if advanced {
            self.persist();
        }
        advanced
    }

    fn commit<L: TimeLedger + ?Sized>(&self, event: &Event, ledger: &mut L) -> Option<Event> {
        let Event::TimerStopped {
            task_id,
            committed_minutes,
            ..
        } = event
        else {
            return None;
        };
        if *committed_minutes == 0 {
            return None;
        }
        match ledger.add_time_to_task(task_id, *committed_minutes) {
            Ok(task) => {
                info!(
                    task_id = %task_id,
                    minutes = committed_minutes,
                    time_spent = task.time_spent,
                    "time committed"
                );
                Some(Event::TimeCommitted {
                    task_id: task_id.clone(),
                    minutes: *committed_minutes,
                    time_spent: task.time_spent,
                    at: Utc::now(),
                })
            }
            Err(e) => {
                // The task may have been deleted mid-session.
                warn!(task_id = %task_id, minutes = committed_minutes, error = %e, "failed to commit time");
                None
            }
        }
    }

    /// Rebuild the engine from the store when someone else changed it.
    fn adopt_stored_record(&mut self) {
        let stored = match self.store.load_timer() {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "failed to read timer state, keeping local session");
                return;
            }
        };
        if stored == self.synced {
            return;
        }
        info!(
            local = ?self.engine.to_persisted(),
            stored = ?stored,
            "timer state changed elsewhere, adopting stored record"
        );
        self.engine = stored
            .as_ref()
            .map(TimerEngine::from_persisted)
            .unwrap_or_default();
        self.synced = stored;
    }

    fn persist(&mut self) {
        let record = self.engine.to_persisted();
        let result = match &record {
            Some(record) => self.store.save_timer(record),
            None => self.store.clear_timer(),
        };
        match result {
            Ok(()) => self.synced = record,
            Err(e) => warn!(error = %e, "failed to persist timer state"),
        }
    }
}
