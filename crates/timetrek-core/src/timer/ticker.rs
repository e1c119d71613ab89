//! One-second cadence source for a running session.

use std::time::Duration;

use tokio::time::{self, MissedTickBehavior};

use super::engine::TimerEngine;
use super::session::{TimerSession, TimerStateStore};

/// Drives `TimerSession::tick` on a fixed period.
///
/// Only one ticker runs per session and only while the session is running:
/// `run` returns as soon as the engine stops ticking, including when another
/// process stops or pauses the session through the shared store.
#[derive(Debug, Clone, Copy)]
pub struct Ticker {
    period: Duration,
}

impl Default for Ticker {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(1),
        }
    }
}

impl Ticker {
    pub fn new(period: Duration) -> Self {
        Self { period }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Tick `session` until it stops running or `max_ticks` is reached.
    /// Calls `on_tick` after each advance. Returns the number of ticks.
    pub async fn run<S, F>(
        &self,
        session: &mut TimerSession<S>,
        max_ticks: Option<u64>,
        mut on_tick: F,
    ) -> u64
    where
        S: TimerStateStore,
        F: FnMut(&TimerEngine),
    {
        let mut ticks = 0;
        if !session.engine().is_ticking() {
            return ticks;
        }

        let mut interval = time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of a tokio interval completes immediately.
        interval.tick().await;

        while max_ticks.map_or(true, |max| ticks < max) {
            interval.tick().await;
            if !session.tick() {
                break;
            }
            ticks += 1;
            on_tick(session.engine());
        }
        ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::storage::Database;
    use crate::task::Task;
    use crate::timer::TimeLedger;

    struct NoLedger;

    impl TimeLedger for NoLedger {
        fn add_time_to_task(&mut self, task_id: &str, _minutes: u32) -> Result<Task> {
            Err(crate::error::CoreError::not_found("Task", task_id))
        }
    }

    #[tokio::test]
    async fn idle_session_never_ticks() {
        let mut session = TimerSession::new(Database::open_memory().unwrap());
        let ticks = Ticker::new(Duration::from_millis(1))
            .run(&mut session, Some(3), |_| {})
            .await;
        assert_eq!(ticks, 0);
    }

    #[tokio::test]
    async fn running_session_advances_once_per_period() {
        let mut session = TimerSession::new(Database::open_memory().unwrap());
        session.start_timer("a", &mut NoLedger);
        let mut seen = Vec::new();
        let ticks = Ticker::new(Duration::from_millis(1))
            .run(&mut session, Some(5), |engine| seen.push(engine.elapsed_secs()))
            .await;
        assert_eq!(ticks, 5);
        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
        assert_eq!(session.engine().elapsed_secs(), 5);
    }
}
