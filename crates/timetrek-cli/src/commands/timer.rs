use std::time::Duration;

use clap::Subcommand;
use timetrek_core::{Database, Event, Ticker, TimerSession};

use super::{print_json, CmdResult, Context};

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start timing a task (commits the current one first)
    Start {
        /// Task ID
        task_id: String,
    },
    /// Pause the running session
    Pause,
    /// Resume a paused session
    Resume,
    /// Stop the session and commit its minutes to the task
    Stop,
    /// Print current timer state as JSON
    Status,
    /// Advance a running session by whole seconds
    Tick {
        #[arg(long, default_value = "1")]
        seconds: u64,
    },
    /// Tick in real time, printing the state after every tick
    Watch {
        /// Stop watching after this many ticks
        #[arg(long)]
        max_ticks: Option<u64>,
    },
}

pub fn run(action: TimerAction) -> CmdResult {
    let ctx = Context::open()?;
    let mut store = ctx.store()?;
    let (mut session, restored) = TimerSession::restore(Database::open()?);
    if let Some(event) = &restored {
        tracing::debug!(kind = event.kind(), "resuming persisted session");
    }

    match action {
        TimerAction::Start { task_id } => {
            if store.get_task_by_id(&task_id).is_none() {
                return Err(format!("Task not found: {task_id}").into());
            }
            print_json(&session.start_timer(&task_id, &mut store))?;
        }
        TimerAction::Pause => {
            print_json(&session.pause_timer().into_iter().collect::<Vec<Event>>())?;
        }
        TimerAction::Resume => {
            print_json(&session.resume_timer().into_iter().collect::<Vec<Event>>())?;
        }
        TimerAction::Stop => {
            print_json(&session.stop_timer(&mut store))?;
        }
        TimerAction::Status => {
            print_json(&session.snapshot())?;
        }
        TimerAction::Tick { seconds } => {
            for _ in 0..seconds {
                if !session.tick() {
                    break;
                }
            }
            print_json(&session.snapshot())?;
        }
        TimerAction::Watch { max_ticks } => {
            let period = Duration::from_millis(ctx.config.timer.tick_interval_ms.max(1));
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()?;
            let ticks = runtime.block_on(Ticker::new(period).run(
                &mut session,
                max_ticks,
                |engine| match serde_json::to_string(&engine.snapshot()) {
                    Ok(line) => println!("{line}"),
                    Err(e) => tracing::warn!(error = %e, "failed to encode snapshot"),
                },
            ));
            tracing::debug!(ticks, "watch finished");
        }
    }
    Ok(())
}
