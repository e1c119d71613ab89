//! Task management commands for CLI.

use chrono::{Local, NaiveDate};
use clap::Subcommand;
use serde_json::json;
use timetrek_core::task::{tasks_due_on, timer_candidates};
use timetrek_core::{NewTask, TaskFilter, TaskPatch, TaskPriority, TaskStatus};

use super::{print_json, split_list, CmdResult, Context};

#[derive(Subcommand)]
pub enum TaskAction {
    /// Create a new task
    Create {
        /// Task title
        title: String,
        /// Owning project ID
        #[arg(long)]
        project_id: String,
        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: NaiveDate,
        /// Task description
        #[arg(long, default_value = "")]
        description: String,
        /// Comma-separated assignee IDs (default: yourself)
        #[arg(long)]
        assign: Option<String>,
        /// low, medium or high
        #[arg(long, default_value = "medium")]
        priority: TaskPriority,
        /// todo, in-progress or completed
        #[arg(long, default_value = "todo")]
        status: TaskStatus,
        /// Estimated minutes
        #[arg(long, default_value = "0")]
        estimate: u32,
    },
    /// List tasks
    List {
        /// Filter by status
        #[arg(long)]
        status: Option<TaskStatus>,
        /// Filter by project ID
        #[arg(long)]
        project_id: Option<String>,
        /// Only tasks assigned to you
        #[arg(long)]
        mine: bool,
    },
    /// Get task details
    Get {
        /// Task ID
        id: String,
    },
    /// Update a task
    Update {
        /// Task ID
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        project_id: Option<String>,
        /// Comma-separated assignee IDs
        #[arg(long)]
        assign: Option<String>,
        #[arg(long)]
        priority: Option<TaskPriority>,
        #[arg(long)]
        status: Option<TaskStatus>,
        #[arg(long)]
        due: Option<NaiveDate>,
        /// Estimated minutes
        #[arg(long)]
        estimate: Option<u32>,
        /// Accumulated minutes
        #[arg(long)]
        spent: Option<u32>,
    },
    /// Delete a task
    Delete {
        /// Task ID
        id: String,
    },
    /// Advance status: todo -> in-progress -> completed -> todo
    Cycle {
        /// Task ID
        id: String,
    },
    /// Tasks due on a date (default: today)
    Due {
        date: Option<NaiveDate>,
    },
    /// Tasks the timer can be started on
    Candidates,
}

pub fn run(action: TaskAction) -> CmdResult {
    let ctx = Context::open()?;
    let mut store = ctx.store()?;

    match action {
        TaskAction::Create {
            title,
            project_id,
            due,
            description,
            assign,
            priority,
            status,
            estimate,
        } => {
            let user_id = ctx.user_id();
            let assigned_to = assign
                .map(|a| split_list(&a))
                .unwrap_or_else(|| vec![user_id.clone()]);
            if store.get_project_by_id(&project_id).is_none() {
                return Err(format!("Project not found: {project_id}").into());
            }
            let task = store.add_task(NewTask {
                title,
                description,
                project_id,
                user_id,
                assigned_to,
                priority,
                status,
                due_date: due,
                time_estimate: estimate,
                time_spent: 0,
            })?;
            print_json(&task)?;
        }
        TaskAction::List {
            status,
            project_id,
            mine,
        } => {
            let filter = TaskFilter { status, project_id };
            let user_id = ctx.user_id();
            let tasks: Vec<_> = filter
                .apply(store.tasks())
                .into_iter()
                .filter(|t| !mine || t.is_assigned_to(&user_id))
                .collect();
            print_json(&tasks)?;
        }
        TaskAction::Get { id } => {
            let task = store
                .get_task_by_id(&id)
                .ok_or(format!("Task not found: {id}"))?;
            print_json(&json!({
                "task": task,
                "progress_percent": task.progress_percent(),
            }))?;
        }
        TaskAction::Update {
            id,
            title,
            description,
            project_id,
            assign,
            priority,
            status,
            due,
            estimate,
            spent,
        } => {
            let patch = TaskPatch {
                title,
                description,
                project_id,
                assigned_to: assign.map(|a| split_list(&a)),
                priority,
                status,
                due_date: due,
                time_estimate: estimate,
                time_spent: spent,
            };
            if patch.is_empty() {
                return Err("nothing to update".into());
            }
            let task = store.update_task(&id, &patch)?;
            print_json(&task)?;
        }
        TaskAction::Delete { id } => {
            store.delete_task(&id)?;
            print_json(&json!({ "deleted": id }))?;
        }
        TaskAction::Cycle { id } => {
            let current = store
                .get_task_by_id(&id)
                .ok_or(format!("Task not found: {id}"))?
                .status;
            let patch = TaskPatch {
                status: Some(current.next()),
                ..TaskPatch::default()
            };
            let task = store.update_task(&id, &patch)?;
            print_json(&task)?;
        }
        TaskAction::Due { date } => {
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            print_json(&tasks_due_on(store.tasks(), date))?;
        }
        TaskAction::Candidates => {
            print_json(&timer_candidates(store.tasks()))?;
        }
    }
    Ok(())
}
