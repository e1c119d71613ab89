use chrono::NaiveDate;
use clap::Subcommand;
use serde_json::json;
use timetrek_core::project::default_color;
use timetrek_core::{NewProject, ProjectPatch};

use super::{print_json, split_list, CmdResult, Context};

#[derive(Subcommand)]
pub enum ProjectAction {
    /// Create a new project
    Create {
        /// Project name
        name: String,
        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        start: NaiveDate,
        /// End date (YYYY-MM-DD)
        #[arg(long)]
        end: NaiveDate,
        #[arg(long, default_value = "")]
        description: String,
        /// Display colour, e.g. "#3b82f6"
        #[arg(long)]
        color: Option<String>,
        /// Comma-separated member IDs (default: yourself)
        #[arg(long)]
        members: Option<String>,
    },
    /// List projects with their task counts
    List,
    /// Update a project
    Update {
        /// Project ID
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        color: Option<String>,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
        /// Comma-separated member IDs
        #[arg(long)]
        members: Option<String>,
    },
    /// Delete a project and all of its tasks
    Delete {
        /// Project ID
        id: String,
    },
}

pub fn run(action: ProjectAction) -> CmdResult {
    let ctx = Context::open()?;
    let mut store = ctx.store()?;

    match action {
        ProjectAction::Create {
            name,
            start,
            end,
            description,
            color,
            members,
        } => {
            ctx.require_manager(&store, "create projects")?;
            let created_by = ctx.user_id();
            let members = members
                .map(|m| split_list(&m))
                .unwrap_or_else(|| vec![created_by.clone()]);
            let project = store.add_project(NewProject {
                name,
                description,
                color: color.unwrap_or_else(default_color),
                start_date: start,
                end_date: end,
                created_by,
                members,
            })?;
            print_json(&project)?;
        }
        ProjectAction::List => {
            let rows: Vec<_> = store
                .projects()
                .iter()
                .map(|p| {
                    json!({
                        "project": p,
                        "task_count": store.get_project_tasks(&p.id).len(),
                    })
                })
                .collect();
            print_json(&rows)?;
        }
        ProjectAction::Update {
            id,
            name,
            description,
            color,
            start,
            end,
            members,
        } => {
            ctx.require_manager(&store, "edit projects")?;
            let patch = ProjectPatch {
                name,
                description,
                color,
                start_date: start,
                end_date: end,
                members: members.map(|m| split_list(&m)),
            };
            let project = store.update_project(&id, &patch)?;
            print_json(&project)?;
        }
        ProjectAction::Delete { id } => {
            ctx.require_manager(&store, "delete projects")?;
            let removed = store.delete_project(&id)?;
            print_json(&json!({ "deleted": id, "removed_tasks": removed }))?;
        }
    }
    Ok(())
}
