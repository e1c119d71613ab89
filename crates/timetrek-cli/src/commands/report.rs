use clap::Subcommand;
use timetrek_core::stats::{self, Report, ReportFilter};

use super::{print_json, CmdResult, Context};

#[derive(Subcommand)]
pub enum ReportAction {
    /// Completion, time and status breakdown for one user
    Summary {
        /// User ID (default: yourself)
        #[arg(long)]
        user: Option<String>,
        /// Restrict to one project
        #[arg(long)]
        project_id: Option<String>,
    },
    /// Time per project across the workspace
    Projects,
    /// Time per assignee across the workspace
    Members,
}

pub fn run(action: ReportAction) -> CmdResult {
    let ctx = Context::open()?;
    let store = ctx.store()?;

    match action {
        ReportAction::Summary { user, project_id } => {
            let mut filter = ReportFilter::for_user(user.unwrap_or_else(|| ctx.user_id()));
            if let Some(project_id) = project_id {
                filter = filter.with_project(project_id);
            }
            print_json(&Report::build(store.tasks(), store.projects(), &filter))?;
        }
        ReportAction::Projects => {
            print_json(&stats::project_time_distribution(
                store.tasks(),
                store.projects(),
            ))?;
        }
        ReportAction::Members => {
            print_json(&stats::member_time_distribution(
                store.tasks(),
                store.members(),
            ))?;
        }
    }
    Ok(())
}
