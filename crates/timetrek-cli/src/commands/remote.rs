//! Read-only views of the hosted backend configured under `[backend]`.

use clap::Subcommand;
use timetrek_core::{Config, HostedBackend, WorkspaceBackend};

use super::{print_json, CmdResult};

#[derive(Subcommand)]
pub enum RemoteAction {
    /// List hosted tasks
    Tasks,
    /// List hosted projects
    Projects,
    /// List members of a hosted workspace
    Members {
        /// Workspace ID (default: workspace.id from config)
        #[arg(long)]
        workspace: Option<String>,
    },
}

pub fn run(action: RemoteAction) -> CmdResult {
    let config = Config::load()?;
    let backend = HostedBackend::from_config(&config.backend)?;

    match action {
        RemoteAction::Tasks => print_json(&backend.list_tasks()?)?,
        RemoteAction::Projects => print_json(&backend.list_projects()?)?,
        RemoteAction::Members { workspace } => {
            let workspace = workspace.unwrap_or(config.workspace.id);
            print_json(&backend.list_members(&workspace)?)?;
        }
    }
    Ok(())
}
