use clap::Subcommand;
use serde_json::json;
use timetrek_core::{MemberRole, NewMember};

use super::{print_json, CmdResult, Context};

#[derive(Subcommand)]
pub enum MemberAction {
    /// Add someone to the current workspace
    Add {
        /// User ID
        user_id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        /// member or manager
        #[arg(long, default_value = "member")]
        role: MemberRole,
        #[arg(long)]
        avatar_url: Option<String>,
    },
    /// List workspace members
    List,
    /// Change a member's role
    Role {
        /// User ID
        user_id: String,
        /// member or manager
        role: MemberRole,
    },
    /// Remove a member from the workspace
    Remove {
        /// User ID
        user_id: String,
    },
}

pub fn run(action: MemberAction) -> CmdResult {
    let ctx = Context::open()?;
    let mut store = ctx.store()?;

    match action {
        MemberAction::Add {
            user_id,
            name,
            email,
            role,
            avatar_url,
        } => {
            ctx.require_manager(&store, "add members")?;
            let member = store.add_member(NewMember {
                user_id,
                name,
                email,
                role,
                avatar_url,
            })?;
            print_json(&member)?;
        }
        MemberAction::List => {
            print_json(store.members())?;
        }
        MemberAction::Role { user_id, role } => {
            ctx.require_manager(&store, "change roles")?;
            let member = store.update_member_role(&user_id, role)?;
            print_json(&member)?;
        }
        MemberAction::Remove { user_id } => {
            ctx.require_manager(&store, "remove members")?;
            store.remove_member(&user_id)?;
            print_json(&json!({ "removed": user_id }))?;
        }
    }
    Ok(())
}
