//! Local account commands.

use clap::Subcommand;
use serde_json::json;
use timetrek_core::{AuthError, LocalAuth, SignUp};

use super::{print_json, CmdResult, Context};

#[derive(Subcommand)]
pub enum AuthAction {
    /// Create an account and sign in
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        /// Repeat of --password (default: same as --password)
        #[arg(long)]
        confirm_password: Option<String>,
        /// Workspace to create or join
        #[arg(long)]
        workspace: String,
    },
    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Sign out
    Logout,
    /// Show the signed-in profile
    Whoami,
    /// Request a password reset link
    ResetPassword {
        #[arg(long)]
        email: String,
    },
}

pub fn run(action: AuthAction) -> CmdResult {
    let ctx = Context::open()?;
    let auth = LocalAuth::new(&ctx.db, &ctx.kv)?;

    match action {
        AuthAction::Register {
            name,
            email,
            password,
            confirm_password,
            workspace,
        } => {
            let form = SignUp {
                name,
                email,
                confirm_password: confirm_password.unwrap_or_else(|| password.clone()),
                password,
                workspace_name: workspace,
            };
            print_json(&auth.sign_up(&form)?)?;
        }
        AuthAction::Login { email, password } => {
            print_json(&auth.sign_in(&email, &password)?)?;
        }
        AuthAction::Logout => {
            auth.sign_out()?;
            print_json(&json!({ "signed_in": false }))?;
        }
        AuthAction::Whoami => {
            let profile = auth.current().ok_or(AuthError::NotSignedIn)?;
            print_json(&profile)?;
        }
        AuthAction::ResetPassword { email } => {
            auth.request_password_reset(&email)?;
            print_json(&json!({ "reset_requested": email }))?;
        }
    }
    Ok(())
}
