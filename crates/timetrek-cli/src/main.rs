use clap::{Parser, Subcommand};
use timetrek_core::Config;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "timetrek", version, about = "TimeTrek CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Local accounts and the signed-in session
    Auth {
        #[command(subcommand)]
        action: commands::auth::AuthAction,
    },
    /// Project management
    Project {
        #[command(subcommand)]
        action: commands::project::ProjectAction,
    },
    /// Task management
    Task {
        #[command(subcommand)]
        action: commands::task::TaskAction,
    },
    /// Workspace members
    Member {
        #[command(subcommand)]
        action: commands::member::MemberAction,
    },
    /// Timer control
    Timer {
        #[command(subcommand)]
        action: commands::timer::TimerAction,
    },
    /// Time and completion reports
    Report {
        #[command(subcommand)]
        action: commands::report::ReportAction,
    },
    /// Hosted backend views
    Remote {
        #[command(subcommand)]
        action: commands::remote::RemoteAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

/// Logs go to stderr; stdout carries JSON only.
fn init_tracing() {
    let filter = EnvFilter::try_from_env("TIMETREK_LOG")
        .unwrap_or_else(|_| EnvFilter::new(Config::load_or_default().logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    let result = match cli.command {
        Commands::Auth { action } => commands::auth::run(action),
        Commands::Project { action } => commands::project::run(action),
        Commands::Task { action } => commands::task::run(action),
        Commands::Member { action } => commands::member::run(action),
        Commands::Timer { action } => commands::timer::run(action),
        Commands::Report { action } => commands::report::run(action),
        Commands::Remote { action } => commands::remote::run(action),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
