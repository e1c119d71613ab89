mod config;
pub mod database;
pub mod migrations;
pub mod workspace_db;

pub use config::{BackendConfig, Config, LoggingConfig, TimerConfig, WorkspaceConfig};
pub use database::Database;
pub use workspace_db::WorkspaceDb;

use std::path::PathBuf;

use crate::error::{ConfigError, Result};

/// File name shared by [`Database`] and [`WorkspaceDb`].
pub const DB_FILE: &str = "timetrek.db";

/// Returns `~/.config/timetrek[-dev]/` based on TIMETREK_ENV.
///
/// Set TIMETREK_ENV=dev to use the development data directory.
/// TIMETREK_DATA_DIR, when set, replaces the whole path.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf> {
    let dir = match std::env::var_os("TIMETREK_DATA_DIR") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("TIMETREK_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("timetrek-dev")
            } else {
                base_dir.join("timetrek")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
