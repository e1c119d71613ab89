pub mod auth;
pub mod config;
pub mod member;
pub mod project;
pub mod remote;
pub mod report;
pub mod task;
pub mod timer;

use serde::Serialize;
use timetrek_core::{
    Config, Database, HostedBackend, LocalAuth, Profile, WorkspaceBackend, WorkspaceDb,
    WorkspaceStore,
};

pub type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// The store a command works on: hosted when `[backend].url` is set,
/// otherwise the local database.
pub type Store<'a> = WorkspaceStore<Box<dyn WorkspaceBackend + 'a>>;

/// Creator id recorded when nobody is signed in.
const LOCAL_USER: &str = "local";

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> CmdResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Split a comma-separated flag value, dropping empty entries.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Local databases plus the identity a command acts as.
pub struct Context {
    pub db: WorkspaceDb,
    pub kv: Database,
    pub config: Config,
    pub profile: Option<Profile>,
    pub workspace_id: String,
}

impl Context {
    pub fn open() -> Result<Self, Box<dyn std::error::Error>> {
        let db = WorkspaceDb::open()?;
        let kv = Database::open()?;
        let config = Config::load()?;
        let profile = LocalAuth::new(&db, &kv)?.current();
        // Signed-in users act in their own workspace.
        let workspace_id = match &profile {
            Some(p) => p.workspace_id.clone(),
            None => config.workspace.id.clone(),
        };
        Ok(Self {
            db,
            kv,
            config,
            profile,
            workspace_id,
        })
    }

    pub fn user_id(&self) -> String {
        self.profile
            .as_ref()
            .map_or_else(|| LOCAL_USER.to_string(), |p| p.id.clone())
    }

    pub fn store(&self) -> timetrek_core::Result<Store<'_>> {
        let backend: Box<dyn WorkspaceBackend + '_> = if self.config.backend.is_configured() {
            tracing::debug!("using hosted backend");
            Box::new(HostedBackend::from_config(&self.config.backend)?)
        } else {
            Box::new(&self.db)
        };
        WorkspaceStore::load(backend, self.workspace_id.clone())
    }

    /// Signed-in members cannot manage projects or people. Without a session
    /// the CLI runs as the local owner.
    pub fn require_manager(
        &self,
        store: &Store<'_>,
        action: &str,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match &self.profile {
            Some(profile) if !store.is_manager(profile) => {
                Err(format!("only workspace managers can {action}").into())
            }
            _ => Ok(()),
        }
    }
}
