//! SQLite-backed key-value storage for client-local state.
//!
//! Holds:
//! - The timer record under `timerState`
//! - The signed-in session under `session`

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::{data_dir, DB_FILE};
use crate::error::{DatabaseError, Result};
use crate::timer::{PersistedTimer, TimerStateStore};

/// Fixed key of the persisted timer record.
pub const TIMER_STATE_KEY: &str = "timerState";

/// Key of the signed-in user's id.
pub const SESSION_KEY: &str = "session";

/// SQLite database for client-local state.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `<data_dir>/timetrek.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        Self::open_path(&data_dir()?.join(DB_FILE))
    }

    /// Open the database at an explicit path.
    pub fn open_path(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    pub fn kv_get(&self, key: &str) -> Result<Option<String>, rusqlite::Error> {
        self.conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()
    }

    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn kv_delete(&self, key: &str) -> Result<(), rusqlite::Error> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

impl TimerStateStore for Database {
    fn load_timer(&self) -> Result<Option<PersistedTimer>> {
        match self.kv_get(TIMER_STATE_KEY)? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn save_timer(&self, record: &PersistedTimer) -> Result<()> {
        let json = serde_json::to_string(record)?;
        self.kv_set(TIMER_STATE_KEY, &json)?;
        Ok(())
    }

    fn clear_timer(&self) -> Result<()> {
        debug!("clearing persisted timer state");
        self.kv_delete(TIMER_STATE_KEY)?;
        Ok(())
    }
}
