//! Connection bootstrap.
//!
//! Repositories accept any [`Connection`]; this module is the usual way to
//! get one with the pragmas the repositories are tuned for.
//!
//! # Example YAML
//!
//! ```yaml
//! path: data/app.db
//! foreign_keys: true
//! journal_mode: wal
//! synchronous: normal
//! busy_timeout_ms: 5000
//! ```
//!
//! Every key is optional. Without `path` the database lives in memory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

/// `PRAGMA journal_mode` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JournalMode {
    Delete,
    Truncate,
    Persist,
    Memory,
    #[default]
    Wal,
    Off,
}

impl JournalMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            JournalMode::Delete => "DELETE",
            JournalMode::Truncate => "TRUNCATE",
            JournalMode::Persist => "PERSIST",
            JournalMode::Memory => "MEMORY",
            JournalMode::Wal => "WAL",
            JournalMode::Off => "OFF",
        }
    }
}

/// `PRAGMA synchronous` levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Synchronous {
    Off,
    #[default]
    Normal,
    Full,
    Extra,
}

impl Synchronous {
    fn level(self) -> i64 {
        match self {
            Synchronous::Off => 0,
            Synchronous::Normal => 1,
            Synchronous::Full => 2,
            Synchronous::Extra => 3,
        }
    }
}

/// How to open and tune a connection.
///
/// # Examples
///
/// ```
/// use sqlrepo_sqlite::{ConnectionConfig, JournalMode};
///
/// let config = ConnectionConfig::from_yaml_str("journal_mode: delete").unwrap();
/// assert_eq!(config.journal_mode, JournalMode::Delete);
/// assert!(config.foreign_keys);
/// assert_eq!(config.busy_timeout_ms, 5000);
/// assert!(config.path.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Database file. `None` opens an in-memory database.
    pub path: Option<PathBuf>,
    pub foreign_keys: bool,
    /// Applied to file databases only; in-memory databases keep SQLite's
    /// own journal.
    pub journal_mode: JournalMode,
    pub synchronous: Synchronous,
    /// How long a statement waits on a locked database before failing.
    pub busy_timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            path: None,
            foreign_keys: true,
            journal_mode: JournalMode::default(),
            synchronous: Synchronous::default(),
            busy_timeout_ms: 5000,
        }
    }
}

impl ConnectionConfig {
    /// Defaults for a database file at `path`.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`Io`](crate::RepoError::Io) if the file cannot be read, or
    /// [`Yaml`](crate::RepoError::Yaml) if parsing fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }
}

/// Opens a connection as described by `config`.
///
/// For a file database the parent directory is created first.
pub fn open(config: &ConnectionConfig) -> Result<Connection> {
    let conn = match &config.path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            debug!(path = %path.display(), mode = "file", "opening database");
            let conn = Connection::open(path)?;
            let mode: String = conn.pragma_update_and_check(
                None,
                "journal_mode",
                config.journal_mode.as_str(),
                |row| row.get(0),
            )?;
            debug!(journal_mode = %mode, "journal mode set");
            conn
        }
        None => {
            debug!(mode = "memory", "opening database");
            Connection::open_in_memory()?
        }
    };

    conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
    conn.pragma_update(None, "foreign_keys", config.foreign_keys)?;
    conn.pragma_update(None, "synchronous", config.synchronous.level())?;
    Ok(conn)
}

/// In-memory connection with the default pragmas.
pub fn open_in_memory() -> Result<Connection> {
    open(&ConnectionConfig::default())
}
