//! Error types for repository, query and migration operations.
//!
//! Every failure is surfaced with context (operation, key or statement);
//! nothing is retried or swallowed. [`RepoError::is_not_found`] is the one
//! question callers usually need answered.

use std::error::Error as StdError;
use std::fmt;

use rusqlite::ErrorCode;
use sqlrepo_core::{ConversionError, MultiError, SchemaError};
use thiserror::Error;

/// Boxed error returned by hooks.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Which side of the write a hook runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookStage {
    BeforePut,
    AfterPut,
}

impl fmt::Display for HookStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookStage::BeforePut => f.write_str("before put"),
            HookStage::AfterPut => f.write_str("after put"),
        }
    }
}

/// Which hook failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookOrigin {
    /// The record type's own `BeforePut` / `AfterPut` implementation.
    Model,
    /// The global hook at this position in its list.
    Global(usize),
}

impl fmt::Display for HookOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookOrigin::Model => f.write_str("model"),
            HookOrigin::Global(index) => write!(f, "global #{index}"),
        }
    }
}

/// Errors that can occur in repository, query and migration operations.
#[derive(Debug, Error)]
pub enum RepoError {
    /// SQLite failure outside a specific statement (begin, commit, pragma).
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A statement failed. `sql` is the normalized statement text.
    #[error("{op}: cannot execute query: {source}")]
    Query {
        op: &'static str,
        sql: String,
        #[source]
        source: rusqlite::Error,
    },

    /// Lookup with an empty key; treated as a guaranteed miss.
    #[error("empty key: no rows in result set")]
    EmptyKey,

    /// No row exists for this key.
    #[error("cannot get {0:?}: no rows in result set")]
    MissingKey(String),

    /// The repository configuration does not fit the record type.
    #[error("invalid repository configuration: {0}")]
    Configuration(String),

    /// A cell could not be converted to or from a record field.
    #[error("conversion error: {0}")]
    Conversion(#[from] ConversionError),

    /// A deferred query was executed before this argument was bound.
    #[error("arg {0:?} is not bound yet")]
    Unbound(String),

    /// A bound argument matches no placeholder and no positional slot is
    /// left for it.
    #[error("arg {0:?} matches no placeholder in the query")]
    UnknownArg(String),

    /// A put hook failed; the write was aborted.
    #[error("{stage} hook ({origin}) failed: {source}")]
    Hook {
        stage: HookStage,
        origin: HookOrigin,
        #[source]
        source: BoxError,
    },

    /// Some keys of a batch read were missing.
    #[error(transparent)]
    Partial(#[from] MultiError<RepoError>),

    /// The transaction was already committed or rolled back.
    #[error("transaction already finished")]
    TransactionFinished,

    /// Migration number `version` (1-based) failed.
    #[error("migration {version} failed: {source}")]
    Migration {
        version: u32,
        #[source]
        source: Box<RepoError>,
    },

    /// File system failure while preparing a database file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Connection configuration could not be parsed.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl RepoError {
    /// Returns true for every flavour of "no rows": an empty key, a missing
    /// key, or a single-row query that matched nothing.
    pub fn is_not_found(&self) -> bool {
        match self {
            RepoError::EmptyKey | RepoError::MissingKey(_) => true,
            RepoError::Database(err) | RepoError::Query { source: err, .. } => {
                matches!(err, rusqlite::Error::QueryReturnedNoRows)
            }
            _ => false,
        }
    }

    /// The key of a [`MissingKey`](RepoError::MissingKey) error.
    pub fn missing_key(&self) -> Option<&str> {
        match self {
            RepoError::MissingKey(key) => Some(key),
            _ => None,
        }
    }

    /// Returns true when the statement was aborted through
    /// [`rusqlite::InterruptHandle::interrupt`].
    pub fn is_interrupted(&self) -> bool {
        match self {
            RepoError::Database(err) | RepoError::Query { source: err, .. } => {
                err.sqlite_error_code() == Some(ErrorCode::OperationInterrupted)
            }
            RepoError::Migration { source, .. } => source.is_interrupted(),
            _ => false,
        }
    }

    pub(crate) fn query(op: &'static str, sql: &str) -> impl FnOnce(rusqlite::Error) -> Self + use<> {
        let sql = sql.to_string();
        move |source| RepoError::Query { op, sql, source }
    }
}

impl From<SchemaError> for RepoError {
    fn from(value: SchemaError) -> Self {
        RepoError::Configuration(value.to_string())
    }
}

/// Convenience alias for results with [`RepoError`].
pub type Result<T> = std::result::Result<T, RepoError>;
