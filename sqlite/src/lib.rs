//! Typed repositories on SQLite.
//!
//! This crate maps [`Record`](sqlrepo_core::Record) types onto SQLite
//! tables through a shared [`rusqlite::Connection`]. It provides two
//! repository flavours, a transactional write path with put hooks, a
//! deferred-bind query template and a version-tracked migration runner.
//!
//! # Architecture
//!
//! - **`config`**: table and primary-key configuration, validated once at
//!   repository construction
//! - **`generic`** / **`singleton`**: the repository façades
//! - **`tx`** and **`hooks`**: the write path and the hooks around it
//! - **`query`**: [`DeferredQuery`], bound after construction
//! - **`migrate`**: schema versioning on `PRAGMA user_version`
//! - **`open`**: connection bootstrap with the recommended pragmas
//!
//! # Quick start
//!
//! ```
//! use sqlrepo_core::{Column, Record};
//! use sqlrepo_sqlite::{Migration, RepoConfig, SingletonRepo, migrate, open_in_memory};
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct Prefs {
//!     owner: String,
//!     theme: String,
//! }
//!
//! impl Record for Prefs {
//!     fn columns() -> Vec<Column<Self>> {
//!         vec![
//!             Column::new("owner", |p: &Prefs| &p.owner, |p: &mut Prefs| &mut p.owner),
//!             Column::new("theme", |p: &Prefs| &p.theme, |p: &mut Prefs| &mut p.theme),
//!         ]
//!     }
//! }
//!
//! let conn = open_in_memory().unwrap();
//! migrate(&conn, &[Migration::sql(
//!     "CREATE TABLE prefs (owner TEXT PRIMARY KEY, theme TEXT NOT NULL)",
//! )])
//! .unwrap();
//!
//! let prefs = SingletonRepo::new(&conn, RepoConfig::<Prefs>::new("prefs", "owner")).unwrap();
//!
//! // Absent rows read as defaults.
//! let mut mine = prefs.get("ada").unwrap();
//! assert_eq!(mine, Prefs { owner: "ada".into(), theme: String::new() });
//!
//! mine.theme = "dark".into();
//! prefs.put(&mut mine).unwrap();
//! assert_eq!(prefs.get("ada").unwrap().theme, "dark");
//! ```
//!
//! # Logging
//!
//! Statements are emitted through [`tracing`] at `trace` level with the
//! fields `method`, `q` and, for key lookups, `key`. Migrations log at
//! `info`. No subscriber is installed here.

mod config;
mod convert;
mod error;
mod generic;
mod hooks;
mod migrate;
mod open;
mod query;
mod singleton;
mod table;
mod tx;

pub use config::RepoConfig;
pub use error::{BoxError, HookOrigin, HookStage, RepoError, Result};
pub use generic::GenericRepo;
pub use hooks::{AfterPut, BeforePut, HookResult, Hooks};
pub use migrate::{
    Migration, MigrationReport, MigrationStatus, migrate, migration_status, rerun_last_migration,
    schema_version,
};
pub use open::{ConnectionConfig, JournalMode, Synchronous, open, open_in_memory};
pub use query::{DeferredQuery, Named, named};
pub use singleton::SingletonRepo;
pub use table::{ExecResult, MultiGet};
pub use tx::Transaction;
