//! Version-tracked schema migrations.
//!
//! The applied version lives in SQLite's `PRAGMA user_version`, outside any
//! user table. [`migrate`] runs only the migrations past that version and
//! bumps it after each one succeeds, so an interrupted run resumes at the
//! first migration that did not complete.
//!
//! # Example
//!
//! ```
//! use rusqlite::Connection;
//! use sqlrepo_sqlite::{Migration, migrate, schema_version};
//!
//! let conn = Connection::open_in_memory().unwrap();
//! let migrations = [
//!     Migration::sql("CREATE TABLE notes (id TEXT PRIMARY KEY, body TEXT NOT NULL)"),
//!     Migration::sql("CREATE INDEX notes_body ON notes (body)"),
//! ];
//!
//! let report = migrate(&conn, &migrations).unwrap();
//! assert_eq!((report.from, report.to, report.applied), (0, 2, 2));
//! assert_eq!(schema_version(&conn).unwrap(), 2);
//!
//! // Already current: nothing runs.
//! assert_eq!(migrate(&conn, &migrations).unwrap().applied, 0);
//! ```

use std::fmt;

use rusqlite::Connection;
use tracing::{info, warn};

use crate::error::{RepoError, Result};

type MigrationFn = Box<dyn Fn(&Connection) -> Result<()> + Send + Sync>;

/// One step of the schema history.
pub struct Migration {
    run: MigrationFn,
}

impl Migration {
    /// Migration backed by arbitrary code.
    pub fn new<F>(run: F) -> Self
    where
        F: Fn(&Connection) -> Result<()> + Send + Sync + 'static,
    {
        Self { run: Box::new(run) }
    }

    /// Migration that executes a batch of SQL statements.
    pub fn sql(batch: &'static str) -> Self {
        Self::new(move |conn| Ok(conn.execute_batch(batch)?))
    }

    pub fn run(&self, conn: &Connection) -> Result<()> {
        (self.run)(conn)
    }
}

impl fmt::Debug for Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migration").finish_non_exhaustive()
    }
}

/// Outcome of a [`migrate`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationReport {
    /// Version found before running.
    pub from: u32,
    /// Version after running.
    pub to: u32,
    /// Number of migrations executed.
    pub applied: u32,
}

/// Current state of the schema against a migration list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationStatus {
    /// Persisted version.
    pub current: u32,
    /// Length of the migration list.
    pub latest: u32,
    /// Migrations that [`migrate`] would run.
    pub pending: u32,
}

impl MigrationStatus {
    pub fn is_up_to_date(&self) -> bool {
        self.pending == 0
    }
}

/// Reads the persisted schema version.
///
/// # Errors
///
/// [`RepoError::Configuration`] when the stored version is negative; such a
/// database was not versioned by this runner.
pub fn schema_version(conn: &Connection) -> Result<u32> {
    let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    u32::try_from(version).map_err(|_| {
        RepoError::Configuration(format!("invalid schema version {version}: must not be negative"))
    })
}

fn set_schema_version(conn: &Connection, version: u32) -> Result<()> {
    conn.pragma_update(None, "user_version", i64::from(version))?;
    Ok(())
}

fn latest_version(migrations: &[Migration]) -> Result<u32> {
    u32::try_from(migrations.len()).map_err(|_| {
        RepoError::Configuration(format!("too many migrations: {}", migrations.len()))
    })
}

/// Applies every migration past the persisted version, in order.
///
/// The version is written after each migration body succeeds. A failure
/// stops the run and leaves the version at the last completed migration.
/// A persisted version at or beyond the list length is left untouched.
///
/// # Errors
///
/// [`RepoError::Migration`] with the 1-based number of the failing
/// migration.
pub fn migrate(conn: &Connection, migrations: &[Migration]) -> Result<MigrationReport> {
    let latest = latest_version(migrations)?;
    let from = schema_version(conn)?;

    if from >= latest {
        if from > latest {
            warn!(from, latest, "schema version is ahead of the known migrations");
        }
        return Ok(MigrationReport {
            from,
            to: from,
            applied: 0,
        });
    }

    info!(from, to = latest, "migrating schema");
    for (version, migration) in (1..=latest).zip(migrations).skip(from as usize) {
        migration
            .run(conn)
            .and_then(|()| set_schema_version(conn, version))
            .map_err(|source| RepoError::Migration {
                version,
                source: Box::new(source),
            })?;
        info!(version, "applied migration");
    }

    Ok(MigrationReport {
        from,
        to: latest,
        applied: latest - from,
    })
}

/// Runs the last migration again without reading or writing the version.
///
/// Meant for migrations that are safe to repeat, such as rebuilding a view.
/// An empty list is a no-op.
pub fn rerun_last_migration(conn: &Connection, migrations: &[Migration]) -> Result<()> {
    let Some(last) = migrations.last() else {
        return Ok(());
    };
    let version = latest_version(migrations)?;
    info!(version, "re-running last migration");
    last.run(conn).map_err(|source| RepoError::Migration {
        version,
        source: Box::new(source),
    })
}

/// Compares the persisted version with `migrations` without changing
/// anything.
pub fn migration_status(conn: &Connection, migrations: &[Migration]) -> Result<MigrationStatus> {
    let latest = latest_version(migrations)?;
    let current = schema_version(conn)?;
    Ok(MigrationStatus {
        current,
        latest,
        pending: latest.saturating_sub(current),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn counting(counter: &Arc<AtomicUsize>) -> Migration {
        let counter = Arc::clone(counter);
        Migration::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    #[test]
    fn test_fresh_database_is_version_zero() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(schema_version(&conn).unwrap(), 0);
    }

    #[test]
    fn test_failure_keeps_last_completed_version() {
        let conn = Connection::open_in_memory().unwrap();
        let migrations = [
            Migration::sql("CREATE TABLE a (id INTEGER)"),
            Migration::sql("CREATE TABLE broken ("),
            Migration::sql("CREATE TABLE c (id INTEGER)"),
        ];

        let err = migrate(&conn, &migrations).unwrap_err();
        assert!(matches!(err, RepoError::Migration { version: 2, .. }));
        assert_eq!(schema_version(&conn).unwrap(), 1);

        let status = migration_status(&conn, &migrations).unwrap();
        assert_eq!(
            status,
            MigrationStatus {
                current: 1,
                latest: 3,
                pending: 2
            }
        );
    }

    #[test]
    fn test_version_ahead_of_list_is_left_alone() {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", 5).unwrap();
        let runs = Arc::new(AtomicUsize::new(0));

        let report = migrate(&conn, &[counting(&runs)]).unwrap();
        assert_eq!(report.applied, 0);
        assert_eq!(report.to, 5);
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert_eq!(schema_version(&conn).unwrap(), 5);
    }

    #[test]
    fn test_negative_version_is_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", -3).unwrap();
        let runs = Arc::new(AtomicUsize::new(0));

        assert!(matches!(
            schema_version(&conn),
            Err(RepoError::Configuration(ref msg)) if msg.contains("-3")
        ));
        let err = migrate(&conn, &[counting(&runs)]).unwrap_err();
        assert!(matches!(err, RepoError::Configuration(_)));
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        let version: i64 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, -3);
    }

    #[test]
    fn test_rerun_last_ignores_version() {
        let conn = Connection::open_in_memory().unwrap();
        let first = Arc::new(AtomicUsize::new(0));
        let last = Arc::new(AtomicUsize::new(0));
        let migrations = [counting(&first), counting(&last)];

        migrate(&conn, &migrations).unwrap();
        rerun_last_migration(&conn, &migrations).unwrap();
        rerun_last_migration(&conn, &migrations).unwrap();

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(last.load(Ordering::SeqCst), 3);
        assert_eq!(schema_version(&conn).unwrap(), 2);
    }

    #[test]
    fn test_rerun_last_with_no_migrations() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(rerun_last_migration(&conn, &[]).is_ok());
        assert_eq!(schema_version(&conn).unwrap(), 0);
    }
}
