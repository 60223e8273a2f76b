//! Repository over a multi-row table keyed by a primary key.

use std::collections::HashMap;

use rusqlite::Connection;
use sqlrepo_core::{Record, Value};
use tracing::debug;

use crate::config::RepoConfig;
use crate::error::{RepoError, Result};
use crate::query::DeferredQuery;
use crate::table::{ExecResult, MultiGet, Table};
use crate::tx::Transaction;

/// CRUD access to a table where each primary key identifies one row and a
/// missing row is an error.
///
/// # Examples
///
/// ```
/// use rusqlite::Connection;
/// use sqlrepo_core::{Column, Record};
/// use sqlrepo_sqlite::{GenericRepo, RepoConfig};
///
/// #[derive(Debug, Default, Clone, PartialEq)]
/// struct Book {
///     isbn: String,
///     title: String,
/// }
///
/// impl Record for Book {
///     fn columns() -> Vec<Column<Self>> {
///         vec![
///             Column::new("isbn", |b: &Book| &b.isbn, |b: &mut Book| &mut b.isbn),
///             Column::new("title", |b: &Book| &b.title, |b: &mut Book| &mut b.title),
///         ]
///     }
/// }
///
/// let conn = Connection::open_in_memory().unwrap();
/// conn.execute_batch("CREATE TABLE books (isbn TEXT PRIMARY KEY, title TEXT)").unwrap();
///
/// let repo = GenericRepo::new(&conn, RepoConfig::<Book>::new("books", "isbn")).unwrap();
/// let mut book = Book { isbn: "978-0".into(), title: "Dune".into() };
/// repo.put(&mut book).unwrap();
///
/// assert_eq!(repo.get("978-0").unwrap(), book);
/// assert!(repo.get("978-1").unwrap_err().is_not_found());
/// ```
pub struct GenericRepo<'conn, T> {
    table: Table<'conn, T>,
}

impl<'conn, T: Record> GenericRepo<'conn, T> {
    /// Binds `config` to `conn`.
    ///
    /// # Errors
    ///
    /// [`RepoError::Configuration`] when an identifier is not a plain SQL
    /// name, the record's column list is invalid, or the primary key is not
    /// one of the mapped columns.
    pub fn new(conn: &'conn Connection, config: RepoConfig<T>) -> Result<Self> {
        let table = Table::new(conn, config)?;
        debug!(table = %table.spec().table, kind = "generic", "repository ready");
        Ok(Self { table })
    }

    pub fn count(&self) -> Result<i64> {
        self.table.count()
    }

    /// Opens a write transaction for several puts.
    pub fn begin_tx(&self) -> Result<Transaction<'_, T>> {
        self.table.begin_tx()
    }

    /// Inserts or replaces `model` in a transaction of its own.
    pub fn put(&self, model: &mut T) -> Result<()> {
        self.table.put(model)
    }

    /// Every row, in table scan order.
    pub fn list(&self) -> Result<Vec<T>> {
        self.table.list()
    }

    /// Row stored under `key`.
    ///
    /// # Errors
    ///
    /// [`RepoError::EmptyKey`] for an empty key (no query is issued) and
    /// [`RepoError::MissingKey`] when no row matches.
    pub fn get(&self, key: &str) -> Result<T> {
        if key.is_empty() {
            return Err(RepoError::EmptyKey);
        }
        self.table
            .get_row("get", key)?
            .ok_or_else(|| RepoError::MissingKey(key.to_string()))
    }

    /// Rows for `keys`, aligned with the input.
    ///
    /// Slot `i` holds the row for `keys[i]`, or `None` on a miss. The
    /// aggregate is `Some` iff at least one slot missed and records
    /// [`RepoError::MissingKey`] (or [`RepoError::EmptyKey`]) at each missed
    /// index. Hits are always populated, even alongside misses. A key
    /// matches exactly the rows [`get`](Self::get) would return for it, so
    /// `"03"` finds the row keyed 3 in an `INTEGER` key column.
    ///
    /// An empty `keys` returns `(vec![], None)` without querying.
    pub fn get_multi<S: AsRef<str>>(&self, keys: &[S]) -> Result<MultiGet<T>> {
        self.table.get_multi(keys)
    }

    /// Deletes the row under `key`. Deleting a missing key succeeds.
    pub fn delete_key(&self, key: &str) -> Result<()> {
        self.table.delete_key(key)
    }

    /// Deletes the row whose primary key matches `model`'s.
    pub fn delete(&self, model: &T) -> Result<()> {
        self.table.delete(model)
    }

    /// Whether a row exists under `key`. An empty key is `false` without
    /// querying.
    pub fn exists(&self, key: &str) -> Result<bool> {
        self.table.exists(key)
    }

    /// First row of a caller-supplied query.
    pub fn query(&self, sql: &str, params: &[Value]) -> Result<T> {
        self.table.query(sql, params)
    }

    pub fn query_list(&self, sql: &str, params: &[Value]) -> Result<Vec<T>> {
        self.table.query_list(sql, params)
    }

    /// Rows of a caller-supplied query keyed by their primary key, rendered
    /// as text.
    pub fn query_map(&self, sql: &str, params: &[Value]) -> Result<HashMap<String, T>> {
        self.table.query_map(sql, params)
    }

    /// Executes a write or DDL statement.
    pub fn exec(&self, sql: &str, params: &[Value]) -> Result<ExecResult> {
        self.table.exec(sql, params)
    }

    /// Reusable existence check. Bind the primary-key column name before
    /// running it.
    ///
    /// ```
    /// # use rusqlite::Connection;
    /// # use sqlrepo_core::{Column, Record};
    /// # use sqlrepo_sqlite::{GenericRepo, RepoConfig, named};
    /// # #[derive(Default)]
    /// # struct Tag { name: String }
    /// # impl Record for Tag {
    /// #     fn columns() -> Vec<Column<Self>> {
    /// #         vec![Column::new("name", |t: &Tag| &t.name, |t: &mut Tag| &mut t.name)]
    /// #     }
    /// # }
    /// # let conn = Connection::open_in_memory().unwrap();
    /// # conn.execute_batch("CREATE TABLE tags (name TEXT PRIMARY KEY)").unwrap();
    /// let repo = GenericRepo::new(&conn, RepoConfig::<Tag>::new("tags", "name")).unwrap();
    /// let mut exists = repo.exists_query();
    /// assert!(exists.query_value().is_err());
    /// assert!(!exists.bind([named("name", "rust")]).query_value().unwrap());
    /// ```
    pub fn exists_query(&self) -> DeferredQuery<'conn, bool> {
        self.table.exists_query()
    }
}
