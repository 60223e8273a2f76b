//! Deferred-bind query templates.
//!
//! A [`DeferredQuery`] is built once with the names of the arguments it
//! needs and executed any number of times after those names are bound.
//! Executing while a name is still unbound fails with
//! [`RepoError::Unbound`] before anything reaches SQLite.
//!
//! # Example
//!
//! ```
//! use rusqlite::Connection;
//! use sqlrepo_sqlite::{DeferredQuery, named};
//!
//! let conn = Connection::open_in_memory().unwrap();
//! conn.execute_batch("CREATE TABLE t (id INTEGER); INSERT INTO t VALUES (7);").unwrap();
//!
//! let sql = "SELECT COUNT(*) > 0 FROM t WHERE id = :id";
//! let mut q = DeferredQuery::<bool>::new(&conn, sql, ["id"]);
//! assert!(q.query_value().is_err());
//!
//! assert!(q.bind([named("id", 7)]).query_value().unwrap());
//! assert!(!q.bind([named("id", 8)]).query_value().unwrap());
//! ```

use std::marker::PhantomData;

use rusqlite::types::FromSql;
use rusqlite::{Connection, Row, Rows, Statement};
use sqlrepo_core::{Record, Schema, Value, normalize_query};
use tracing::trace;

use crate::convert::{column_names, read_record, to_sql};
use crate::error::{RepoError, Result};

/// Placeholder prefixes SQLite accepts for named parameters.
const NAMED_PREFIXES: [char; 3] = [':', '@', '$'];

/// A named argument for [`DeferredQuery::bind`].
#[derive(Debug, Clone, PartialEq)]
pub struct Named {
    pub name: String,
    pub value: Value,
}

/// Builds a [`Named`] argument.
pub fn named(name: impl Into<String>, value: impl Into<Value>) -> Named {
    Named {
        name: name.into(),
        value: value.into(),
    }
}

/// A query template whose arguments are supplied after construction.
///
/// `V` is the result type: a [`Record`] for [`query`](Self::query) or any
/// [`FromSql`] scalar for [`query_value`](Self::query_value).
///
/// Bindings are cumulative and sticky: they survive execution, and binding
/// a name again replaces its value. [`reset`](Self::reset) clears them.
pub struct DeferredQuery<'conn, V> {
    conn: &'conn Connection,
    sql: String,
    pending: Vec<String>,
    args: Vec<Named>,
    _result: PhantomData<fn() -> V>,
}

impl<'conn, V> DeferredQuery<'conn, V> {
    /// Creates a query over `sql` that refuses to run until every name in
    /// `pending` is bound.
    pub fn new<I, S>(conn: &'conn Connection, sql: &str, pending: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            conn,
            sql: normalize_query(sql),
            pending: pending.into_iter().map(Into::into).collect(),
            args: Vec::new(),
            _result: PhantomData,
        }
    }

    /// Normalized statement text.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Binds arguments, replacing earlier values bound under the same name.
    pub fn bind<I>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = Named>,
    {
        for arg in args {
            match self.args.iter_mut().find(|bound| bound.name == arg.name) {
                Some(bound) => bound.value = arg.value,
                None => self.args.push(arg),
            }
        }
        self
    }

    /// Required names not bound yet, in declaration order.
    pub fn unbound(&self) -> impl Iterator<Item = &str> + '_ {
        self.pending
            .iter()
            .filter(|name| !self.args.iter().any(|arg| &arg.name == *name))
            .map(String::as_str)
    }

    /// Drops every binding.
    pub fn reset(&mut self) -> &mut Self {
        self.args.clear();
        self
    }

    fn ensure_bound(&self) -> Result<()> {
        match self.unbound().next() {
            Some(name) => Err(RepoError::Unbound(name.to_string())),
            None => Ok(()),
        }
    }

    /// Prepares the statement and binds every argument: to its named
    /// placeholder when the template has one, otherwise to the next
    /// positional slot no named placeholder occupies.
    fn prepare(&self, op: &'static str) -> Result<Statement<'conn>> {
        self.ensure_bound()?;
        trace!(method = op, q = %self.sql, args = self.args.len(), "SQL");

        let mut stmt = self
            .conn
            .prepare(&self.sql)
            .map_err(RepoError::query(op, &self.sql))?;

        let mut named_slots = Vec::with_capacity(self.args.len());
        for arg in &self.args {
            named_slots.push(
                placeholder_index(&stmt, &arg.name).map_err(RepoError::query(op, &self.sql))?,
            );
        }

        let mut claimed = vec![false; stmt.parameter_count() + 1];
        for index in named_slots.iter().flatten() {
            claimed[*index] = true;
        }
        let mut free = (1..claimed.len()).filter(|index| !claimed[*index]);

        for (arg, slot) in self.args.iter().zip(named_slots) {
            let index = match slot {
                Some(index) => index,
                None => free
                    .next()
                    .ok_or_else(|| RepoError::UnknownArg(arg.name.clone()))?,
            };
            stmt.raw_bind_parameter(index, to_sql(&arg.value))
                .map_err(RepoError::query(op, &self.sql))?;
        }

        Ok(stmt)
    }
}

impl<V: Record> DeferredQuery<'_, V> {
    /// Runs the query and decodes the first row.
    ///
    /// # Errors
    ///
    /// [`RepoError::Unbound`] when a required name is missing; a not-found
    /// error (see [`RepoError::is_not_found`]) when no row matches.
    pub fn query(&mut self) -> Result<V> {
        const OP: &str = "DeferredQuery::query";

        let mut stmt = self.prepare(OP)?;
        let names = column_names(&stmt);
        let schema = Schema::<V>::new()?;
        let mut rows = stmt.raw_query();
        let row = first_row(&mut rows, OP, &self.sql)?;
        read_record(row, &names, &schema)
    }
}

impl<V: FromSql> DeferredQuery<'_, V> {
    /// Runs the query and reads the first column of the first row.
    pub fn query_value(&mut self) -> Result<V> {
        const OP: &str = "DeferredQuery::query_value";

        let mut stmt = self.prepare(OP)?;
        let mut rows = stmt.raw_query();
        let row = first_row(&mut rows, OP, &self.sql)?;
        row.get(0).map_err(RepoError::query(OP, &self.sql))
    }
}

fn placeholder_index(stmt: &Statement<'_>, name: &str) -> rusqlite::Result<Option<usize>> {
    for prefix in NAMED_PREFIXES {
        if let Some(index) = stmt.parameter_index(&format!("{prefix}{name}"))? {
            return Ok(Some(index));
        }
    }
    Ok(None)
}

fn first_row<'s, 'stmt>(
    rows: &'s mut Rows<'stmt>,
    op: &'static str,
    sql: &str,
) -> Result<&'s Row<'stmt>> {
    rows.next()
        .map_err(RepoError::query(op, sql))?
        .ok_or_else(|| RepoError::query(op, sql)(rusqlite::Error::QueryReturnedNoRows))
}

#[cfg(test)]
mod tests {
    use sqlrepo_core::Column;

    use super::*;

    #[derive(Debug, Default, PartialEq)]
    struct Item {
        name: String,
        qty: i64,
    }

    impl Record for Item {
        fn columns() -> Vec<Column<Self>> {
            vec![
                Column::new("name", |i: &Item| &i.name, |i: &mut Item| &mut i.name),
                Column::new("qty", |i: &Item| &i.qty, |i: &mut Item| &mut i.qty),
            ]
        }
    }

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE items (name TEXT PRIMARY KEY, qty INTEGER NOT NULL);
             INSERT INTO items VALUES ('bolt', 10), ('nut', 3);",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_refuses_to_run_until_bound() {
        let conn = setup();
        let mut q = DeferredQuery::<Item>::new(
            &conn,
            "SELECT name, qty FROM items WHERE name = :name",
            ["name"],
        );

        let err = q.query().unwrap_err();
        assert!(matches!(err, RepoError::Unbound(ref name) if name == "name"));

        let item = q.bind([named("name", "bolt")]).query().unwrap();
        assert_eq!(
            item,
            Item {
                name: "bolt".into(),
                qty: 10
            }
        );
    }

    #[test]
    fn test_unbound_reported_in_declaration_order() {
        let conn = setup();
        let mut q = DeferredQuery::<i64>::new(
            &conn,
            "SELECT COUNT(*) FROM items WHERE name = :b AND qty > :a",
            ["b", "a"],
        );
        assert_eq!(q.unbound().collect::<Vec<_>>(), ["b", "a"]);

        q.bind([named("a", 0)]);
        let err = q.query_value().unwrap_err();
        assert!(matches!(err, RepoError::Unbound(ref name) if name == "b"));
    }

    #[test]
    fn test_bindings_are_sticky_and_replaceable() {
        let conn = setup();
        let mut q =
            DeferredQuery::<i64>::new(&conn, "SELECT qty FROM items WHERE name = @name", ["name"]);

        q.bind([named("name", "bolt")]);
        assert_eq!(q.query_value().unwrap(), 10);
        assert_eq!(q.query_value().unwrap(), 10);

        q.bind([named("name", "nut")]);
        assert_eq!(q.query_value().unwrap(), 3);

        q.reset();
        assert!(matches!(q.query_value(), Err(RepoError::Unbound(_))));
    }

    #[test]
    fn test_positional_binding_follows_binding_order() {
        let conn = setup();
        let mut q = DeferredQuery::<i64>::new(
            &conn,
            "SELECT COUNT(*) FROM items
             WHERE qty >= ?
               AND qty <= ?",
            ["min", "max"],
        );
        assert_eq!(q.sql(), "SELECT COUNT(*) FROM items WHERE qty >= ? AND qty <= ?");

        q.bind([named("min", 5), named("max", 20)]);
        assert_eq!(q.query_value().unwrap(), 1);
    }

    #[test]
    fn test_stray_argument_is_rejected() {
        let conn = setup();
        let mut q = DeferredQuery::<i64>::new(
            &conn,
            "SELECT COUNT(*) FROM items WHERE name = :name",
            ["name"],
        );

        let err = q
            .bind([named("name", "bolt"), named("nmae", "nut")])
            .query_value()
            .unwrap_err();
        assert!(matches!(err, RepoError::UnknownArg(ref name) if name == "nmae"));

        q.reset();
        assert_eq!(q.bind([named("name", "bolt")]).query_value().unwrap(), 1);
    }

    #[test]
    fn test_positional_arguments_skip_named_slots() {
        let conn = setup();
        let mut q = DeferredQuery::<i64>::new(
            &conn,
            "SELECT COUNT(*) FROM items WHERE name = :name AND qty > ?",
            ["min", "name"],
        );

        // `min` is bound first but must land in the `?` slot, not in `:name`.
        q.bind([named("min", 5), named("name", "bolt")]);
        assert_eq!(q.query_value().unwrap(), 1);

        q.bind([named("min", 50)]);
        assert_eq!(q.query_value().unwrap(), 0);
    }

    #[test]
    fn test_no_row_is_not_found() {
        let conn = setup();
        let mut q = DeferredQuery::<Item>::new(
            &conn,
            "SELECT name, qty FROM items WHERE name = $name",
            ["name"],
        );
        let err = q.bind([named("name", "washer")]).query().unwrap_err();
        assert!(err.is_not_found());
    }
}
