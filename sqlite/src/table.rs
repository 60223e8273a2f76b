//! Statement plumbing shared by the generic and singleton repositories.

use std::collections::HashMap;
use std::iter;

use rusqlite::{Connection, params_from_iter};
use sqlrepo_core::{MultiError, Record, Value, normalize_query};
use tracing::trace;

use crate::config::{RepoConfig, TableSpec};
use crate::convert::{column_names, read_record, to_sql};
use crate::error::{RepoError, Result};
use crate::query::DeferredQuery;
use crate::tx::Transaction;

/// Outcome of [`exec`](crate::GenericRepo::exec).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecResult {
    /// Rows changed by the statement.
    pub rows_affected: usize,
    /// Rowid of the most recent successful insert on the connection.
    pub last_insert_rowid: i64,
}

/// Slot-aligned batch read result; see [`GenericRepo::get_multi`](crate::GenericRepo::get_multi).
pub type MultiGet<T> = (Vec<Option<T>>, Option<MultiError<RepoError>>);

pub(crate) struct Table<'conn, T> {
    conn: &'conn Connection,
    spec: TableSpec<T>,
}

impl<'conn, T: Record> Table<'conn, T> {
    pub(crate) fn new(conn: &'conn Connection, config: RepoConfig<T>) -> Result<Self> {
        let spec = config.resolve()?;
        Ok(Self { conn, spec })
    }

    pub(crate) fn spec(&self) -> &TableSpec<T> {
        &self.spec
    }

    pub(crate) fn count(&self) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", self.spec.table);
        trace!(method = "count", q = %sql, "SQL");
        self.conn
            .query_row(&sql, [], |row| row.get(0))
            .map_err(RepoError::query("count", &sql))
    }

    pub(crate) fn begin_tx(&self) -> Result<Transaction<'_, T>> {
        Transaction::begin(self.conn, &self.spec)
    }

    /// Puts `model` in its own transaction. An error drops the transaction,
    /// which rolls it back.
    pub(crate) fn put(&self, model: &mut T) -> Result<()> {
        let mut tx = self.begin_tx()?;
        tx.put(model)?;
        tx.commit()
    }

    pub(crate) fn list(&self) -> Result<Vec<T>> {
        trace!(method = "list", q = %self.spec.select_sql, "SQL");
        self.fetch("list", &self.spec.select_sql, &[], None)
    }

    /// Row stored under `key`, if any.
    pub(crate) fn get_row(&self, op: &'static str, key: &str) -> Result<Option<T>> {
        let sql = self.where_key(&self.spec.select_sql);
        trace!(method = op, q = %sql, key = %key, "SQL");
        let mut rows = self.fetch(op, &sql, &[Value::from(key)], Some(1))?;
        Ok(rows.pop())
    }

    pub(crate) fn exists(&self, key: &str) -> Result<bool> {
        if key.is_empty() {
            return Ok(false);
        }
        let sql = self.exists_sql("?1");
        trace!(method = "exists", q = %sql, key = %key, "SQL");
        self.conn
            .query_row(&sql, [key], |row| row.get(0))
            .map_err(RepoError::query("exists", &sql))
    }

    /// Joins the keys in as a `VALUES` list tagged with their slots, so each
    /// key is compared the way [`get_row`](Self::get_row) compares it, column
    /// affinity included, and duplicate keys each get their own row.
    pub(crate) fn get_multi<S: AsRef<str>>(&self, keys: &[S]) -> Result<MultiGet<T>> {
        if keys.is_empty() {
            return Ok((Vec::new(), None));
        }

        let columns = self
            .spec
            .schema
            .names()
            .map(|name| format!("t.{name} AS {name}"))
            .collect::<Vec<_>>()
            .join(",");
        let slots = (1..=keys.len())
            .map(|index| format!("({index},?{index})"))
            .collect::<Vec<_>>()
            .join(",");
        let sql = format!(
            "SELECT {columns},k.column1 FROM {} AS t JOIN (VALUES {slots}) AS k ON t.{} = k.column2",
            self.spec.table, self.spec.primary_key
        );
        trace!(method = "get_multi", q = %sql, keys = keys.len(), "SQL");

        let op = "get_multi";
        let width = self.spec.schema.len();
        let mut stmt = self.conn.prepare(&sql).map_err(RepoError::query(op, &sql))?;
        let names = column_names(&stmt);
        let mut rows = stmt
            .query(params_from_iter(keys.iter().map(AsRef::<str>::as_ref)))
            .map_err(RepoError::query(op, &sql))?;

        let mut records = iter::repeat_with(|| None)
            .take(keys.len())
            .collect::<Vec<Option<T>>>();
        while let Some(row) = rows.next().map_err(RepoError::query(op, &sql))? {
            let slot: i64 = row.get(width).map_err(RepoError::query(op, &sql))?;
            let record = read_record(row, &names[..width], &self.spec.schema)?;
            if let Some(entry) = usize::try_from(slot - 1)
                .ok()
                .and_then(|index| records.get_mut(index))
            {
                *entry = Some(record);
            }
        }

        let mut errors = Vec::with_capacity(keys.len());
        for (key, record) in keys.iter().zip(records.iter_mut()) {
            let key = key.as_ref();
            errors.push(if key.is_empty() {
                *record = None;
                Some(RepoError::EmptyKey)
            } else if record.is_none() {
                Some(RepoError::MissingKey(key.to_string()))
            } else {
                None
            });
        }

        let errors = MultiError::new(errors);
        Ok((records, errors.into_option()))
    }

    pub(crate) fn delete_key(&self, key: &str) -> Result<()> {
        self.delete_value("delete_key", Value::from(key))
    }

    pub(crate) fn delete(&self, model: &T) -> Result<()> {
        let key = self
            .spec
            .schema
            .column(self.spec.key_index)
            .map(|column| column.read(model))
            .unwrap_or_default();
        self.delete_value("delete", key)
    }

    fn delete_value(&self, op: &'static str, key: Value) -> Result<()> {
        let sql = self.where_key(&format!("DELETE FROM {}", self.spec.table));
        trace!(method = op, q = %sql, key = %key.key_string(), "SQL");
        self.conn
            .execute(&sql, [to_sql(&key)])
            .map_err(RepoError::query(op, &sql))?;
        Ok(())
    }

    pub(crate) fn query(&self, sql: &str, params: &[Value]) -> Result<T> {
        let sql = normalize_query(sql);
        trace!(method = "query", q = %sql, "SQL");
        self.fetch("query", &sql, params, Some(1))?
            .pop()
            .ok_or_else(|| RepoError::query("query", &sql)(rusqlite::Error::QueryReturnedNoRows))
    }

    pub(crate) fn query_list(&self, sql: &str, params: &[Value]) -> Result<Vec<T>> {
        let sql = normalize_query(sql);
        trace!(method = "query_list", q = %sql, "SQL");
        self.fetch("query_list", &sql, params, None)
    }

    pub(crate) fn query_map(&self, sql: &str, params: &[Value]) -> Result<HashMap<String, T>> {
        let sql = normalize_query(sql);
        trace!(method = "query_map", q = %sql, "SQL");
        Ok(self
            .fetch("query_map", &sql, params, None)?
            .into_iter()
            .map(|record| (self.spec.key_of(&record), record))
            .collect())
    }

    pub(crate) fn exec(&self, sql: &str, params: &[Value]) -> Result<ExecResult> {
        let sql = normalize_query(sql);
        trace!(method = "exec", q = %sql, "SQL");
        let rows_affected = self
            .conn
            .execute(&sql, params_from_iter(params.iter().map(to_sql)))
            .map_err(RepoError::query("exec", &sql))?;
        Ok(ExecResult {
            rows_affected,
            last_insert_rowid: self.conn.last_insert_rowid(),
        })
    }

    pub(crate) fn exists_query(&self) -> DeferredQuery<'conn, bool> {
        let key = &self.spec.primary_key;
        DeferredQuery::new(self.conn, &self.exists_sql(&format!(":{key}")), [key.as_str()])
    }

    fn where_key(&self, sql: &str) -> String {
        format!("{sql} WHERE {} = ?1", self.spec.primary_key)
    }

    fn exists_sql(&self, placeholder: &str) -> String {
        format!(
            "SELECT COUNT(*) > 0 FROM {} WHERE {} = {placeholder}",
            self.spec.table, self.spec.primary_key
        )
    }

    /// Runs `sql` and decodes up to `limit` rows.
    fn fetch(
        &self,
        op: &'static str,
        sql: &str,
        params: &[Value],
        limit: Option<usize>,
    ) -> Result<Vec<T>> {
        let mut stmt = self.conn.prepare(sql).map_err(RepoError::query(op, sql))?;
        let names = column_names(&stmt);
        let mut rows = stmt
            .query(params_from_iter(params.iter().map(to_sql)))
            .map_err(RepoError::query(op, sql))?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().map_err(RepoError::query(op, sql))? {
            records.push(read_record(row, &names, &self.spec.schema)?);
            if limit.is_some_and(|limit| records.len() >= limit) {
                break;
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use sqlrepo_core::Column;

    use super::*;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Part {
        sku: String,
        stock: i64,
    }

    impl Record for Part {
        fn columns() -> Vec<Column<Self>> {
            vec![
                Column::new("sku", |p: &Part| &p.sku, |p: &mut Part| &mut p.sku),
                Column::new("stock", |p: &Part| &p.stock, |p: &mut Part| &mut p.stock),
            ]
        }
    }

    fn setup(conn: &Connection) -> Table<'_, Part> {
        conn.execute_batch("CREATE TABLE parts (sku TEXT PRIMARY KEY, stock INTEGER NOT NULL)")
            .unwrap();
        Table::new(conn, RepoConfig::new("parts", "sku")).unwrap()
    }

    fn part(sku: &str, stock: i64) -> Part {
        Part {
            sku: sku.into(),
            stock,
        }
    }

    #[test]
    fn test_get_multi_duplicate_keys_each_get_a_copy() {
        let conn = Connection::open_in_memory().unwrap();
        let table = setup(&conn);
        table.put(&mut part("a", 1)).unwrap();

        let (records, errors) = table.get_multi(&["a", "a"]).unwrap();
        assert_eq!(records, [Some(part("a", 1)), Some(part("a", 1))]);
        assert!(errors.is_none());
    }

    #[test]
    fn test_get_multi_empty_key_slot() {
        let conn = Connection::open_in_memory().unwrap();
        let table = setup(&conn);
        table.put(&mut part("a", 1)).unwrap();

        let (records, errors) = table.get_multi(&["", "a"]).unwrap();
        assert_eq!(records, [None, Some(part("a", 1))]);
        let errors = errors.unwrap();
        assert!(matches!(errors.get(0), Some(RepoError::EmptyKey)));
        assert!(errors.get(1).is_none());
    }

    #[derive(Debug, Default, PartialEq)]
    struct Gauge {
        id: i64,
        level: i64,
    }

    impl Record for Gauge {
        fn columns() -> Vec<Column<Self>> {
            vec![
                Column::new("id", |g: &Gauge| &g.id, |g: &mut Gauge| &mut g.id),
                Column::new("level", |g: &Gauge| &g.level, |g: &mut Gauge| &mut g.level),
            ]
        }
    }

    #[test]
    fn test_get_multi_matches_keys_like_get() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE gauges (id INTEGER PRIMARY KEY, level INTEGER NOT NULL)")
            .unwrap();
        let table = Table::new(&conn, RepoConfig::<Gauge>::new("gauges", "id")).unwrap();
        table.put(&mut Gauge { id: 3, level: 7 }).unwrap();

        let single = table.get_row("get", "03").unwrap();
        assert_eq!(single, Some(Gauge { id: 3, level: 7 }));

        let (records, errors) = table.get_multi(&["03", "3", "x"]).unwrap();
        assert_eq!(
            records,
            [
                Some(Gauge { id: 3, level: 7 }),
                Some(Gauge { id: 3, level: 7 }),
                None
            ]
        );
        let errors = errors.unwrap();
        assert!(errors.get(0).is_none());
        assert!(errors.get(1).is_none());
        assert_eq!(errors.get(2).and_then(RepoError::missing_key), Some("x"));
    }

    #[test]
    fn test_query_without_rows_is_not_found() {
        let conn = Connection::open_in_memory().unwrap();
        let table = setup(&conn);

        let err = table
            .query("SELECT sku, stock FROM parts WHERE stock > ?1", &[Value::Integer(0)])
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(matches!(err, RepoError::Query { op: "query", .. }));
    }

    #[test]
    fn test_exec_reports_changes() {
        let conn = Connection::open_in_memory().unwrap();
        let table = setup(&conn);

        let result = table
            .exec(
                "INSERT INTO parts (sku, stock)
                 VALUES (?1, ?2)",
                &[Value::from("x"), Value::Integer(4)],
            )
            .unwrap();
        assert_eq!(result.rows_affected, 1);
        assert_eq!(result.last_insert_rowid, 1);
        assert_eq!(table.count().unwrap(), 1);
    }

    #[test]
    fn test_statement_errors_carry_the_operation() {
        let conn = Connection::open_in_memory().unwrap();
        let table = Table::<Part>::new(&conn, RepoConfig::new("parts", "sku")).unwrap();

        let err = table.count().unwrap_err();
        match err {
            RepoError::Query { op, sql, .. } => {
                assert_eq!(op, "count");
                assert_eq!(sql, "SELECT COUNT(*) FROM parts");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
