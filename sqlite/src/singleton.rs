//! Repository over a table holding at most one row per key, where a
//! missing row reads as the record's default.

use std::collections::HashMap;

use rusqlite::Connection;
use sqlrepo_core::{Record, Value};
use tracing::debug;

use crate::config::RepoConfig;
use crate::error::{RepoError, Result};
use crate::table::Table;
use crate::tx::Transaction;

/// Per-key settings-style storage.
///
/// Same write path as [`GenericRepo`](crate::GenericRepo), but
/// [`get`](Self::get) treats absence as the default record rather than an
/// error.
pub struct SingletonRepo<'conn, T> {
    table: Table<'conn, T>,
}

impl<'conn, T: Record> SingletonRepo<'conn, T> {
    /// Binds `config` to `conn`; validated like [`GenericRepo::new`](crate::GenericRepo::new).
    pub fn new(conn: &'conn Connection, config: RepoConfig<T>) -> Result<Self> {
        let table = Table::new(conn, config)?;
        debug!(table = %table.spec().table, kind = "singleton", "repository ready");
        Ok(Self { table })
    }

    pub fn begin_tx(&self) -> Result<Transaction<'_, T>> {
        self.table.begin_tx()
    }

    pub fn put(&self, model: &mut T) -> Result<()> {
        self.table.put(model)
    }

    /// Row stored under `key`, or `T::default()` with only the primary-key
    /// field set to `key` when there is none.
    ///
    /// # Errors
    ///
    /// [`RepoError::EmptyKey`] for an empty key. The key is written into the
    /// default record as text, or as an integer when the field only takes
    /// integers; a key fitting neither is a conversion error.
    pub fn get(&self, key: &str) -> Result<T> {
        if key.is_empty() {
            return Err(RepoError::EmptyKey);
        }
        if let Some(record) = self.table.get_row("singleton get", key)? {
            return Ok(record);
        }

        let spec = self.table.spec();
        let mut record = T::default();
        if let Some(column) = spec.schema.column(spec.key_index) {
            if let Err(err) = column.write(&mut record, Value::from(key)) {
                let Ok(number) = key.parse::<i64>() else {
                    return Err(err.into());
                };
                column.write(&mut record, Value::Integer(number))?;
            }
        }
        Ok(record)
    }

    pub fn exists(&self, key: &str) -> Result<bool> {
        self.table.exists(key)
    }

    pub fn list(&self) -> Result<Vec<T>> {
        self.table.list()
    }

    pub fn query(&self, sql: &str, params: &[Value]) -> Result<T> {
        self.table.query(sql, params)
    }

    pub fn query_list(&self, sql: &str, params: &[Value]) -> Result<Vec<T>> {
        self.table.query_list(sql, params)
    }

    pub fn query_map(&self, sql: &str, params: &[Value]) -> Result<HashMap<String, T>> {
        self.table.query_map(sql, params)
    }
}

#[cfg(test)]
mod tests {
    use sqlrepo_core::Column;

    use super::*;

    #[derive(Debug, Default, PartialEq)]
    struct Counter {
        id: i64,
        hits: i64,
    }

    impl Record for Counter {
        fn columns() -> Vec<Column<Self>> {
            vec![
                Column::new("id", |c: &Counter| &c.id, |c: &mut Counter| &mut c.id),
                Column::new("hits", |c: &Counter| &c.hits, |c: &mut Counter| &mut c.hits),
            ]
        }
    }

    #[test]
    fn test_integer_key_defaults_to_parsed_key() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE counters (id INTEGER PRIMARY KEY, hits INTEGER)")
            .unwrap();
        let repo = SingletonRepo::new(&conn, RepoConfig::<Counter>::new("counters", "id")).unwrap();

        repo.put(&mut Counter { id: 3, hits: 9 }).unwrap();
        assert_eq!(repo.get("3").unwrap(), Counter { id: 3, hits: 9 });

        assert_eq!(repo.get("4").unwrap(), Counter { id: 4, hits: 0 });
        assert!(!repo.exists("4").unwrap());

        let err = repo.get("four").unwrap_err();
        assert!(matches!(err, RepoError::Conversion(_)));
    }

    #[test]
    fn test_empty_key_is_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE counters (id INTEGER PRIMARY KEY, hits INTEGER)")
            .unwrap();
        let repo = SingletonRepo::new(&conn, RepoConfig::<Counter>::new("counters", "id")).unwrap();

        assert!(matches!(repo.get(""), Err(RepoError::EmptyKey)));
        assert!(!repo.exists("").unwrap());
    }
}
