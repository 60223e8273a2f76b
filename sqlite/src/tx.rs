//! Write transactions scoped to one record type.

use rusqlite::{TransactionBehavior, params_from_iter};
use sqlrepo_core::{Record, Value, normalize_query};
use tracing::{debug, trace, warn};

use crate::config::TableSpec;
use crate::convert::to_sql;
use crate::error::{RepoError, Result};

/// One database transaction, bound to the table of a repository.
///
/// Obtained from `begin_tx` on a repository. Writes go through
/// [`put`](Self::put) (or [`exec`](Self::exec) for companion statements
/// issued by hooks) and become visible on [`commit`](Self::commit).
///
/// [`commit`](Self::commit) and [`rollback`](Self::rollback) are
/// idempotent: only the first terminal call has an effect, so a rollback
/// can safely follow a commit. Dropping an unfinished transaction rolls it
/// back.
///
/// A failed [`put`](Self::put) leaves the transaction open; the caller
/// decides whether to roll back or continue.
pub struct Transaction<'r, T> {
    inner: Option<rusqlite::Transaction<'r>>,
    spec: &'r TableSpec<T>,
}

impl<'r, T: Record> Transaction<'r, T> {
    pub(crate) fn begin(conn: &'r rusqlite::Connection, spec: &'r TableSpec<T>) -> Result<Self> {
        let inner = rusqlite::Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
        Ok(Self {
            inner: Some(inner),
            spec,
        })
    }

    fn active(&self) -> Result<&rusqlite::Transaction<'r>> {
        self.inner.as_ref().ok_or(RepoError::TransactionFinished)
    }

    /// Inserts or replaces `model`'s row.
    ///
    /// Runs the before-put hooks, writes every mapped column, then runs the
    /// after-put hooks. Any failure aborts the put without rolling back.
    pub fn put(&self, model: &mut T) -> Result<()> {
        let tx = self.active()?;

        self.spec.hooks.run_before_put(self, model)?;

        let values = self.spec.schema.values(model);
        trace!(
            method = "Transaction::put",
            q = %self.spec.upsert_sql,
            key = %self.spec.key_of(model),
            "SQL"
        );
        tx.execute(&self.spec.upsert_sql, params_from_iter(values.iter().map(to_sql)))
            .map_err(RepoError::query("Transaction::put", &self.spec.upsert_sql))?;

        self.spec.hooks.run_after_put(model)
    }

    /// Executes an arbitrary statement inside this transaction and returns
    /// the number of changed rows.
    pub fn exec(&self, sql: &str, params: &[Value]) -> Result<usize> {
        let tx = self.active()?;
        let sql = normalize_query(sql);
        trace!(method = "Transaction::exec", q = %sql, "SQL");
        tx.execute(&sql, params_from_iter(params.iter().map(to_sql)))
            .map_err(RepoError::query("Transaction::exec", &sql))
    }

    /// Table this transaction writes to.
    pub fn table(&self) -> &str {
        &self.spec.table
    }

    /// Whether neither commit nor rollback has happened yet.
    pub fn is_active(&self) -> bool {
        self.inner.is_some()
    }

    pub fn commit(&mut self) -> Result<()> {
        match self.inner.take() {
            Some(tx) => Ok(tx.commit()?),
            None => Ok(()),
        }
    }

    pub fn rollback(&mut self) -> Result<()> {
        match self.inner.take() {
            Some(tx) => Ok(tx.rollback()?),
            None => Ok(()),
        }
    }
}

impl<T> Drop for Transaction<'_, T> {
    fn drop(&mut self) {
        if let Some(tx) = self.inner.take() {
            debug!(table = %self.spec.table, "rolling back unfinished transaction");
            if let Err(err) = tx.rollback() {
                warn!(table = %self.spec.table, error = %err, "rollback failed");
            }
        }
    }
}
