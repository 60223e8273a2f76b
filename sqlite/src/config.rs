//! Repository configuration and its resolved, validated form.
//!
//! [`RepoConfig`] names a table and its primary-key column and carries the
//! put hooks. Repositories resolve it once at construction into a
//! [`TableSpec`], which checks every identifier, locates the primary key in
//! the record's column mapping and pre-builds the statements used by every
//! call.

use sqlrepo_core::{Record, Schema};

use crate::error::{RepoError, Result};
use crate::hooks::Hooks;

/// Table, primary key and hooks for one repository.
///
/// # Examples
///
/// ```
/// use sqlrepo_sqlite::{Hooks, RepoConfig};
/// # use sqlrepo_core::{Column, Record};
/// # #[derive(Default)]
/// # struct Setting { owner: String }
/// # impl Record for Setting {
/// #     fn columns() -> Vec<Column<Self>> {
/// #         vec![Column::new("Owner", |s: &Setting| &s.owner, |s: &mut Setting| &mut s.owner)]
/// #     }
/// # }
///
/// let config = RepoConfig::<Setting>::new("Settings", "Owner").with_hooks(Hooks::new());
/// assert_eq!(config.table(), "Settings");
/// assert_eq!(config.primary_key(), "Owner");
/// ```
pub struct RepoConfig<T> {
    table: String,
    primary_key: String,
    hooks: Hooks<T>,
}

impl<T: Record> RepoConfig<T> {
    pub fn new(table: impl Into<String>, primary_key: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            primary_key: primary_key.into(),
            hooks: Hooks::default(),
        }
    }

    pub fn with_hooks(mut self, hooks: Hooks<T>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub(crate) fn resolve(self) -> Result<TableSpec<T>> {
        validate_identifier("table", &self.table)?;
        validate_identifier("primary key", &self.primary_key)?;

        let schema = Schema::<T>::new()?;
        for name in schema.names() {
            validate_identifier("column", name)?;
        }
        let key_index = schema.position(&self.primary_key).ok_or_else(|| {
            RepoError::Configuration(format!(
                "cannot find primary key {} among the columns of {}",
                self.primary_key, self.table
            ))
        })?;

        let columns = schema.names().collect::<Vec<_>>().join(",");
        let placeholders = (1..=schema.len())
            .map(|index| format!("?{index}"))
            .collect::<Vec<_>>()
            .join(",");

        Ok(TableSpec {
            select_sql: format!("SELECT {columns} FROM {}", self.table),
            upsert_sql: format!(
                "INSERT OR REPLACE INTO {} ({columns}) VALUES ({placeholders})",
                self.table
            ),
            table: self.table,
            primary_key: self.primary_key,
            key_index,
            schema,
            hooks: self.hooks,
        })
    }
}

/// Validated configuration shared by a repository and its transactions.
pub(crate) struct TableSpec<T> {
    pub(crate) table: String,
    pub(crate) primary_key: String,
    pub(crate) key_index: usize,
    pub(crate) schema: Schema<T>,
    pub(crate) hooks: Hooks<T>,
    /// `SELECT <all mapped columns> FROM <table>`
    pub(crate) select_sql: String,
    pub(crate) upsert_sql: String,
}

impl<T: Record> TableSpec<T> {
    /// Primary-key value of `record`, rendered as a lookup key.
    pub(crate) fn key_of(&self, record: &T) -> String {
        self.schema
            .column(self.key_index)
            .map(|column| column.read(record).key_string())
            .unwrap_or_default()
    }
}

/// Validates that an identifier is safe to splice into SQL text: non-empty,
/// ASCII alphanumerics and underscores only.
pub(crate) fn validate_identifier(kind: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(RepoError::Configuration(format!("{kind} name cannot be empty")));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(RepoError::Configuration(format!(
            "invalid {kind} name '{name}': must contain only alphanumeric characters and underscores"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use sqlrepo_core::Column;

    use super::*;

    #[derive(Debug, Default)]
    struct Item {
        name: String,
        value: String,
    }

    impl Record for Item {
        fn columns() -> Vec<Column<Self>> {
            vec![
                Column::new("Name", |i: &Item| &i.name, |i: &mut Item| &mut i.name),
                Column::new("Value", |i: &Item| &i.value, |i: &mut Item| &mut i.value),
            ]
        }
    }

    #[derive(Debug, Default)]
    struct Spaced {
        name: String,
    }

    impl Record for Spaced {
        fn columns() -> Vec<Column<Self>> {
            vec![Column::new(
                "first name",
                |s: &Spaced| &s.name,
                |s: &mut Spaced| &mut s.name,
            )]
        }
    }

    #[test]
    fn test_valid_identifiers() {
        assert!(validate_identifier("table", "TestModels").is_ok());
        assert!(validate_identifier("table", "user_settings_2").is_ok());
    }

    #[test]
    fn test_invalid_identifiers() {
        assert!(validate_identifier("table", "").is_err());
        assert!(validate_identifier("table", "drop;--").is_err());
        assert!(validate_identifier("table", "my table").is_err());
        assert!(validate_identifier("table", "naïve").is_err());
    }

    #[test]
    fn test_resolve_builds_statements() {
        let spec = RepoConfig::<Item>::new("TestModels", "Name").resolve().unwrap();
        assert_eq!(spec.key_index, 0);
        assert_eq!(spec.select_sql, "SELECT Name,Value FROM TestModels");
        assert_eq!(
            spec.upsert_sql,
            "INSERT OR REPLACE INTO TestModels (Name,Value) VALUES (?1,?2)"
        );

        let item = Item {
            name: "foo".into(),
            value: "bar".into(),
        };
        assert_eq!(spec.key_of(&item), "foo");
    }

    #[test]
    fn test_resolve_rejects_unmapped_primary_key() {
        let err = RepoConfig::<Item>::new("TestModels", "Id")
            .resolve()
            .err()
            .unwrap();
        assert!(matches!(err, RepoError::Configuration(ref msg) if msg.contains("Id")));
    }

    #[test]
    fn test_resolve_rejects_unsafe_column_names() {
        let err = RepoConfig::<Spaced>::new("People", "first")
            .resolve()
            .err()
            .unwrap();
        assert!(matches!(err, RepoError::Configuration(_)));
    }
}
