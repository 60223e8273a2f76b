//! Declarative column mapping.
//!
//! A [`Record`] lists its columns once, in table order, as
//! `(name, read accessor, write accessor)` triples. [`Schema`] is the
//! validated form of that list: it produces the ordered column names and
//! the positionally aligned values of a record, and rebuilds a record from
//! decoded `(column, value)` pairs.
//!
//! Column names are identical to the table's column names; there is no
//! hidden naming convention.

use std::collections::HashSet;
use std::fmt;

use thiserror::Error;

use crate::types::{ConversionError, FieldValue, Value};

type ReadFn<T> = Box<dyn Fn(&T) -> Value + Send + Sync>;
type WriteFn<T> = Box<dyn Fn(&mut T, Value) -> Result<(), ConversionError> + Send + Sync>;

/// One mapped column: its name and how to read and write the backing field.
pub struct Column<T> {
    name: &'static str,
    read: ReadFn<T>,
    write: WriteFn<T>,
}

impl<T: 'static> Column<T> {
    /// Maps column `name` to the field reached through `get` / `get_mut`.
    ///
    /// # Examples
    ///
    /// ```
    /// use sqlrepo_core::{Column, Value};
    ///
    /// #[derive(Default)]
    /// struct Counter { hits: i64 }
    ///
    /// let column = Column::new("hits", |c: &Counter| &c.hits, |c: &mut Counter| &mut c.hits);
    /// let mut counter = Counter::default();
    /// column.write(&mut counter, Value::Integer(3)).unwrap();
    /// assert_eq!(column.read(&counter), Value::Integer(3));
    /// ```
    pub fn new<F, G, M>(name: &'static str, get: G, get_mut: M) -> Self
    where
        F: FieldValue + 'static,
        G: Fn(&T) -> &F + Send + Sync + 'static,
        M: Fn(&mut T) -> &mut F + Send + Sync + 'static,
    {
        Self {
            name,
            read: Box::new(move |record| get(record).to_value()),
            write: Box::new(move |record, value| {
                *get_mut(record) = F::from_value(value)?;
                Ok(())
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn read(&self, record: &T) -> Value {
        (self.read)(record)
    }

    /// Writes `value` into the field, tagging failures with the column name.
    pub fn write(&self, record: &mut T, value: Value) -> Result<(), ConversionError> {
        (self.write)(record, value).map_err(|err| ConversionError::Column {
            column: self.name.to_string(),
            source: Box::new(err),
        })
    }
}

impl<T> fmt::Debug for Column<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column").field("name", &self.name).finish()
    }
}

/// A typed row.
///
/// `Default` supplies the zero value: every field at its default, which is
/// what a singleton lookup returns (with the key filled in) when no row
/// exists.
pub trait Record: Default + 'static {
    /// Columns in table order.
    fn columns() -> Vec<Column<Self>>;
}

/// Errors in a record's column list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// The record maps no columns at all.
    #[error("record maps no columns")]
    NoColumns,
    /// Two columns share a name, which makes key lookups ambiguous.
    #[error("duplicate column: {0}")]
    DuplicateColumn(String),
}

/// Validated column list of a [`Record`].
pub struct Schema<T> {
    columns: Vec<Column<T>>,
}

impl<T: Record> Schema<T> {
    /// Collects and validates `T::columns()`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::NoColumns`] for an empty mapping and
    /// [`SchemaError::DuplicateColumn`] when a name appears twice.
    pub fn new() -> Result<Self, SchemaError> {
        let columns = T::columns();
        if columns.is_empty() {
            return Err(SchemaError::NoColumns);
        }

        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.name) {
                return Err(SchemaError::DuplicateColumn(column.name.to_string()));
            }
        }

        Ok(Self { columns })
    }

    /// Column names, in table order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().map(|column| column.name)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Position of the column called `name`.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.name == name)
    }

    pub fn column(&self, index: usize) -> Option<&Column<T>> {
        self.columns.get(index)
    }

    /// Values of every mapped field, aligned with [`names`](Self::names).
    pub fn values(&self, record: &T) -> Vec<Value> {
        self.columns.iter().map(|column| column.read(record)).collect()
    }

    /// Decodes a record from `(column, value)` pairs.
    ///
    /// Fields whose column is absent from `fields` keep their default.
    ///
    /// # Errors
    ///
    /// Returns [`ConversionError::UnknownColumn`] for a column the record
    /// does not map, or the field's conversion error.
    pub fn decode<'a, I>(&self, fields: I) -> Result<T, ConversionError>
    where
        I: IntoIterator<Item = (&'a str, Value)>,
    {
        let mut record = T::default();
        for (name, value) in fields {
            let column = self
                .position(name)
                .and_then(|index| self.columns.get(index))
                .ok_or_else(|| ConversionError::UnknownColumn(name.to_string()))?;
            column.write(&mut record, value)?;
        }
        Ok(record)
    }
}

impl<T> fmt::Debug for Schema<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.columns.iter().map(|column| column.name))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq)]
    struct Profile {
        id: String,
        age: Option<i64>,
        active: bool,
    }

    impl Record for Profile {
        fn columns() -> Vec<Column<Self>> {
            vec![
                Column::new("id", |p: &Profile| &p.id, |p: &mut Profile| &mut p.id),
                Column::new("age", |p: &Profile| &p.age, |p: &mut Profile| &mut p.age),
                Column::new(
                    "active",
                    |p: &Profile| &p.active,
                    |p: &mut Profile| &mut p.active,
                ),
            ]
        }
    }

    #[derive(Debug, Default)]
    struct Twice {
        a: String,
    }

    impl Record for Twice {
        fn columns() -> Vec<Column<Self>> {
            vec![
                Column::new("a", |t: &Twice| &t.a, |t: &mut Twice| &mut t.a),
                Column::new("a", |t: &Twice| &t.a, |t: &mut Twice| &mut t.a),
            ]
        }
    }

    #[derive(Debug, Default)]
    struct Empty;

    impl Record for Empty {
        fn columns() -> Vec<Column<Self>> {
            Vec::new()
        }
    }

    #[test]
    fn test_names_and_values_are_aligned() {
        let schema = Schema::<Profile>::new().unwrap();
        let profile = Profile {
            id: "p1".into(),
            age: Some(31),
            active: true,
        };

        assert_eq!(schema.names().collect::<Vec<_>>(), ["id", "age", "active"]);
        assert_eq!(
            schema.values(&profile),
            [Value::from("p1"), Value::Integer(31), Value::Integer(1)]
        );
        assert_eq!(schema.position("age"), Some(1));
        assert_eq!(schema.position("missing"), None);
    }

    #[test]
    fn test_decode_fills_mapped_fields_in_any_order() {
        let schema = Schema::<Profile>::new().unwrap();
        let profile = schema
            .decode([
                ("active", Value::Integer(0)),
                ("id", Value::from("p2")),
                ("age", Value::Null),
            ])
            .unwrap();
        assert_eq!(
            profile,
            Profile {
                id: "p2".into(),
                age: None,
                active: false,
            }
        );
    }

    #[test]
    fn test_decode_rejects_unknown_column() {
        let schema = Schema::<Profile>::new().unwrap();
        let err = schema.decode([("nickname", Value::from("x"))]).unwrap_err();
        assert_eq!(err, ConversionError::UnknownColumn("nickname".into()));
    }

    #[test]
    fn test_decode_tags_conversion_failure_with_column() {
        let schema = Schema::<Profile>::new().unwrap();
        let err = schema.decode([("id", Value::Null)]).unwrap_err();
        assert_eq!(err.to_string(), "column id: unexpected NULL for TEXT");
    }

    #[test]
    fn test_duplicate_columns_rejected() {
        let err = Schema::<Twice>::new().unwrap_err();
        assert_eq!(err, SchemaError::DuplicateColumn("a".into()));
    }

    #[test]
    fn test_empty_mapping_rejected() {
        assert_eq!(Schema::<Empty>::new().unwrap_err(), SchemaError::NoColumns);
    }
}
