//! Conversion between [`sqlrepo_core::Value`] and rusqlite values and rows.

use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Row, Statement};
use sqlrepo_core::{ConversionError, Record, Schema, Value};

use crate::error::Result;

pub(crate) fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Integer(v) => SqlValue::Integer(*v),
        Value::Real(v) => SqlValue::Real(*v),
        Value::Text(v) => SqlValue::Text(v.clone()),
        Value::Blob(v) => SqlValue::Blob(v.clone()),
    }
}

pub(crate) fn from_sql(value: ValueRef<'_>) -> std::result::Result<Value, ConversionError> {
    Ok(match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Integer(v),
        ValueRef::Real(v) => Value::Real(v),
        ValueRef::Text(bytes) => Value::Text(
            String::from_utf8(bytes.to_vec()).map_err(|_| ConversionError::InvalidUtf8)?,
        ),
        ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
    })
}

/// Result column names of a prepared statement, owned so the statement can
/// be borrowed mutably for querying afterwards.
pub(crate) fn column_names(stmt: &Statement<'_>) -> Vec<String> {
    stmt.column_names().into_iter().map(String::from).collect()
}

/// Decodes one result row into a record, matching result columns to mapped
/// columns by name.
pub(crate) fn read_record<T: Record>(
    row: &Row<'_>,
    names: &[String],
    schema: &Schema<T>,
) -> Result<T> {
    let mut fields = Vec::with_capacity(names.len());
    for (index, name) in names.iter().enumerate() {
        let value = from_sql(row.get_ref(index)?).map_err(|err| ConversionError::Column {
            column: name.clone(),
            source: Box::new(err),
        })?;
        fields.push((name.as_str(), value));
    }
    Ok(schema.decode(fields)?)
}
