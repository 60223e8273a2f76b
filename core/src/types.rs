//! Cell values and field conversions.
//!
//! [`Value`] mirrors the five SQLite storage classes. [`FieldValue`] converts
//! between a Rust field type and a [`Value`]; the column mapper uses it to
//! read fields out of a record and to write decoded cells back into one.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single cell value, one per SQLite storage class.
///
/// # Examples
///
/// ```
/// use sqlrepo_core::Value;
///
/// assert_eq!(Value::from("foo"), Value::Text("foo".into()));
/// assert_eq!(Value::from(None::<i64>), Value::Null);
/// assert_eq!(Value::Integer(42).key_string(), "42");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum Value {
    /// SQL `NULL`.
    #[default]
    Null,
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit float.
    Real(f64),
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Blob(Vec<u8>),
}

impl Value {
    /// Returns the storage class name, as SQLite spells it.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Integer(_) => "INTEGER",
            Value::Real(_) => "REAL",
            Value::Text(_) => "TEXT",
            Value::Blob(_) => "BLOB",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Renders the value as a lookup key.
    ///
    /// Keys are string-comparable: text is returned as-is, numbers in their
    /// decimal form, `NULL` as the empty string (which never matches a real
    /// lookup, since empty keys are rejected before querying).
    pub fn key_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Integer(v) => v.to_string(),
            Value::Real(v) => v.to_string(),
            Value::Text(v) => v.clone(),
            Value::Blob(v) => String::from_utf8_lossy(v).into_owned(),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Real(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Blob(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::Text(value.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// Errors raised while converting between [`Value`] and field types.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    /// A `NULL` cell was read into a non-optional field.
    #[error("unexpected NULL for {expected}")]
    UnexpectedNull { expected: &'static str },

    /// The cell's storage class does not fit the field type.
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// An integer cell does not fit the narrower field type.
    #[error("integer {value} out of range for {target}")]
    OutOfRange { value: i64, target: &'static str },

    /// A text cell is not an RFC 3339 timestamp.
    #[error("invalid timestamp {0:?}")]
    InvalidTimestamp(String),

    /// A text cell holds bytes that are not valid UTF-8.
    #[error("invalid UTF-8 text")]
    InvalidUtf8,

    /// A result column has no counterpart in the record's mapping.
    #[error("no mapped field for column {0}")]
    UnknownColumn(String),

    /// Conversion failure for a named column.
    #[error("column {column}: {source}")]
    Column {
        column: String,
        source: Box<ConversionError>,
    },
}

impl ConversionError {
    fn mismatch(expected: &'static str, found: &Value) -> Self {
        match found {
            Value::Null => ConversionError::UnexpectedNull { expected },
            other => ConversionError::TypeMismatch {
                expected,
                found: other.type_name(),
            },
        }
    }
}

/// Conversion between a record field type and a [`Value`].
///
/// Implemented for the scalar types SQLite stores natively, for
/// [`DateTime<Utc>`] (stored as RFC 3339 text) and for `Option<F>`, which
/// maps `None` to `NULL`.
pub trait FieldValue: Sized {
    fn to_value(&self) -> Value;
    fn from_value(value: Value) -> Result<Self, ConversionError>;
}

impl FieldValue for String {
    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Text(v) => Ok(v),
            other => Err(ConversionError::mismatch("TEXT", &other)),
        }
    }
}

impl FieldValue for i64 {
    fn to_value(&self) -> Value {
        Value::Integer(*self)
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Integer(v) => Ok(v),
            other => Err(ConversionError::mismatch("INTEGER", &other)),
        }
    }
}

macro_rules! narrow_integer {
    ($($ty:ty),*) => {
        $(
            impl FieldValue for $ty {
                fn to_value(&self) -> Value {
                    Value::Integer(i64::from(*self))
                }

                fn from_value(value: Value) -> Result<Self, ConversionError> {
                    let wide = i64::from_value(value)?;
                    <$ty>::try_from(wide).map_err(|_| ConversionError::OutOfRange {
                        value: wide,
                        target: stringify!($ty),
                    })
                }
            }
        )*
    };
}

narrow_integer!(i32, u32);

impl FieldValue for f64 {
    fn to_value(&self) -> Value {
        Value::Real(*self)
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Real(v) => Ok(v),
            // Integral values in untyped columns come back as INTEGER.
            Value::Integer(v) => Ok(v as f64),
            other => Err(ConversionError::mismatch("REAL", &other)),
        }
    }
}

impl FieldValue for bool {
    fn to_value(&self) -> Value {
        Value::Integer(i64::from(*self))
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Integer(v) => Ok(v != 0),
            other => Err(ConversionError::mismatch("INTEGER", &other)),
        }
    }
}

impl FieldValue for Vec<u8> {
    fn to_value(&self) -> Value {
        Value::Blob(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Blob(v) => Ok(v),
            other => Err(ConversionError::mismatch("BLOB", &other)),
        }
    }
}

impl FieldValue for DateTime<Utc> {
    fn to_value(&self) -> Value {
        Value::from(*self)
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        let text = String::from_value(value)?;
        DateTime::parse_from_rfc3339(&text)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(|_| ConversionError::InvalidTimestamp(text))
    }
}

impl<F: FieldValue> FieldValue for Option<F> {
    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, FieldValue::to_value)
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Null => Ok(None),
            other => F::from_value(other).map(Some),
        }
    }
}
