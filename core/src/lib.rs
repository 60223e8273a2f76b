//! Storage-independent primitives shared by the sqlrepo repositories.
//!
//! This crate defines the pieces of the data-access layer that do not talk
//! to a database:
//!
//! - [`Value`] and [`FieldValue`]: the dynamically typed cell value and the
//!   conversion between it and Rust field types.
//! - [`Column`], [`Record`] and [`Schema`]: the declarative column mapper
//!   that turns a typed record into ordered column names and values, and
//!   back.
//! - [`normalize_query`]: collapses multi-line SQL into a single line.
//! - [`MultiError`]: slot-aligned per-item errors for batch reads.
//!
//! # Example
//!
//! ```
//! use sqlrepo_core::*;
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct Setting {
//!     owner: String,
//!     theme: Option<String>,
//! }
//!
//! impl Record for Setting {
//!     fn columns() -> Vec<Column<Self>> {
//!         vec![
//!             Column::new("owner", |s: &Setting| &s.owner, |s: &mut Setting| &mut s.owner),
//!             Column::new("theme", |s: &Setting| &s.theme, |s: &mut Setting| &mut s.theme),
//!         ]
//!     }
//! }
//!
//! let schema = Schema::<Setting>::new().unwrap();
//! let setting = Setting { owner: "ada".into(), theme: None };
//! assert_eq!(schema.names().collect::<Vec<_>>(), ["owner", "theme"]);
//! assert_eq!(schema.values(&setting), [Value::from("ada"), Value::Null]);
//! ```

mod multi;
mod normalize;
mod record;
mod types;

pub use multi::MultiError;
pub use normalize::normalize_query;
pub use record::{Column, Record, Schema, SchemaError};
pub use types::{ConversionError, FieldValue, Value};
