// SPDX-License-Identifier: CC0-1.0

use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::ToSql;

/// A tagged union of SQL-bindable values.
///
/// One variant per SQL column kind this crate's schema uses. The executor
/// ([`super::execute_multi`]) dispatches on this structurally, rather than
/// through a boxed trait object, matching the reshaping note in the design
/// documentation (a sum type, not virtual calls).
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// SQL `NULL`.
    Null,
    /// A boolean, bound as SQLite integer `0`/`1`.
    Bool(bool),
    /// A signed 64-bit integer.
    Integer(i64),
    /// A 64-bit float.
    Float(f64),
    /// UTF-8 text.
    Text(String),
    /// A raw byte blob.
    Blob(Vec<u8>),
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            SqlValue::Bool(b) => ToSqlOutput::Owned(rusqlite::types::Value::Integer(*b as i64)),
            SqlValue::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            SqlValue::Float(f) => ToSqlOutput::Borrowed(ValueRef::Real(*f)),
            SqlValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            SqlValue::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

impl From<bool> for SqlValue {
    fn from(b: bool) -> Self { SqlValue::Bool(b) }
}

impl From<i64> for SqlValue {
    fn from(i: i64) -> Self { SqlValue::Integer(i) }
}

impl From<f64> for SqlValue {
    fn from(f: f64) -> Self { SqlValue::Float(f) }
}

impl From<String> for SqlValue {
    fn from(s: String) -> Self { SqlValue::Text(s) }
}

impl From<&str> for SqlValue {
    fn from(s: &str) -> Self { SqlValue::Text(s.to_owned()) }
}

impl From<Vec<u8>> for SqlValue {
    fn from(b: Vec<u8>) -> Self { SqlValue::Blob(b) }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => SqlValue::Null,
        }
    }
}
