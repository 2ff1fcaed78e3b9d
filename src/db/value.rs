use std::sync::Arc;

use crate::db::DbError;

/// Statement parameter or decoded column value.
///
/// Every variant carries its own `Option` so a NULL keeps a SQL type. The
/// server dialect types each bind parameter and rejects an untyped NULL
/// against a typed column.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Integer(Option<i64>),
    Real(Option<f64>),
    Text(Option<String>),
    Blob(Option<Vec<u8>>),
    Bool(Option<bool>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        match self {
            SqlValue::Integer(v) => v.is_none(),
            SqlValue::Real(v) => v.is_none(),
            SqlValue::Text(v) => v.is_none(),
            SqlValue::Blob(v) => v.is_none(),
            SqlValue::Bool(v) => v.is_none(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            SqlValue::Integer(_) => "integer",
            SqlValue::Real(_) => "real",
            SqlValue::Text(_) => "text",
            SqlValue::Blob(_) => "blob",
            SqlValue::Bool(_) => "bool",
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Integer(v) => *v,
            SqlValue::Bool(v) => v.map(i64::from),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(v) => v.as_deref(),
            _ => None,
        }
    }
}

macro_rules! impl_from_value {
    ($variant:ident, $ty:ty) => {
        impl From<$ty> for SqlValue {
            fn from(value: $ty) -> Self {
                SqlValue::$variant(Some(value.into()))
            }
        }

        impl From<Option<$ty>> for SqlValue {
            fn from(value: Option<$ty>) -> Self {
                SqlValue::$variant(value.map(Into::into))
            }
        }
    };
}

impl_from_value!(Integer, i64);
impl_from_value!(Integer, i32);
impl_from_value!(Real, f64);
impl_from_value!(Text, String);
impl_from_value!(Text, &str);
impl_from_value!(Blob, Vec<u8>);
impl_from_value!(Blob, &[u8]);
impl_from_value!(Bool, bool);

/// Builds a `Vec<SqlValue>` from heterogeneous values.
#[macro_export]
macro_rules! params {
    () => { ::std::vec::Vec::<$crate::db::SqlValue>::new() };
    ($($value:expr),+ $(,)?) => {
        vec![$($crate::db::SqlValue::from($value)),+]
    };
}

/// Result of a statement that returns no rows to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecOutcome {
    pub rows_affected: u64,
    /// Primary key generated by an insert, from `RETURNING` on the server
    /// dialect or the connection's last rowid on the embedded one.
    pub last_insert_id: Option<i64>,
}

/// Addresses a column by position or by name.
pub trait ColumnIndex {
    fn position(&self, row: &DbRow) -> Option<usize>;
    fn describe(&self) -> String;
}

impl ColumnIndex for usize {
    fn position(&self, row: &DbRow) -> Option<usize> {
        (*self < row.values.len()).then_some(*self)
    }

    fn describe(&self) -> String {
        format!("#{self}")
    }
}

impl ColumnIndex for &str {
    fn position(&self, row: &DbRow) -> Option<usize> {
        row.columns.iter().position(|c| c.eq_ignore_ascii_case(self))
    }

    fn describe(&self) -> String {
        (*self).to_string()
    }
}

/// A row whose shape does not depend on the backend it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct DbRow {
    columns: Arc<[String]>,
    values: Vec<SqlValue>,
}

impl DbRow {
    pub fn new(columns: Arc<[String]>, values: Vec<SqlValue>) -> Self {
        Self { columns, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn value<I: ColumnIndex>(&self, column: I) -> Result<&SqlValue, DbError> {
        self.resolve(&column)
    }

    fn resolve<I: ColumnIndex>(&self, column: &I) -> Result<&SqlValue, DbError> {
        column
            .position(self)
            .map(|i| &self.values[i])
            .ok_or_else(|| DbError::ColumnNotFound(column.describe()))
    }

    pub fn get_i64<I: ColumnIndex>(&self, column: I) -> Result<Option<i64>, DbError> {
        match self.resolve(&column)? {
            SqlValue::Integer(v) => Ok(*v),
            SqlValue::Bool(v) => Ok(v.map(i64::from)),
            other => Err(mismatch(&column, "integer", other)),
        }
    }

    pub fn get_f64<I: ColumnIndex>(&self, column: I) -> Result<Option<f64>, DbError> {
        match self.resolve(&column)? {
            SqlValue::Real(v) => Ok(*v),
            SqlValue::Integer(v) => Ok(v.map(|n| n as f64)),
            other => Err(mismatch(&column, "real", other)),
        }
    }

    pub fn get_bool<I: ColumnIndex>(&self, column: I) -> Result<Option<bool>, DbError> {
        match self.resolve(&column)? {
            SqlValue::Bool(v) => Ok(*v),
            SqlValue::Integer(v) => Ok(v.map(|n| n != 0)),
            other => Err(mismatch(&column, "bool", other)),
        }
    }

    pub fn get_string<I: ColumnIndex>(&self, column: I) -> Result<Option<String>, DbError> {
        match self.resolve(&column)? {
            SqlValue::Text(v) => Ok(v.clone()),
            other => Err(mismatch(&column, "text", other)),
        }
    }

    /// Binary content as one byte sequence regardless of how the backend
    /// stored it (BLOB/BYTEA or text).
    pub fn get_bytes<I: ColumnIndex>(&self, column: I) -> Result<Option<Vec<u8>>, DbError> {
        match self.resolve(&column)? {
            SqlValue::Blob(v) => Ok(v.clone()),
            SqlValue::Text(v) => Ok(v.as_ref().map(|s| s.as_bytes().to_vec())),
            other => Err(mismatch(&column, "blob", other)),
        }
    }

    /// Text stored as bytes, decoded as UTF-8 with a lossy fallback.
    pub fn get_text_lossy<I: ColumnIndex>(&self, column: I) -> Result<Option<String>, DbError> {
        match self.resolve(&column)? {
            SqlValue::Text(v) => Ok(v.clone()),
            SqlValue::Blob(v) => Ok(v.clone().map(decode_text)),
            SqlValue::Integer(v) => Ok(v.map(|n| n.to_string())),
            SqlValue::Real(v) => Ok(v.map(|n| n.to_string())),
            SqlValue::Bool(v) => Ok(v.map(|b| b.to_string())),
        }
    }
}

pub fn decode_text(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => {
            tracing::warn!(
                valid_up_to = err.utf8_error().valid_up_to(),
                "stored bytes are not valid UTF-8, decoding lossily"
            );
            String::from_utf8_lossy(err.as_bytes()).into_owned()
        }
    }
}

fn mismatch<I: ColumnIndex>(column: &I, expected: &'static str, found: &SqlValue) -> DbError {
    DbError::TypeMismatch {
        column: column.describe(),
        expected,
        found: found.type_name(),
    }
}
