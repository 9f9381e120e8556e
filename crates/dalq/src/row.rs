//! Row model shared by drivers and the result cursor.
//!
//! Drivers hand rows to the cursor as [`Row`]s: shared column names plus one
//! dynamically typed [`Value`] per column. Typed access goes through
//! [`FromValue`] and [`FromRow`].

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::error::{DalError, DalResult};

/// A dynamically typed column value.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Name of the variant, used in decode errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Blob(_) => "blob",
        }
    }

    /// Convert to a JSON value. Blobs become arrays of bytes; non-finite floats become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Blob(b) => serde_json::Value::from(b.clone()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(s) => f.write_str(s),
            Value::Blob(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

macro_rules! impl_from_for_value {
    ($($ty:ty => $variant:ident $(as $cast:ty)?),+ $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v $(as $cast)?)
                }
            }
        )+
    };
}

impl_from_for_value!(
    bool => Bool,
    i16 => Int as i64,
    i32 => Int as i64,
    i64 => Int,
    u32 => Int as i64,
    f32 => Float as f64,
    f64 => Float,
    String => Text,
    Vec<u8> => Blob,
);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Blob(v.to_vec())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Conversion from a column [`Value`] into a Rust type.
pub trait FromValue: Sized {
    /// Convert, returning a human-readable reason on mismatch.
    fn from_value(value: &Value) -> Result<Self, String>;
}

fn mismatch(expected: &str, value: &Value) -> String {
    format!("expected {expected}, found {}", value.type_name())
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, String> {
        Ok(value.clone())
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::Int(i) => Ok(*i != 0),
            other => Err(mismatch("bool", other)),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Int(i) => Ok(*i),
            Value::Bool(b) => Ok(i64::from(*b)),
            other => Err(mismatch("int", other)),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Result<Self, String> {
        let wide = i64::from_value(value)?;
        i32::try_from(wide).map_err(|e| e.to_string())
    }
}

impl FromValue for u64 {
    fn from_value(value: &Value) -> Result<Self, String> {
        let wide = i64::from_value(value)?;
        u64::try_from(wide).map_err(|e| e.to_string())
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Float(f) => Ok(*f),
            Value::Int(i) => Ok(*i as f64),
            other => Err(mismatch("float", other)),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Text(s) => Ok(s.clone()),
            other => Err(mismatch("text", other)),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Blob(b) => Ok(b.clone()),
            Value::Text(s) => Ok(s.as_bytes().to_vec()),
            other => Err(mismatch("blob", other)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// One fetched row: column names shared across the result set, plus values.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    /// Build a row. Missing trailing values are padded with `NULL`.
    pub fn new(columns: Arc<[String]>, mut values: Vec<Value>) -> Self {
        if values.len() < columns.len() {
            values.resize(columns.len(), Value::Null);
        }
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Value of the first column with this name.
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|column| column == name)
            .and_then(|index| self.values.get(index))
    }

    /// Name and value pairs in column order, duplicates included.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    /// Typed access by column name.
    pub fn try_get<T: FromValue>(&self, column: &str) -> DalResult<T> {
        let value = self
            .get_by_name(column)
            .ok_or_else(|| DalError::decode(column, "no such column"))?;
        T::from_value(value).map_err(|e| DalError::decode(column, e))
    }

    /// Typed access by column index.
    pub fn try_get_index<T: FromValue>(&self, index: usize) -> DalResult<T> {
        let column = self
            .columns
            .get(index)
            .cloned()
            .unwrap_or_else(|| index.to_string());
        let value = self
            .values
            .get(index)
            .ok_or_else(|| DalError::decode(&column, "column index out of range"))?;
        T::from_value(value).map_err(|e| DalError::decode(column, e))
    }
}

/// Trait for converting a fetched row into a Rust type.
///
/// # Example
///
/// ```
/// use dalq::{DalResult, FromRow, Row};
///
/// struct User {
///     id: i64,
///     name: String,
/// }
///
/// impl FromRow for User {
///     fn from_row(row: &Row) -> DalResult<Self> {
///         Ok(Self {
///             id: row.try_get("id")?,
///             name: row.try_get("name")?,
///         })
///     }
/// }
/// ```
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> DalResult<Self>;
}

impl FromRow for Row {
    fn from_row(row: &Row) -> DalResult<Self> {
        Ok(row.clone())
    }
}

macro_rules! impl_from_row_for_tuple {
    ($($idx:tt => $name:ident),+) => {
        impl<$($name: FromValue),+> FromRow for ($($name,)+) {
            fn from_row(row: &Row) -> DalResult<Self> {
                Ok(($(row.try_get_index::<$name>($idx)?,)+))
            }
        }
    };
}

impl_from_row_for_tuple!(0 => A);
impl_from_row_for_tuple!(0 => A, 1 => B);
impl_from_row_for_tuple!(0 => A, 1 => B, 2 => C);
impl_from_row_for_tuple!(0 => A, 1 => B, 2 => C, 3 => D);
impl_from_row_for_tuple!(0 => A, 1 => B, 2 => C, 3 => D, 4 => E);
impl_from_row_for_tuple!(0 => A, 1 => B, 2 => C, 3 => D, 4 => E, 5 => F);

/// Build shared column names from a list.
pub fn columns<I>(names: I) -> Arc<[String]>
where
    I: IntoIterator,
    I::Item: Into<String>,
{
    names.into_iter().map(Into::into).collect()
}
