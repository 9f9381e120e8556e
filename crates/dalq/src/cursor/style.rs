//! Fetch styles: where iteration starts, which way it moves, and the shape
//! rows are materialised in.

use std::sync::{Arc, Mutex, PoisonError};

use serde::de::DeserializeOwned;
use serde_json::Map;

use crate::error::{DalError, DalResult};
use crate::query::Shared;
use crate::row::{Row, Value};

/// Where [`super::ResultCursor::rewind`] positions the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartOffset {
    #[default]
    FromStart,
    FromEnd,
}

/// Which way [`super::ResultCursor::next`] moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

/// Shape of a materialised row.
#[derive(Debug, Clone, Default)]
pub enum FetchMode {
    /// Name to value; the last of several same-named columns wins.
    #[default]
    Map,
    /// Values by position.
    Set,
    /// A JSON object keyed by column name.
    Object,
    /// Same shape as [`FetchMode::Object`].
    LazyObject,
    /// A named instance carrying constructor arguments and the row's fields.
    Class {
        name: String,
        args: Vec<serde_json::Value>,
    },
    /// Refill and return the same shared object for every row.
    Reusable(Shared<Map<String, serde_json::Value>>),
    /// Name to every value carried under that name.
    DebugMap,
}

impl FetchMode {
    /// Instance mode without constructor arguments.
    pub fn class(name: impl Into<String>) -> Self {
        FetchMode::Class {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// Reusable mode with a fresh shared object.
    pub fn reusable() -> Self {
        FetchMode::Reusable(Arc::new(Mutex::new(Map::new())))
    }

    /// Materialise one row.
    pub fn decode(&self, row: &Row) -> Record {
        match self {
            FetchMode::Map => {
                let mut pairs: Vec<(String, Value)> = Vec::with_capacity(row.len());
                for (name, value) in row.iter() {
                    match pairs.iter_mut().find(|(existing, _)| existing == name) {
                        Some((_, slot)) => *slot = value.clone(),
                        None => pairs.push((name.to_string(), value.clone())),
                    }
                }
                Record::Map(pairs)
            }
            FetchMode::Set => Record::Set(row.values().to_vec()),
            FetchMode::Object | FetchMode::LazyObject => Record::Object(json_fields(row)),
            FetchMode::Class { name, args } => Record::Instance {
                class: name.clone(),
                args: args.clone(),
                fields: json_fields(row),
            },
            FetchMode::Reusable(target) => {
                {
                    let mut object = target.lock().unwrap_or_else(PoisonError::into_inner);
                    object.clear();
                    object.extend(json_fields(row));
                }
                Record::Reused(Arc::clone(target))
            }
            FetchMode::DebugMap => {
                let mut groups: Vec<(String, Vec<Value>)> = Vec::new();
                for (name, value) in row.iter() {
                    match groups.iter_mut().find(|(existing, _)| existing == name) {
                        Some((_, values)) => values.push(value.clone()),
                        None => groups.push((name.to_string(), vec![value.clone()])),
                    }
                }
                Record::DebugMap(groups)
            }
        }
    }
}

fn json_fields(row: &Row) -> Map<String, serde_json::Value> {
    row.iter()
        .map(|(name, value)| (name.to_string(), value.to_json()))
        .collect()
}

/// A materialised row, shaped by the [`FetchMode`] in effect when it was returned.
#[derive(Debug, Clone)]
pub enum Record {
    Map(Vec<(String, Value)>),
    Set(Vec<Value>),
    Object(Map<String, serde_json::Value>),
    Instance {
        class: String,
        args: Vec<serde_json::Value>,
        fields: Map<String, serde_json::Value>,
    },
    Reused(Shared<Map<String, serde_json::Value>>),
    DebugMap(Vec<(String, Vec<Value>)>),
}

impl Record {
    /// The record as JSON. Positional records become arrays, debug maps
    /// become objects of arrays, instances expose their fields.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Record::Map(pairs) => serde_json::Value::Object(
                pairs
                    .iter()
                    .map(|(name, value)| (name.clone(), value.to_json()))
                    .collect(),
            ),
            Record::Set(values) => values.iter().map(Value::to_json).collect(),
            Record::Object(fields) | Record::Instance { fields, .. } => {
                serde_json::Value::Object(fields.clone())
            }
            Record::Reused(shared) => serde_json::Value::Object(
                shared.lock().unwrap_or_else(PoisonError::into_inner).clone(),
            ),
            Record::DebugMap(groups) => serde_json::Value::Object(
                groups
                    .iter()
                    .map(|(name, values)| {
                        (name.clone(), values.iter().map(Value::to_json).collect())
                    })
                    .collect(),
            ),
        }
    }

    /// Materialise a `serde` type from the record.
    pub fn deserialize<T: DeserializeOwned>(&self) -> DalResult<T> {
        serde_json::from_value(self.to_json()).map_err(|e| DalError::decode("*", e.to_string()))
    }

    /// Value of a named column, for name-keyed records.
    pub fn get(&self, name: &str) -> Option<serde_json::Value> {
        match self {
            Record::Map(pairs) => pairs
                .iter()
                .find(|(existing, _)| existing == name)
                .map(|(_, value)| value.to_json()),
            Record::Set(_) => None,
            Record::Object(fields) | Record::Instance { fields, .. } => fields.get(name).cloned(),
            Record::Reused(shared) => shared
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get(name)
                .cloned(),
            Record::DebugMap(groups) => groups
                .iter()
                .find(|(existing, _)| existing == name)
                .map(|(_, values)| values.iter().map(Value::to_json).collect()),
        }
    }

    /// Class name of an instance record.
    pub fn class(&self) -> Option<&str> {
        match self {
            Record::Instance { class, .. } => Some(class),
            _ => None,
        }
    }

    /// Positional values of a set record.
    pub fn as_set(&self) -> Option<&[Value]> {
        match self {
            Record::Set(values) => Some(values),
            _ => None,
        }
    }
}

/// How the cursor walks and materialises rows.
///
/// # Example
/// ```
/// use dalq::{Direction, FetchMode, FetchStyle, StartOffset};
///
/// let style = FetchStyle::new()
///     .offset(StartOffset::FromEnd)
///     .direction(Direction::Backward)
///     .mode(FetchMode::Set);
/// assert_eq!(style.start_offset(), StartOffset::FromEnd);
/// ```
#[derive(Debug, Clone, Default)]
pub struct FetchStyle {
    offset: StartOffset,
    direction: Direction,
    mode: FetchMode,
}

impl FetchStyle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offset(mut self, offset: StartOffset) -> Self {
        self.offset = offset;
        self
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn mode(mut self, mode: FetchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn start_offset(&self) -> StartOffset {
        self.offset
    }

    pub fn current_direction(&self) -> Direction {
        self.direction
    }

    pub fn current_mode(&self) -> &FetchMode {
        &self.mode
    }

    pub(crate) fn decode(&self, row: &Row) -> Record {
        self.mode.decode(row)
    }
}
