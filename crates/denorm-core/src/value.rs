//! Field-level values and records.
//!
//! [`Value`] covers everything a record field can hold: scalars, a foreign
//! id, a list of foreign ids, and -- in hydrated output only -- a nested
//! [`Record`] or collection of records. The normalized-store invariant says
//! an *input* store never contains `Record` values; hydration produces them
//! on an output copy.
//!
//! Value equality is deep structural equality (`PartialEq` recurses through
//! lists and records, ignoring field order for records). This is the
//! equality primitive the memoization layer is built on.

use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;

use crate::id::RecordId;

/// Name of the synthetic primary-key field.
///
/// An empty record produced for a missing id carries only this field, and
/// projections always retain it.
pub const PK_FIELD: &str = "id";

/// A single field value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Absent / unresolved.
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Either a raw foreign-id list or a hydrated collection.
    List(Vec<Value>),
    /// A hydrated record. Never present in an input store.
    Record(Record),
}

impl Value {
    /// JS-style falsiness: null, false, zero, and the empty string.
    /// Used to decide whether a foreign-key field denotes a record at all.
    pub fn is_falsy(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Bool(b) => !b,
            Value::Int(n) => *n == 0,
            Value::Float(f) => *f == 0.0,
            Value::Str(s) => s.is_empty(),
            Value::List(_) | Value::Record(_) => false,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(record) => Some(record),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Record(record)
    }
}

impl From<RecordId> for Value {
    fn from(id: RecordId) -> Self {
        match id {
            RecordId::Int(n) => Value::Int(n),
            RecordId::Str(s) => Value::Str(s),
        }
    }
}

/// An insertion-ordered mapping of field name to [`Value`].
///
/// Equality ignores field order; iteration and serialization follow
/// insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Record(IndexMap<String, Value>);

impl Record {
    pub fn new() -> Self {
        Record(IndexMap::new())
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Sets a field, appending it if new and keeping its position otherwise.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(field.into(), value.into());
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.shift_remove(field)
    }

    pub fn contains_field(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Record(iter.into_iter().collect())
    }
}

// Compact one-line rendering, mainly for test failure output.
impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (k, v)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {:?}", k, v)?;
        }
        write!(f, "}}")
    }
}
