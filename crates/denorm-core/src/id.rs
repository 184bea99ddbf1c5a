//! Record identifiers.
//!
//! A [`RecordId`] is either an integer or a string, mirroring the two key
//! shapes a normalized store accepts. Ids carry a falsiness discipline:
//! `Int(0)` and the empty string are *falsy* and are rejected as primary ids
//! by selector creators, while a falsy foreign key merely resolves to null.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Identifier of a record within its model's table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    /// Numeric id.
    Int(i64),
    /// String id.
    Str(String),
}

impl RecordId {
    /// Returns true for ids that do not denote a record: `0` and `""`.
    pub fn is_falsy(&self) -> bool {
        match self {
            RecordId::Int(n) => *n == 0,
            RecordId::Str(s) => s.is_empty(),
        }
    }

    /// Lifts a scalar field value into an id. Only integer and string
    /// values qualify; anything else (including null) yields `None`.
    pub fn from_value(value: &Value) -> Option<RecordId> {
        match value {
            Value::Int(n) => Some(RecordId::Int(*n)),
            Value::Str(s) => Some(RecordId::Str(s.clone())),
            _ => None,
        }
    }

    /// Returns true if `value` is the scalar form of this id.
    ///
    /// Used by reverse-relation scans to match a foreign-key field against
    /// the source record's id.
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (RecordId::Int(n), Value::Int(v)) => n == v,
            (RecordId::Str(s), Value::Str(v)) => s == v,
            _ => false,
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(n) => write!(f, "{}", n),
            RecordId::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for RecordId {
    fn from(n: i64) -> Self {
        RecordId::Int(n)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        RecordId::Str(s.to_string())
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        RecordId::Str(s)
    }
}
