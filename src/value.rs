//! The dynamic, recursive data-side value domain exchanged at the public
//! API boundary (SPEC_FULL.md §9 "Dynamic typing of the data side").

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, FixedOffset};

/// The reserved key under which a text-node's body value is stored when the
/// node also carries attribute values. Part of the public shape contract —
/// keep it literal.
pub const VALUE_KEY: &str = "#value";

/// A decoded or to-be-encoded value. Recursive: `Mapping`/`List` may
/// contain further `Value`s.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// A date/time value.
    ///
    /// `has_time` distinguishes a bare calendar date (iso-date without a
    /// time-of-day component) from a full timestamp. `has_offset`
    /// distinguishes an explicit zone (decoded from input that carried one)
    /// from a naive value normalized to a zero offset for storage.
    /// iso-date's "timezone optional; preserved on round-trip" requirement
    /// is implemented by keeping both flags alongside the value.
    Date {
        value: DateTime<FixedOffset>,
        has_time: bool,
        has_offset: bool,
    },
    List(Vec<Value>),
    Mapping(BTreeMap<String, Value>),
}

impl Value {
    pub fn as_mapping(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::String(s) => f.write_str(s),
            Value::Date { value, .. } => write!(f, "{}", value),
            Value::List(items) => write!(f, "[{} items]", items.len()),
            Value::Mapping(map) => write!(f, "{{{} keys}}", map.len()),
        }
    }
}
