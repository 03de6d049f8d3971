// ABOUTME: Export document model and its JSON wire encoding.
// ABOUTME: Insertion-ordered key/value map with strict, no-fallback lookups.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// The bytes could not be read as an export document.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("export document is not valid JSON: {0}")]
    Json(#[source] serde_json::Error),

    #[error("export document must be a JSON object, found {0}")]
    NotAnObject(&'static str),
}

/// A decoded document lacks a key, or a key has the wrong shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("export document has no key '{key}'")]
    Missing { key: String },

    #[error("export key '{key}' should be a {expected}, found {found}")]
    WrongShape {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("export document is missing required keys: {}", .missing.join(", "))]
    Incomplete { missing: Vec<String> },
}

/// Resource identifiers handed from a producer run to consumer runs.
///
/// Keys keep the order in which the producer inserted them, and the same
/// order is restored on decode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExportDocument {
    entries: IndexMap<String, Value>,
}

impl ExportDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a key, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.entries.insert(key.into(), value.into())
    }

    /// Merge another document in; later keys overwrite earlier ones.
    pub fn extend(&mut self, other: ExportDocument) {
        self.entries.extend(other.entries);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Look up a key that must be present. There is no default value.
    pub fn require(&self, key: &str) -> Result<&Value, SchemaError> {
        self.entries.get(key).ok_or_else(|| SchemaError::Missing {
            key: key.to_string(),
        })
    }

    /// Look up a key that must be present and hold a string.
    pub fn require_str(&self, key: &str) -> Result<&str, SchemaError> {
        match self.require(key)? {
            Value::String(s) => Ok(s),
            other => Err(SchemaError::WrongShape {
                key: key.to_string(),
                expected: "string",
                found: value_kind(other),
            }),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Encode as pretty-printed JSON, keys in insertion order.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut bytes = serde_json::to_vec_pretty(&self.entries)?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    /// Decode a JSON object. Anything but a top-level object is rejected.
    pub fn decode(bytes: &[u8]) -> Result<Self, ParseError> {
        match serde_json::from_slice::<IndexMap<String, Value>>(bytes) {
            Ok(entries) => Ok(Self { entries }),
            Err(err) => match serde_json::from_slice::<Value>(bytes) {
                Ok(other) => Err(ParseError::NotAnObject(value_kind(&other))),
                Err(_) => Err(ParseError::Json(err)),
            },
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for ExportDocument {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
