//! Row and payload types

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::Error;

/// One decoded row: column name → value, in column order
pub type Record = IndexMap<String, JsonValue>;

/// Column → value mapping supplied by a caller for an insert or update.
///
/// Keys are column names and are checked against the target table before any
/// statement is built. Values are always bound as parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordPayload(IndexMap<String, JsonValue>);

impl RecordPayload {
   pub fn new() -> Self {
      Self::default()
   }

   /// Add a column value, replacing any previous value for the same column.
   pub fn insert(mut self, column: impl Into<String>, value: impl Into<JsonValue>) -> Self {
      self.0.insert(column.into(), value.into());
      self
   }

   /// Drop every key whose value is the empty string.
   ///
   /// HTML forms submit untouched inputs as `""`; removing them lets those
   /// columns fall back to their defaults instead of storing empty text.
   pub fn without_blank_strings(self) -> Self {
      Self(
         self
            .0
            .into_iter()
            .filter(|(_, value)| value.as_str() != Some(""))
            .collect(),
      )
   }

   pub fn keys(&self) -> impl Iterator<Item = &str> {
      self.0.keys().map(String::as_str)
   }

   pub fn is_empty(&self) -> bool {
      self.0.is_empty()
   }

   pub fn len(&self) -> usize {
      self.0.len()
   }

   pub fn into_inner(self) -> IndexMap<String, JsonValue> {
      self.0
   }
}

impl From<IndexMap<String, JsonValue>> for RecordPayload {
   fn from(map: IndexMap<String, JsonValue>) -> Self {
      Self(map)
   }
}

impl<K: Into<String>, V: Into<JsonValue>> FromIterator<(K, V)> for RecordPayload {
   fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
      Self(
         iter
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect(),
      )
   }
}

impl TryFrom<JsonValue> for RecordPayload {
   type Error = Error;

   /// Accepts only a JSON object; anything else is a validation error.
   fn try_from(value: JsonValue) -> Result<Self, Self::Error> {
      match value {
         JsonValue::Object(map) => Ok(map.into_iter().collect()),
         other => Err(Error::validation(
            "data",
            format!("expected an object, got {}", json_kind(&other)),
         )),
      }
   }
}

fn json_kind(value: &JsonValue) -> &'static str {
   match value {
      JsonValue::Null => "null",
      JsonValue::Bool(_) => "a boolean",
      JsonValue::Number(_) => "a number",
      JsonValue::String(_) => "a string",
      JsonValue::Array(_) => "an array",
      JsonValue::Object(_) => "an object",
   }
}
