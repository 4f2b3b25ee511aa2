use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use sqlx::mysql::{MySqlRow, MySqlValue, MySqlValueRef};
use sqlx::{Column, Row, TypeInfo, Value, ValueRef};
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time};

use crate::Error;
use crate::record::Record;

/// Convert a MySQL value to a JSON value.
///
/// This function handles the type conversion from MySQL's column types
/// to JSON-compatible representations.
///
/// Note: binary values are returned as base64-encoded strings since JSON
/// has no native binary type. DECIMAL is returned as a string to keep its
/// exact digits, and temporal types are returned as strings.
pub fn to_json(value: MySqlValueRef) -> Result<JsonValue, Error> {
   if value.is_null() {
      return Ok(JsonValue::Null);
   }

   let column_type = value.type_info();
   let owned = ValueRef::to_owned(&value);

   let result = match column_type.name() {
      // TINYINT(1)
      "BOOLEAN" => decode_or_null(&owned, JsonValue::Bool),

      "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
         decode_or_null(&owned, |v: i64| JsonValue::Number(v.into()))
      }

      "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
      | "BIGINT UNSIGNED" | "BIT" => decode_or_null(&owned, |v: u64| JsonValue::Number(v.into())),

      "YEAR" => match owned.try_decode_unchecked::<i64>() {
         Ok(v) => JsonValue::Number(v.into()),
         Err(_) => JsonValue::Null,
      },

      "FLOAT" => decode_or_null(&owned, |v: f32| JsonValue::from(f64::from(v))),

      "DOUBLE" => decode_or_null(&owned, |v: f64| JsonValue::from(v)),

      "DECIMAL" => {
         // Sent as text in both protocols; keep the exact digits
         match owned.try_decode_unchecked::<String>() {
            Ok(v) => JsonValue::String(v),
            Err(_) => JsonValue::Null,
         }
      }

      "CHAR" | "VARCHAR" | "TINYTEXT" | "TEXT" | "MEDIUMTEXT" | "LONGTEXT" | "ENUM" | "SET" => {
         decode_or_null(&owned, JsonValue::String)
      }

      "JSON" => decode_or_null(&owned, |v: JsonValue| v),

      "DATE" => decode_or_null(&owned, |v: Date| JsonValue::String(v.to_string())),

      "TIME" => decode_or_null(&owned, |v: Time| JsonValue::String(v.to_string())),

      "DATETIME" => {
         if let Ok(dt) = owned.try_decode::<PrimitiveDateTime>() {
            JsonValue::String(dt.to_string())
         } else if let Ok(v) = owned.try_decode_unchecked::<String>() {
            // Zero dates and other values `time` can't represent
            JsonValue::String(v)
         } else {
            JsonValue::Null
         }
      }

      "TIMESTAMP" => {
         if let Ok(dt) = owned.try_decode::<OffsetDateTime>() {
            JsonValue::String(dt.to_string())
         } else if let Ok(dt) = owned.try_decode::<PrimitiveDateTime>() {
            JsonValue::String(dt.to_string())
         } else {
            JsonValue::Null
         }
      }

      "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" | "GEOMETRY" => {
         match owned.try_decode_unchecked::<Vec<u8>>() {
            // Encode binary data as base64 for JSON serialization
            Ok(blob) => JsonValue::String(base64_encode(&blob)),
            Err(_) => JsonValue::Null,
         }
      }

      "NULL" => JsonValue::Null,

      _ => {
         // For unknown types, try to decode as text
         if let Ok(text) = owned.try_decode_unchecked::<String>() {
            JsonValue::String(text)
         } else {
            return Err(Error::UnsupportedDatatype(format!(
               "Unknown MySQL type: {}",
               column_type.name()
            )));
         }
      }
   };

   Ok(result)
}

fn decode_or_null<T, F>(value: &MySqlValue, into_json: F) -> JsonValue
where
   T: for<'r> sqlx::Decode<'r, sqlx::MySql> + sqlx::Type<sqlx::MySql>,
   F: FnOnce(T) -> JsonValue,
{
   match value.try_decode::<T>() {
      Ok(v) => into_json(v),
      Err(_) => JsonValue::Null,
   }
}

/// Decode one row into an ordered column → value map.
pub fn decode_row(row: &MySqlRow) -> Result<Record, Error> {
   let mut record = IndexMap::with_capacity(row.columns().len());
   for (i, column) in row.columns().iter().enumerate() {
      let value = to_json(row.try_get_raw(i)?)?;
      record.insert(column.name().to_string(), value);
   }
   Ok(record)
}

/// Helper to decode MySQL rows to JSON
pub fn decode_rows(rows: Vec<MySqlRow>) -> Result<Vec<Record>, Error> {
   rows.iter().map(decode_row).collect()
}

/// Read a column as text regardless of whether the server labelled it binary.
///
/// `SHOW` and `DESCRIBE` output is reported as VARBINARY by some server
/// versions, which the checked `String` decoder refuses.
pub(crate) fn text_column(row: &MySqlRow, index: usize) -> Result<Option<String>, Error> {
   Ok(row.try_get_unchecked::<Option<String>, _>(index)?)
}

/// Base64 encode binary data for JSON serialization.
///
/// MySQL binary columns are encoded as base64 strings when serialized to JSON,
/// as JSON does not have a native binary type.
fn base64_encode(data: &[u8]) -> String {
   use base64::Engine;
   base64::engine::general_purpose::STANDARD.encode(data)
}
