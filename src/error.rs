use std::time::Duration;

use serde::{Serialize, Serializer};
use sqlx::mysql::MySqlDatabaseError;
use sqlx_mysql_conn_mgr::Error as ConnError;

/// Result type alias for admin operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Structured error response for callers that marshal to JSON.
#[derive(Serialize)]
struct ErrorResponse {
   code: String,
   message: String,
}

/// Error types for statement building and execution.
#[derive(Debug, thiserror::Error)]
pub enum Error {
   /// Error from SQLx operations, including errors reported by the MySQL server.
   #[error(transparent)]
   Sqlx(#[from] sqlx::Error),

   /// Error from the connection manager (not connected, connect failures).
   #[error(transparent)]
   ConnectionManager(#[from] ConnError),

   /// Input rejected before any statement was sent.
   #[error("invalid {field}: {reason}")]
   Validation { field: String, reason: String },

   /// MySQL type that cannot be mapped to JSON.
   #[error("unsupported datatype: {0}")]
   UnsupportedDatatype(String),

   /// Statement exceeded the configured query timeout.
   #[error("statement timed out after {}ms", .0.as_millis())]
   Timeout(Duration),
}

impl Error {
   pub(crate) fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
      Error::Validation {
         field: field.into(),
         reason: reason.into(),
      }
   }

   /// MySQL server error number (e.g. 1146 for an unknown table), if the
   /// server rejected the statement.
   pub fn engine_code(&self) -> Option<u16> {
      let sqlx_error = match self {
         Error::Sqlx(e) => e,
         Error::ConnectionManager(ConnError::Sqlx(e)) => e,
         _ => return None,
      };

      sqlx_error
         .as_database_error()
         .and_then(|db_err| db_err.try_downcast_ref::<MySqlDatabaseError>())
         .map(MySqlDatabaseError::number)
   }

   /// Extract a structured error code from the error type.
   ///
   /// This provides machine-readable error codes for error handling.
   pub fn error_code(&self) -> String {
      if let Some(number) = self.engine_code() {
         return format!("MYSQL_{}", number);
      }

      match self {
         Error::Sqlx(_) => "SQLX_ERROR".to_string(),
         Error::ConnectionManager(e) => match e {
            ConnError::NotConnected => "NOT_CONNECTED".to_string(),
            ConnError::ConnectFailed { .. } | ConnError::AttemptsExhausted => {
               "CONNECT_FAILED".to_string()
            }
            ConnError::Timeout(_) => "TIMEOUT".to_string(),
            ConnError::InvalidConfig(_) => "INVALID_CONFIG".to_string(),
            ConnError::InvalidIdentifier { .. } => "VALIDATION_ERROR".to_string(),
            ConnError::Sqlx(_) => "CONNECTION_ERROR".to_string(),
         },
         Error::Validation { .. } => "VALIDATION_ERROR".to_string(),
         Error::UnsupportedDatatype(_) => "UNSUPPORTED_DATATYPE".to_string(),
         Error::Timeout(_) => "TIMEOUT".to_string(),
      }
   }

   /// True when the call failed because no connection is open.
   pub fn is_not_connected(&self) -> bool {
      matches!(self, Error::ConnectionManager(e) if e.is_not_connected())
   }
}

impl Serialize for Error {
   fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
   where
      S: Serializer,
   {
      let response = ErrorResponse {
         code: self.error_code(),
         message: self.to_string(),
      };
      response.serialize(serializer)
   }
}
