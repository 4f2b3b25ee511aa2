//! Error types for sqlx-mysql-conn-mgr

use std::time::Duration;

use thiserror::Error;

/// Errors that may occur when working with sqlx-mysql-conn-mgr
#[derive(Error, Debug)]
pub enum Error {
   /// Error from the sqlx library. Standard sqlx errors are converted to this variant
   #[error("Sqlx error: {0}")]
   Sqlx(#[from] sqlx::Error),

   /// No connection has been established, or it was torn down
   #[error("Database not connected")]
   NotConnected,

   /// Connection parameters rejected before any I/O
   #[error("Invalid connection config: {0}")]
   InvalidConfig(String),

   /// A single connection attempt (or statement) exceeded its time bound
   #[error("Timed out after {}ms", .0.as_millis())]
   Timeout(Duration),

   /// Every connection attempt failed; carries the last underlying error
   #[error("Failed to connect after {attempts} attempt(s): {source}")]
   ConnectFailed {
      attempts: u32,
      #[source]
      source: Box<Error>,
   },

   /// Connect was configured with zero attempts, so no error was ever recorded
   #[error("Failed to connect: connection attempts exhausted")]
   AttemptsExhausted,

   /// Identifier cannot be safely quoted as a MySQL schema object name
   #[error("Invalid identifier '{name}': {reason}")]
   InvalidIdentifier { name: String, reason: &'static str },
}

impl Error {
   /// True for errors raised because the manager has no live pool.
   pub fn is_not_connected(&self) -> bool {
      matches!(self, Error::NotConnected)
   }
}
