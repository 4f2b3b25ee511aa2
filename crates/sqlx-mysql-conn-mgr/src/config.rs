//! Configuration for the MySQL connection manager and its connection targets

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::Result;
use crate::error::Error;

/// Environment variable overriding [`ManagerConfig::connect_retries`]
pub const ENV_CONNECTION_RETRIES: &str = "DB_CONNECTION_RETRIES";

/// Environment variable overriding [`ManagerConfig::connect_timeout_ms`]
pub const ENV_CONNECTION_TIMEOUT: &str = "DB_CONNECTION_TIMEOUT";

/// Environment variable setting [`ManagerConfig::query_timeout_ms`]
pub const ENV_QUERY_TIMEOUT: &str = "DB_QUERY_TIMEOUT";

const DEFAULT_PORT: u16 = 3306;

/// Process-wide pool and connect policy
///
/// Retries and timeouts are a single policy for the whole process rather than
/// per-call arguments. Use [`ManagerConfig::from_env`] to pick up overrides from
/// the environment.
///
/// # Examples
///
/// ```
/// use sqlx_mysql_conn_mgr::ManagerConfig;
///
/// // Use defaults
/// let config = ManagerConfig::default();
/// assert_eq!(config.connect_retries, 3);
///
/// // Override just one field
/// let config = ManagerConfig {
///     connect_timeout_ms: 2_000,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerConfig {
   /// Maximum number of physical connections in the pool
   ///
   /// Default: 10
   pub max_connections: u32,

   /// Idle timeout for pooled connections (in seconds)
   ///
   /// Default: 30
   pub idle_timeout_secs: u64,

   /// Number of connection attempts made by `connect()` before giving up
   ///
   /// Default: 3
   pub connect_retries: u32,

   /// Upper bound for a single connection attempt (in milliseconds)
   ///
   /// Default: 10000
   pub connect_timeout_ms: u64,

   /// Optional deadline applied to every statement after the connection is up
   /// (in milliseconds). `None` leaves statements unbounded.
   ///
   /// Default: None
   pub query_timeout_ms: Option<u64>,
}

impl Default for ManagerConfig {
   fn default() -> Self {
      Self {
         max_connections: 10,
         idle_timeout_secs: 30,
         connect_retries: 3,
         connect_timeout_ms: 10_000,
         query_timeout_ms: None,
      }
   }
}

impl ManagerConfig {
   /// Defaults with `DB_CONNECTION_RETRIES`, `DB_CONNECTION_TIMEOUT` and
   /// `DB_QUERY_TIMEOUT` applied when they are set and parse.
   pub fn from_env() -> Self {
      Self::default().with_overrides(|key| std::env::var(key).ok())
   }

   /// Apply overrides from an arbitrary key lookup.
   ///
   /// Values that fail to parse are ignored and the current value is kept.
   pub fn with_overrides<F>(mut self, lookup: F) -> Self
   where
      F: Fn(&str) -> Option<String>,
   {
      if let Some(retries) = parse_override::<u32>(&lookup, ENV_CONNECTION_RETRIES) {
         self.connect_retries = retries;
      }
      if let Some(timeout) = parse_override::<u64>(&lookup, ENV_CONNECTION_TIMEOUT) {
         self.connect_timeout_ms = timeout;
      }
      if let Some(timeout) = parse_override::<u64>(&lookup, ENV_QUERY_TIMEOUT) {
         self.query_timeout_ms = Some(timeout);
      }
      self
   }

   pub fn connect_timeout(&self) -> Duration {
      Duration::from_millis(self.connect_timeout_ms)
   }

   pub fn query_timeout(&self) -> Option<Duration> {
      self.query_timeout_ms.map(Duration::from_millis)
   }

   pub fn idle_timeout(&self) -> Duration {
      Duration::from_secs(self.idle_timeout_secs)
   }
}

fn parse_override<T: std::str::FromStr>(
   lookup: &impl Fn(&str) -> Option<String>,
   key: &str,
) -> Option<T> {
   let raw = lookup(key)?;
   match raw.trim().parse::<T>() {
      Ok(value) => Some(value),
      Err(_) => {
         warn!("Ignoring {}={:?}: not a valid number", key, raw);
         None
      }
   }
}

/// Target server and credentials for one connection attempt
///
/// The password is never serialized and is redacted from `Debug` output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
   pub host: String,
   pub port: u16,
   pub user: String,
   #[serde(skip_serializing, default)]
   pub password: String,
   #[serde(default)]
   pub database: Option<String>,
}

impl fmt::Debug for ConnectionConfig {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("ConnectionConfig")
         .field("host", &self.host)
         .field("port", &self.port)
         .field("user", &self.user)
         .field("password", &"<redacted>")
         .field("database", &self.database)
         .finish()
   }
}

impl ConnectionConfig {
   pub fn new(
      host: impl Into<String>,
      port: u16,
      user: impl Into<String>,
      password: impl Into<String>,
   ) -> Self {
      Self {
         host: host.into(),
         port,
         user: user.into(),
         password: password.into(),
         database: None,
      }
   }

   /// Set the default database; an empty name means "none".
   pub fn with_database(mut self, database: impl Into<String>) -> Self {
      let database = database.into();
      self.database = (!database.is_empty()).then_some(database);
      self
   }

   /// Build a config from `DEFAULT_DB_HOST`, `DEFAULT_DB_PORT`, `DEFAULT_DB_USER`,
   /// `DEFAULT_DB_PASSWORD` and `DEFAULT_DB_NAME`.
   ///
   /// Missing values fall back to an empty host/user/password, port 3306 and no
   /// database. The result is not validated here; `connect()` does that.
   pub fn from_env_defaults() -> Self {
      Self::from_lookup(|key| std::env::var(key).ok())
   }

   fn from_lookup<F>(lookup: F) -> Self
   where
      F: Fn(&str) -> Option<String>,
   {
      let port = parse_override::<u16>(&lookup, "DEFAULT_DB_PORT").unwrap_or(DEFAULT_PORT);
      Self::new(
         lookup("DEFAULT_DB_HOST").unwrap_or_default(),
         port,
         lookup("DEFAULT_DB_USER").unwrap_or_default(),
         lookup("DEFAULT_DB_PASSWORD").unwrap_or_default(),
      )
      .with_database(lookup("DEFAULT_DB_NAME").unwrap_or_default())
   }

   /// Check the config before any I/O and normalize an empty database name.
   pub(crate) fn validated(mut self) -> Result<Self> {
      if self.host.trim().is_empty() {
         return Err(Error::InvalidConfig("host must not be empty".into()));
      }
      if self.user.trim().is_empty() {
         return Err(Error::InvalidConfig("user must not be empty".into()));
      }
      if self.port == 0 {
         return Err(Error::InvalidConfig(
            "port must be between 1 and 65535".into(),
         ));
      }
      if self.database.as_deref().is_some_and(str::is_empty) {
         self.database = None;
      }
      Ok(self)
   }
}

/// Password-free view of the active connection
///
/// This is what callers may persist (e.g. in a cookie) and display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
   pub host: String,
   pub port: u16,
   pub user: String,
   pub database: Option<String>,
}

impl From<&ConnectionConfig> for ConnectionInfo {
   fn from(config: &ConnectionConfig) -> Self {
      Self {
         host: config.host.clone(),
         port: config.port,
         user: config.user.clone(),
         database: config.database.clone(),
      }
   }
}
