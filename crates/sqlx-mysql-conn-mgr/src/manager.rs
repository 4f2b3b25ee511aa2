//! Process-wide MySQL connection with bounded connect retries

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;
use sqlx::MySqlPool;
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::Result;
use crate::config::{ConnectionConfig, ConnectionInfo, ManagerConfig};
use crate::error::Error;
use crate::ident::quote_identifier;
use crate::scoped::ScopedConnection;

/// Live pool together with the config it was opened with
#[derive(Debug)]
pub struct Session {
   config: ConnectionConfig,
   pool: MySqlPool,
}

impl Session {
   pub fn config(&self) -> &ConnectionConfig {
      &self.config
   }

   pub fn pool(&self) -> &MySqlPool {
      &self.pool
   }
}

/// Lifecycle of the manager's single connection
#[derive(Debug, Default)]
pub enum ConnectionState {
   #[default]
   Disconnected,
   Connecting,
   Connected(Arc<Session>),
   /// Last connect failed; holds the error message
   Failed(String),
}

/// Payload-free discriminant of [`ConnectionState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StateKind {
   Disconnected,
   Connecting,
   Connected,
   Failed,
}

impl ConnectionState {
   pub fn kind(&self) -> StateKind {
      match self {
         ConnectionState::Disconnected => StateKind::Disconnected,
         ConnectionState::Connecting => StateKind::Connecting,
         ConnectionState::Connected(_) => StateKind::Connected,
         ConnectionState::Failed(_) => StateKind::Failed,
      }
   }
}

/// Owner of the one logical MySQL connection for a process.
///
/// The manager holds at most one pool at a time. `connect()` and `disconnect()`
/// are serialized against each other, so two connects can never race to replace
/// the pool. Statement execution only needs a clone of the pool (see
/// [`ConnectionManager::pool`]) and does not block on the lifecycle lock.
///
/// # Example
///
/// ```no_run
/// use sqlx_mysql_conn_mgr::{ConnectionConfig, ConnectionManager, ManagerConfig};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), sqlx_mysql_conn_mgr::Error> {
/// let manager = Arc::new(ConnectionManager::new(Some(ManagerConfig::from_env())));
///
/// manager
///     .connect(ConnectionConfig::new("localhost", 3306, "root", "secret").with_database("shop"))
///     .await?;
///
/// let (one,): (i64,) = sqlx::query_as("SELECT 1")
///     .fetch_one(&manager.pool()?)
///     .await?;
///
/// manager.close().await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConnectionManager {
   config: ManagerConfig,

   /// Current lifecycle state; only written while `lifecycle` is held
   state: RwLock<ConnectionState>,

   /// Serializes connect/disconnect
   lifecycle: Mutex<()>,
}

/// Marks an in-flight `connect` as failed if its future is dropped before
/// it settles, so the state never stays `Connecting`.
struct PendingConnect<'a> {
   state: &'a RwLock<ConnectionState>,
   armed: bool,
}

impl<'a> PendingConnect<'a> {
   fn new(state: &'a RwLock<ConnectionState>) -> Self {
      Self { state, armed: true }
   }

   fn disarm(&mut self) {
      self.armed = false;
   }
}

impl Drop for PendingConnect<'_> {
   fn drop(&mut self) {
      if self.armed {
         warn!("Connect was cancelled before it completed");
         *self.state.write() = ConnectionState::Failed("connect cancelled".to_string());
      }
   }
}

impl ConnectionManager {
   /// Create a disconnected manager.
   ///
   /// Pass `None` to use defaults (10 connections, 3 connect attempts, 10 second
   /// attempt timeout). Use `ManagerConfig::from_env()` to honor the
   /// `DB_CONNECTION_RETRIES` / `DB_CONNECTION_TIMEOUT` overrides.
   pub fn new(custom_config: Option<ManagerConfig>) -> Self {
      Self {
         config: custom_config.unwrap_or_default(),
         state: RwLock::new(ConnectionState::Disconnected),
         lifecycle: Mutex::new(()),
      }
   }

   /// Create a disconnected manager configured from the environment.
   pub fn from_env() -> Self {
      Self::new(Some(ManagerConfig::from_env()))
   }

   pub fn config(&self) -> &ManagerConfig {
      &self.config
   }

   /// Open a pool for `config` and verify it with a liveness probe.
   ///
   /// Any existing pool is closed first. Each attempt is bounded by
   /// `connect_timeout_ms`; failed attempts are retried up to `connect_retries`
   /// times in total, sleeping `attempt * 1s` between attempts.
   ///
   /// # Errors
   ///
   /// - `Error::InvalidConfig` if host/user are empty or the port is 0 (no attempt is made)
   /// - `Error::ConnectFailed` carrying the last attempt's error once retries are exhausted
   /// - `Error::AttemptsExhausted` if the policy allows zero attempts
   pub async fn connect(&self, config: ConnectionConfig) -> Result<()> {
      let config = config.validated()?;
      let _lifecycle = self.lifecycle.lock().await;

      // No two pools coexist: tear down the previous one before opening anew
      let previous = std::mem::replace(&mut *self.state.write(), ConnectionState::Connecting);
      let mut pending = PendingConnect::new(&self.state);
      if let ConnectionState::Connected(session) = previous {
         debug!(
            "Closing pool for {}:{} before reconnecting",
            session.config.host, session.config.port
         );
         session.pool.close().await;
      }

      let outcome = self.connect_with_retry(&config).await;
      pending.disarm();

      match outcome {
         Ok(pool) => {
            info!(
               "Connected to MySQL at {}:{} as {}",
               config.host, config.port, config.user
            );
            *self.state.write() = ConnectionState::Connected(Arc::new(Session { config, pool }));
            Ok(())
         }
         Err(e) => {
            *self.state.write() = ConnectionState::Failed(e.to_string());
            Err(e)
         }
      }
   }

   async fn connect_with_retry(&self, config: &ConnectionConfig) -> Result<MySqlPool> {
      let retries = self.config.connect_retries;
      let timeout = self.config.connect_timeout();
      let mut last_error = None;

      for attempt in 1..=retries {
         let outcome = match tokio::time::timeout(timeout, self.open_pool(config)).await {
            Ok(result) => result,
            // The abandoned attempt's pool is dropped along with its future
            Err(_) => Err(Error::Timeout(timeout)),
         };

         match outcome {
            Ok(pool) => return Ok(pool),
            Err(e) => {
               warn!("Connection attempt {} of {} failed: {}", attempt, retries, e);
               last_error = Some(e);
            }
         }

         if attempt < retries {
            tokio::time::sleep(Duration::from_millis(1000 * u64::from(attempt))).await;
         }
      }

      Err(match last_error {
         Some(e) => Error::ConnectFailed {
            attempts: retries,
            source: Box::new(e),
         },
         None => Error::AttemptsExhausted,
      })
   }

   async fn open_pool(&self, config: &ConnectionConfig) -> Result<MySqlPool> {
      let mut options = MySqlConnectOptions::new()
         .host(&config.host)
         .port(config.port)
         .username(&config.user)
         .password(&config.password);

      if let Some(database) = &config.database {
         options = options.database(database);
      }

      let pool = MySqlPoolOptions::new()
         .max_connections(self.config.max_connections)
         .min_connections(0)
         .idle_timeout(Some(self.config.idle_timeout()))
         .acquire_timeout(self.config.connect_timeout())
         .connect_lazy_with(options);

      // Liveness probe; this is what actually opens the first connection
      if let Err(e) = sqlx::query("SELECT 1").execute(&pool).await {
         pool.close().await;
         return Err(match e {
            sqlx::Error::PoolTimedOut => Error::Timeout(self.config.connect_timeout()),
            other => Error::Sqlx(other),
         });
      }

      Ok(pool)
   }

   /// Close the pool if one is open and return to `Disconnected`.
   ///
   /// Idempotent: calling it while already disconnected is a no-op.
   pub async fn disconnect(&self) {
      let _lifecycle = self.lifecycle.lock().await;

      let previous = std::mem::replace(&mut *self.state.write(), ConnectionState::Disconnected);
      match previous {
         ConnectionState::Connected(session) => {
            // Waits for checked-out connections to be returned
            session.pool.close().await;
            info!(
               "Disconnected from MySQL at {}:{}",
               session.config.host, session.config.port
            );
         }
         _ => debug!("disconnect() called with no open pool"),
      }
   }

   /// Disconnect and consume the manager.
   ///
   /// Note: Takes `Arc<Self>` so the final shutdown can't be followed by further
   /// use through the same handle.
   pub async fn close(self: Arc<Self>) {
      self.disconnect().await;
   }

   /// Password-free description of the live connection, if any. Never does I/O.
   pub fn current_connection(&self) -> Option<ConnectionInfo> {
      match &*self.state.read() {
         ConnectionState::Connected(session) => Some(ConnectionInfo::from(&session.config)),
         _ => None,
      }
   }

   pub fn state_kind(&self) -> StateKind {
      self.state.read().kind()
   }

   /// Message of the error that left the manager in `Failed`
   pub fn last_error(&self) -> Option<String> {
      match &*self.state.read() {
         ConnectionState::Failed(message) => Some(message.clone()),
         _ => None,
      }
   }

   pub fn is_connected(&self) -> bool {
      self.state_kind() == StateKind::Connected
   }

   /// The live session (config + pool).
   ///
   /// # Errors
   ///
   /// Returns `Error::NotConnected` unless the state is `Connected`.
   pub fn session(&self) -> Result<Arc<Session>> {
      match &*self.state.read() {
         ConnectionState::Connected(session) => Ok(Arc::clone(session)),
         _ => Err(Error::NotConnected),
      }
   }

   /// Get a handle to the live pool for running statements.
   ///
   /// The returned handle is cheap to clone. Statements run through it should
   /// use fully-qualified `` `db`.`table` `` names, since pooled connections
   /// share no selected database.
   ///
   /// # Errors
   ///
   /// Returns `Error::NotConnected` unless the state is `Connected`.
   pub fn pool(&self) -> Result<MySqlPool> {
      Ok(self.session()?.pool.clone())
   }

   /// Draw one connection and select `database` on it.
   ///
   /// # Errors
   ///
   /// - `Error::InvalidIdentifier` if `database` cannot be quoted
   /// - `Error::NotConnected` unless the state is `Connected`
   /// - `Error::Sqlx` if acquiring the connection or selecting the database fails
   pub async fn acquire_scoped(&self, database: &str) -> Result<ScopedConnection> {
      let use_sql = format!("USE {}", quote_identifier(database)?);
      let pool = self.pool()?;

      let mut conn = pool.acquire().await?;
      sqlx::raw_sql(&use_sql).execute(&mut *conn).await?;

      Ok(ScopedConnection::new(conn, database.to_string()))
   }
}

impl Default for ConnectionManager {
   fn default() -> Self {
      Self::new(None)
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   fn config() -> ConnectionConfig {
      ConnectionConfig::new("127.0.0.1", 1, "root", "x")
   }

   #[tokio::test]
   async fn test_starts_disconnected() {
      let manager = ConnectionManager::new(None);

      assert_eq!(manager.state_kind(), StateKind::Disconnected);
      assert!(manager.current_connection().is_none());
      assert!(manager.last_error().is_none());
      assert!(matches!(manager.pool(), Err(Error::NotConnected)));
   }

   #[tokio::test]
   async fn test_disconnect_is_idempotent() {
      let manager = ConnectionManager::new(None);

      manager.disconnect().await;
      assert_eq!(manager.state_kind(), StateKind::Disconnected);

      manager.disconnect().await;
      assert_eq!(manager.state_kind(), StateKind::Disconnected);
   }

   #[tokio::test]
   async fn test_invalid_config_makes_no_attempt() {
      let manager = ConnectionManager::new(None);

      let result = manager
         .connect(ConnectionConfig::new("", 3306, "root", "x"))
         .await;

      assert!(matches!(result, Err(Error::InvalidConfig(_))));
      // Validation happens before the state machine is touched
      assert_eq!(manager.state_kind(), StateKind::Disconnected);
   }

   #[tokio::test]
   async fn test_zero_retries_exhausts_without_cause() {
      let manager = ConnectionManager::new(Some(ManagerConfig {
         connect_retries: 0,
         ..Default::default()
      }));

      let result = manager.connect(config()).await;

      assert!(matches!(result, Err(Error::AttemptsExhausted)));
      assert_eq!(manager.state_kind(), StateKind::Failed);
      assert!(manager.last_error().unwrap().contains("exhausted"));
   }

   #[tokio::test]
   async fn test_acquire_scoped_requires_connection() {
      let manager = ConnectionManager::new(None);

      let result = manager.acquire_scoped("shop").await;
      assert!(matches!(result, Err(Error::NotConnected)));

      // Identifier problems are reported before the connection check
      let result = manager.acquire_scoped("").await;
      assert!(matches!(result, Err(Error::InvalidIdentifier { .. })));
   }

   #[test]
   fn test_state_kind_serializes_lowercase() {
      assert_eq!(
         serde_json::to_string(&StateKind::Connected).unwrap(),
         "\"connected\""
      );
   }
}
