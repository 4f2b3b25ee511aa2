//! ScopedConnection for statements that must run against a selected database

use sqlx::mysql::MySqlConnection;
use sqlx::{Connection, MySql};
use sqlx::pool::PoolConnection;
use std::ops::{Deref, DerefMut};

use crate::Result;

/// RAII guard over one pooled connection whose session has a database selected
///
/// The `USE` statement and every statement run through this guard share the
/// same physical connection, and no other caller can draw that connection until
/// the guard is dropped. Use it for caller-supplied SQL that may reference
/// unqualified table names.
///
/// The guard derefs to `MySqlConnection` allowing direct use with sqlx queries.
///
/// # Example
///
/// ```no_run
/// use sqlx_mysql_conn_mgr::{ConnectionConfig, ConnectionManager};
///
/// # async fn example() -> Result<(), sqlx_mysql_conn_mgr::Error> {
/// let manager = ConnectionManager::new(None);
/// manager
///     .connect(ConnectionConfig::new("localhost", 3306, "root", "secret"))
///     .await?;
///
/// let mut conn = manager.acquire_scoped("shop").await?;
/// sqlx::raw_sql("SELECT * FROM users")
///     .fetch_all(&mut *conn)
///     .await?;
/// // Connection is returned to the pool when dropped
/// drop(conn);
///
/// // Session state set here must not reach other callers
/// let mut conn = manager.acquire_scoped("shop").await?;
/// conn.close_on_drop();
/// sqlx::raw_sql("SET @marker = 1").execute(&mut *conn).await?;
/// conn.close().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ScopedConnection {
   conn: PoolConnection<MySql>,
   database: String,
}

impl ScopedConnection {
   pub(crate) fn new(conn: PoolConnection<MySql>, database: String) -> Self {
      Self { conn, database }
   }

   /// Name of the database selected on this connection
   pub fn database(&self) -> &str {
      &self.database
   }

   /// Close the physical connection when this guard is dropped instead of
   /// returning it to the pool.
   ///
   /// Covers the case where the guard is dropped early, such as a cancelled
   /// statement.
   pub fn close_on_drop(&mut self) {
      self.conn.close_on_drop();
   }

   /// Detach from the pool and close the connection.
   ///
   /// Session state (variables, temporary tables, open transactions, the
   /// selected database) goes with it. The pool opens a fresh connection in its
   /// place when needed.
   pub async fn close(self) -> Result<()> {
      self.conn.detach().close().await?;
      Ok(())
   }
}

impl Deref for ScopedConnection {
   type Target = MySqlConnection;

   fn deref(&self) -> &Self::Target {
      &self.conn
   }
}

impl DerefMut for ScopedConnection {
   fn deref_mut(&mut self) -> &mut Self::Target {
      &mut self.conn
   }
}
