//! # sqlx-mysql-conn-mgr
//!
//! A minimal wrapper around SQLx that owns the single MySQL connection of an
//! administrative tool: connect with bounded retries, tear down, and hand out the
//! pool for statement execution.
//!
//! ## Core Types
//!
//! - **[`ConnectionManager`]**: Owns the one pool, serializes connect/disconnect
//! - **[`ConnectionConfig`]**: Target server and credentials (password never serialized)
//! - **[`ConnectionInfo`]**: Password-free snapshot of the live connection
//! - **[`ManagerConfig`]**: Pool size and connect policy, overridable from the environment
//! - **[`ScopedConnection`]**: RAII guard over a pooled connection with a database selected
//! - **[`Error`]**: Error type for connection operations
//!
//! ## Architecture
//!
//! - **One logical connection**: connecting again closes the previous pool first
//! - **Bounded connect**: each attempt is timeout-bounded; failures retry with linear backoff
//! - **No session state on the pool**: pooled statements use fully-qualified names, and
//!   statements that need a selected database run on a [`ScopedConnection`]
//!
//! ## Usage
//!
//! ```no_run
//! use sqlx_mysql_conn_mgr::{ConnectionConfig, ConnectionManager, quote_identifier};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> sqlx_mysql_conn_mgr::Result<()> {
//!     let manager = Arc::new(ConnectionManager::from_env());
//!
//!     manager
//!         .connect(ConnectionConfig::new("localhost", 3306, "root", "secret"))
//!         .await?;
//!
//!     // Connected state is visible without I/O (password excluded)
//!     let info = manager.current_connection().unwrap();
//!     assert_eq!(info.host, "localhost");
//!
//!     let sql = format!("SELECT COUNT(*) FROM {}.{}", quote_identifier("shop")?, quote_identifier("users")?);
//!     let (count,): (i64,) = sqlx::query_as(&sql).fetch_one(&manager.pool()?).await?;
//!
//!     manager.close().await;
//!     Ok(())
//! }
//! ```
//!
mod config;
mod error;
mod ident;
mod manager;
mod scoped;

// Re-export public types
pub use config::{
   ConnectionConfig, ConnectionInfo, ENV_CONNECTION_RETRIES, ENV_CONNECTION_TIMEOUT,
   ENV_QUERY_TIMEOUT, ManagerConfig,
};
pub use error::Error;
pub use ident::{MAX_IDENTIFIER_LEN, qualified, quote_identifier, validate_identifier};
pub use manager::{ConnectionManager, ConnectionState, Session, StateKind};
pub use scoped::ScopedConnection;

/// A type alias for Results with our custom Error type
pub type Result<T> = std::result::Result<T, Error>;
