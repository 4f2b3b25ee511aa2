//! Administrative operations for a MySQL server, built on sqlx.
//!
//! This crate sits on top of the connection manager (`sqlx-mysql-conn-mgr`) and
//! turns structured intents into single statements. It provides:
//!
//! - [`AdminClient`]: main entry point for databases, tables, records and raw SQL
//! - [`RecordsBuilder`]: paginated reads with an optional total count
//! - DDL rendering from [`ColumnDefinition`]s and `DESCRIBE` parsing into [`ColumnDescriptor`]s
//! - JSON decoding of MySQL values into ordered [`Record`]s
//!
//! Database, table and column names are backtick-quoted with embedded backticks
//! doubled; values are always bound as parameters.
//!
//! # Example
//!
//! ```no_run
//! use sqlx_mysql_admin::{AdminClient, ConnectionConfig, QueryResult, RecordPayload};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = AdminClient::from_env();
//! client.connect(ConnectionConfig::from_env_defaults()).await?;
//!
//! for name in client.list_tables("shop").await? {
//!    println!("{name}");
//! }
//!
//! // Write
//! let payload = RecordPayload::try_from(json!({"email": "a@b.com"}))?;
//! client.insert_record("shop", "users", payload).await?;
//!
//! // Read
//! let rows = client.records("shop", "users").limit(10).await?;
//!
//! // Anything else
//! if let QueryResult::Rows { rows } = client.raw_query("shop", "SELECT NOW()").await? {
//!    println!("{:?}", rows);
//! }
//!
//! client.disconnect().await;
//! # Ok(())
//! # }
//! ```

pub mod builders;
pub mod decode;
pub mod error;
mod ident;
pub mod record;
pub mod schema;
pub mod wrapper;

pub use builders::{DEFAULT_PAGE_LIMIT, RecordPage, RecordsBuilder};
pub use error::{Error, Result};
pub use record::{Record, RecordPayload};
pub use schema::{ColumnDefinition, ColumnDescriptor, KeyKind};
pub use wrapper::{AdminClient, DEFAULT_ID_COLUMN, QueryResult, WriteQueryResult};

// Re-export commonly used types from the connection manager
pub use sqlx_mysql_conn_mgr::{
   ConnectionConfig, ConnectionInfo, ConnectionManager, ManagerConfig, StateKind,
};
