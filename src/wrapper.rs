use std::future::Future;
use std::sync::Arc;

use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::mysql::{MySqlArguments, MySqlQueryResult};
use sqlx::query::Query;
use sqlx::{Either, MySql};
use sqlx_mysql_conn_mgr::{ConnectionConfig, ConnectionInfo, ConnectionManager, ScopedConnection};
use tracing::{debug, warn};

use crate::builders::RecordsBuilder;
use crate::decode::{decode_row, decode_rows, text_column};
use crate::ident::{qualified, quote};
use crate::record::{Record, RecordPayload};
use crate::schema::{ColumnDefinition, ColumnDescriptor, build_create_table};
use crate::{Error, Result};

/// Column used to address a row when the caller doesn't name one
pub const DEFAULT_ID_COLUMN: &str = "id";

/// Result returned from write operations (e.g. INSERT, UPDATE, DELETE).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteQueryResult {
   /// The number of rows affected by the write operation.
   pub affected_rows: u64,
   /// The AUTO_INCREMENT value generated by the statement.
   ///
   /// `None` when the statement generated no value (updates, deletes, inserts
   /// into tables without an AUTO_INCREMENT column).
   pub insert_id: Option<u64>,
}

impl From<MySqlQueryResult> for WriteQueryResult {
   fn from(result: MySqlQueryResult) -> Self {
      Self {
         affected_rows: result.rows_affected(),
         insert_id: Some(result.last_insert_id()).filter(|id| *id != 0),
      }
   }
}

/// Outcome of a raw statement, shaped by what the statement produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum QueryResult {
   Rows { rows: Vec<Record> },
   Write(WriteQueryResult),
}

impl QueryResult {
   pub fn rows(&self) -> Option<&[Record]> {
      match self {
         QueryResult::Rows { rows } => Some(rows),
         QueryResult::Write(_) => None,
      }
   }

   pub fn write_result(&self) -> Option<&WriteQueryResult> {
      match self {
         QueryResult::Write(result) => Some(result),
         QueryResult::Rows { .. } => None,
      }
   }
}

/// Statement builder and executor over a shared [`ConnectionManager`].
///
/// Every operation targets a database by name and issues exactly one statement
/// (plus a `DESCRIBE` where a payload must be checked against the table's
/// columns). Identifiers are backtick-quoted and fully qualified as
/// `` `db`.`table` ``, so statements never depend on the session's selected
/// database; every value is bound as a parameter.
///
/// The client is cheap to clone; clones share the same manager.
///
/// # Example
///
/// ```no_run
/// # async fn example() -> Result<(), sqlx_mysql_admin::Error> {
/// use sqlx_mysql_admin::{AdminClient, ColumnDefinition, ConnectionConfig, RecordPayload};
///
/// let client = AdminClient::from_env();
/// client
///    .connect(ConnectionConfig::new("localhost", 3306, "root", "secret"))
///    .await?;
///
/// client.create_database("shop").await?;
/// client
///    .create_table(
///       "shop",
///       "users",
///       &[
///          ColumnDefinition::new("id", "INT").primary().auto_increment().not_null(),
///          ColumnDefinition::new("email", "VARCHAR").length("255").not_null(),
///       ],
///    )
///    .await?;
///
/// let result = client
///    .insert_record("shop", "users", RecordPayload::new().insert("email", "a@b.com"))
///    .await?;
/// println!("Inserted row {:?}", result.insert_id);
///
/// let page = client.records("shop", "users").limit(20).page().await?;
/// println!("{} of {} rows", page.records.len(), page.total);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct AdminClient {
   manager: Arc<ConnectionManager>,
}

impl AdminClient {
   pub fn new(manager: Arc<ConnectionManager>) -> Self {
      Self { manager }
   }

   /// Client over a fresh manager configured from the environment
   pub fn from_env() -> Self {
      Self::new(Arc::new(ConnectionManager::from_env()))
   }

   pub fn manager(&self) -> &Arc<ConnectionManager> {
      &self.manager
   }

   /// Connect (or reconnect) the shared manager. See [`ConnectionManager::connect`].
   pub async fn connect(&self, config: ConnectionConfig) -> Result<()> {
      Ok(self.manager.connect(config).await?)
   }

   pub async fn disconnect(&self) {
      self.manager.disconnect().await;
   }

   pub fn current_connection(&self) -> Option<ConnectionInfo> {
      self.manager.current_connection()
   }

   /// Apply the configured per-statement deadline, if any.
   pub(crate) async fn bounded<T, F>(&self, statement: F) -> Result<T>
   where
      F: Future<Output = Result<T>>,
   {
      match self.manager.config().query_timeout() {
         Some(limit) => match tokio::time::timeout(limit, statement).await {
            Ok(result) => result,
            Err(_) => {
               warn!("Statement exceeded {}ms deadline", limit.as_millis());
               Err(Error::Timeout(limit))
            }
         },
         None => statement.await,
      }
   }

   /// Run a statement with no parameters over the text protocol.
   ///
   /// `SHOW`, `DESCRIBE` and DDL go through here since not every server version
   /// accepts them as prepared statements.
   async fn execute_text(&self, sql: &str) -> Result<MySqlQueryResult> {
      let pool = self.manager.pool()?;
      self
         .bounded(async { sqlx::raw_sql(sql).execute(&pool).await.map_err(Error::from) })
         .await
   }

   async fn fetch_text(&self, sql: &str) -> Result<Vec<sqlx::mysql::MySqlRow>> {
      let pool = self.manager.pool()?;
      self
         .bounded(async { sqlx::raw_sql(sql).fetch_all(&pool).await.map_err(Error::from) })
         .await
   }

   /// Names of all databases visible to the connected user.
   pub async fn list_databases(&self) -> Result<Vec<String>> {
      let rows = self.fetch_text("SHOW DATABASES").await?;
      first_column(&rows)
   }

   /// `CREATE DATABASE IF NOT EXISTS`; succeeds if the database already exists.
   pub async fn create_database(&self, name: &str) -> Result<()> {
      let sql = format!("CREATE DATABASE IF NOT EXISTS {}", quote("database", name)?);
      self.execute_text(&sql).await?;
      debug!("Created database {}", name);
      Ok(())
   }

   /// `DROP DATABASE IF EXISTS`; succeeds if the database is already gone.
   pub async fn drop_database(&self, name: &str) -> Result<()> {
      let sql = format!("DROP DATABASE IF EXISTS {}", quote("database", name)?);
      self.execute_text(&sql).await?;
      debug!("Dropped database {}", name);
      Ok(())
   }

   pub async fn list_tables(&self, database: &str) -> Result<Vec<String>> {
      let sql = format!("SHOW TABLES FROM {}", quote("database", database)?);
      let rows = self.fetch_text(&sql).await?;
      first_column(&rows)
   }

   /// Column layout of `database`.`table`, in table order.
   pub async fn describe_table(&self, database: &str, table: &str) -> Result<Vec<ColumnDescriptor>> {
      let sql = format!("DESCRIBE {}", qualified(database, table)?);
      let rows = self.fetch_text(&sql).await?;
      rows.iter().map(ColumnDescriptor::from_describe_row).collect()
   }

   /// Create `database`.`table` from `columns` unless it already exists.
   ///
   /// # Errors
   ///
   /// Validation errors (empty column list, more than one primary column,
   /// duplicate names, malformed type or length) are returned before anything
   /// is sent to the server.
   pub async fn create_table(
      &self,
      database: &str,
      table: &str,
      columns: &[ColumnDefinition],
   ) -> Result<()> {
      let sql = build_create_table(database, table, columns)?;
      self.execute_text(&sql).await?;
      debug!("Created table {}.{}", database, table);
      Ok(())
   }

   pub async fn drop_table(&self, database: &str, table: &str) -> Result<()> {
      let sql = format!("DROP TABLE IF EXISTS {}", qualified(database, table)?);
      self.execute_text(&sql).await?;
      debug!("Dropped table {}.{}", database, table);
      Ok(())
   }

   /// Builder for a paginated read of `database`.`table`.
   ///
   /// Defaults to the first 100 rows; await it directly or call
   /// [`RecordsBuilder::page`] to also get the table's total row count.
   pub fn records(&self, database: &str, table: &str) -> RecordsBuilder {
      RecordsBuilder::new(self.clone(), database, table)
   }

   /// Up to `limit` rows of `database`.`table` starting at `offset`.
   ///
   /// Both bounds are bound as parameters. `limit` must be greater than zero.
   pub async fn list_records(
      &self,
      database: &str,
      table: &str,
      limit: u64,
      offset: u64,
   ) -> Result<Vec<Record>> {
      self
         .records(database, table)
         .limit(limit)
         .offset(offset)
         .execute()
         .await
   }

   pub(crate) async fn fetch_page(
      &self,
      database: &str,
      table: &str,
      limit: u64,
      offset: u64,
   ) -> Result<Vec<Record>> {
      if limit == 0 {
         return Err(Error::validation("limit", "must be greater than zero"));
      }

      let sql = format!("SELECT * FROM {} LIMIT ? OFFSET ?", qualified(database, table)?);
      let pool = self.manager.pool()?;

      let rows = self
         .bounded(async {
            sqlx::query(&sql)
               .bind(limit)
               .bind(offset)
               .fetch_all(&pool)
               .await
               .map_err(Error::from)
         })
         .await?;

      decode_rows(rows)
   }

   /// Number of rows in `database`.`table`.
   pub async fn count_records(&self, database: &str, table: &str) -> Result<u64> {
      let sql = format!("SELECT COUNT(*) FROM {}", qualified(database, table)?);
      let pool = self.manager.pool()?;

      let count = self
         .bounded(async {
            sqlx::query_scalar::<_, i64>(&sql)
               .fetch_one(&pool)
               .await
               .map_err(Error::from)
         })
         .await?;

      Ok(u64::try_from(count).unwrap_or_default())
   }

   /// The row whose `id_column` equals `id`, if any.
   pub async fn fetch_record(
      &self,
      database: &str,
      table: &str,
      id: impl Into<JsonValue>,
      id_column: &str,
   ) -> Result<Option<Record>> {
      let target = qualified(database, table)?;
      let key = quote("idColumn", id_column)?;
      self
         .check_columns(database, table, std::iter::once(id_column))
         .await?;

      let sql = format!("SELECT * FROM {} WHERE {} = ? LIMIT 1", target, key);
      let pool = self.manager.pool()?;
      let id = id.into();

      let row = self
         .bounded(async {
            bind_value(sqlx::query(&sql), id)
               .fetch_optional(&pool)
               .await
               .map_err(Error::from)
         })
         .await?;

      row.as_ref().map(decode_row).transpose()
   }

   /// Insert one row built from `data`.
   ///
   /// Every key must name a column of the table. An empty payload inserts a
   /// row made entirely of column defaults.
   pub async fn insert_record(
      &self,
      database: &str,
      table: &str,
      data: RecordPayload,
   ) -> Result<WriteQueryResult> {
      let target = qualified(database, table)?;
      self.check_columns(database, table, data.keys()).await?;

      let data = data.into_inner();
      let sql = if data.is_empty() {
         format!("INSERT INTO {} () VALUES ()", target)
      } else {
         let columns = data
            .keys()
            .map(|column| quote("column", column))
            .collect::<Result<Vec<_>>>()?;
         let placeholders = vec!["?"; columns.len()];
         format!(
            "INSERT INTO {} ({}) VALUES ({})",
            target,
            columns.join(", "),
            placeholders.join(", ")
         )
      };

      self.execute_bound(&sql, data.into_values()).await
   }

   /// Update the row whose `id_column` equals `id` with the values in `data`.
   ///
   /// A value for `id_column` inside `data` is ignored; the key column is never
   /// rewritten.
   pub async fn update_record(
      &self,
      database: &str,
      table: &str,
      id: impl Into<JsonValue>,
      id_column: &str,
      data: RecordPayload,
   ) -> Result<WriteQueryResult> {
      let target = qualified(database, table)?;
      let key = quote("idColumn", id_column)?;

      let mut data = data.into_inner();
      data.retain(|column, _| !column.eq_ignore_ascii_case(id_column));
      if data.is_empty() {
         return Err(Error::validation("data", "no columns to update"));
      }

      self
         .check_columns(
            database,
            table,
            data.keys().map(String::as_str).chain(std::iter::once(id_column)),
         )
         .await?;

      let assignments = data
         .keys()
         .map(|column| quote("column", column).map(|quoted| format!("{} = ?", quoted)))
         .collect::<Result<Vec<_>>>()?;
      let sql = format!(
         "UPDATE {} SET {} WHERE {} = ?",
         target,
         assignments.join(", "),
         key
      );

      let values = data.into_values().chain(std::iter::once(id.into()));
      self.execute_bound(&sql, values).await
   }

   /// Delete the row whose `id_column` equals `id`.
   pub async fn delete_record(
      &self,
      database: &str,
      table: &str,
      id: impl Into<JsonValue>,
      id_column: &str,
   ) -> Result<WriteQueryResult> {
      let target = qualified(database, table)?;
      let key = quote("idColumn", id_column)?;
      self
         .check_columns(database, table, std::iter::once(id_column))
         .await?;

      let sql = format!("DELETE FROM {} WHERE {} = ?", target, key);
      self.execute_bound(&sql, std::iter::once(id.into())).await
   }

   async fn execute_bound(
      &self,
      sql: &str,
      values: impl IntoIterator<Item = JsonValue>,
   ) -> Result<WriteQueryResult> {
      let pool = self.manager.pool()?;

      let mut query = sqlx::query(sql);
      for value in values {
         query = bind_value(query, value);
      }

      let result = self
         .bounded(async { query.execute(&pool).await.map_err(Error::from) })
         .await?;

      Ok(result.into())
   }

   /// Reject any name in `columns` that is not a column of the table.
   async fn check_columns<'a>(
      &self,
      database: &str,
      table: &str,
      columns: impl IntoIterator<Item = &'a str>,
   ) -> Result<()> {
      let known = self.describe_table(database, table).await?;

      for column in columns {
         if !known.iter().any(|c| c.name.eq_ignore_ascii_case(column)) {
            return Err(Error::validation(
               column,
               format!("no such column in {}.{}", database, table),
            ));
         }
      }

      Ok(())
   }

   /// Execute caller-supplied SQL verbatim with `database` selected.
   ///
   /// The statement runs over the text protocol on one connection that first
   /// issues `USE`, and that connection is held for the whole call so no other
   /// caller can change its selected database in between. Nothing is
   /// parameterized.
   ///
   /// `sql` may hold several `;`-separated statements; their result sets are
   /// merged into one result. The connection is closed afterwards rather than
   /// returned to the pool, so session state the text leaves behind (user
   /// variables, temporary tables, an open transaction, a different `USE`)
   /// never leaks into later operations.
   ///
   /// Returns [`QueryResult::Rows`] when the statement produced a row set
   /// (including an empty one from a `SELECT`), otherwise
   /// [`QueryResult::Write`] with the affected-row total.
   pub async fn raw_query(&self, database: &str, sql: &str) -> Result<QueryResult> {
      if sql.trim().is_empty() {
         return Err(Error::validation("sql", "must not be empty"));
      }
      quote("database", database)?;

      self.bounded(self.run_raw(database, sql)).await
   }

   async fn run_raw(&self, database: &str, sql: &str) -> Result<QueryResult> {
      let mut conn = self.manager.acquire_scoped(database).await?;
      conn.close_on_drop();

      let outcome = collect_raw(&mut conn, database, sql).await;

      if let Err(e) = conn.close().await {
         debug!("Closing raw query connection failed: {}", e);
      }

      outcome
   }
}

/// Drain every result set of `sql` into a single [`QueryResult`].
async fn collect_raw(conn: &mut ScopedConnection, database: &str, sql: &str) -> Result<QueryResult> {
   let mut rows = Vec::new();
   let mut write = WriteQueryResult::default();
   let mut saw_rows = false;

   let mut results = sqlx::Executor::fetch_many(&mut **conn, sqlx::raw_sql(sql));
   while let Some(step) = results.try_next().await.inspect_err(|e| {
      warn!("Raw statement on {} failed: {}", database, e);
   })? {
      match step {
         Either::Left(done) => {
            write.affected_rows += done.rows_affected();
            if done.last_insert_id() != 0 {
               write.insert_id = Some(done.last_insert_id());
            }
         }
         Either::Right(row) => {
            saw_rows = true;
            rows.push(decode_row(&row)?);
         }
      }
   }

   if saw_rows || returns_rows(sql) {
      Ok(QueryResult::Rows { rows })
   } else {
      Ok(QueryResult::Write(write))
   }
}

/// First column of each row as text (`SHOW DATABASES`, `SHOW TABLES`)
fn first_column(rows: &[sqlx::mysql::MySqlRow]) -> Result<Vec<String>> {
   rows
      .iter()
      .map(|row| Ok(text_column(row, 0)?.unwrap_or_default()))
      .collect()
}

/// Whether `sql` is a statement that yields a row set even when empty.
///
/// Leading whitespace and comments are skipped before looking at the keyword.
fn returns_rows(sql: &str) -> bool {
   const ROW_KEYWORDS: &[&str] = &[
      "SELECT", "SHOW", "DESCRIBE", "DESC", "EXPLAIN", "WITH", "VALUES", "TABLE", "HELP",
   ];

   let mut rest = sql;
   loop {
      rest = rest.trim_start();
      if let Some(after) = rest.strip_prefix("--").or_else(|| rest.strip_prefix('#')) {
         rest = after.split_once('\n').map_or("", |(_, tail)| tail);
      } else if let Some(after) = rest.strip_prefix("/*") {
         rest = after.split_once("*/").map_or("", |(_, tail)| tail);
      } else {
         break;
      }
   }

   if rest.starts_with('(') {
      return true;
   }

   let keyword: String = rest
      .chars()
      .take_while(|c| c.is_ascii_alphabetic())
      .collect::<String>()
      .to_ascii_uppercase();

   ROW_KEYWORDS.contains(&keyword.as_str())
}

/// Bind a JSON value to a MySQL query with the closest matching type.
///
/// Integers keep their precision (unsigned values above `i64::MAX` bind as
/// `BIGINT UNSIGNED`), and arrays or objects are bound as JSON documents.
pub(crate) fn bind_value<'q>(
   query: Query<'q, MySql, MySqlArguments>,
   value: JsonValue,
) -> Query<'q, MySql, MySqlArguments> {
   match value {
      JsonValue::Null => query.bind(None::<String>),
      JsonValue::Bool(b) => query.bind(b),
      JsonValue::String(s) => query.bind(s),
      JsonValue::Number(number) => {
         if let Some(int_val) = number.as_i64() {
            query.bind(int_val)
         } else if let Some(uint_val) = number.as_u64() {
            query.bind(uint_val)
         } else {
            // Not an integer, bind as f64
            query.bind(number.as_f64().unwrap_or_default())
         }
      }
      other => query.bind(other),
   }
}
