//! Paginated record reads

use std::future::{Future, IntoFuture};
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::record::Record;
use crate::wrapper::AdminClient;

/// Rows returned when a builder is awaited without an explicit limit
pub const DEFAULT_PAGE_LIMIT: u64 = 100;

/// One page of a table together with its total row count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPage {
   pub records: Vec<Record>,
   pub limit: u64,
   pub offset: u64,
   /// Rows in the whole table, from `COUNT(*)`
   pub total: u64,
}

impl RecordPage {
   pub fn has_more(&self) -> bool {
      self.offset + (self.records.len() as u64) < self.total
   }
}

/// Builder for `SELECT * … LIMIT ? OFFSET ?` over one table
pub struct RecordsBuilder {
   client: AdminClient,
   database: String,
   table: String,
   limit: u64,
   offset: u64,
}

impl RecordsBuilder {
   pub(crate) fn new(client: AdminClient, database: &str, table: &str) -> Self {
      Self {
         client,
         database: database.to_string(),
         table: table.to_string(),
         limit: DEFAULT_PAGE_LIMIT,
         offset: 0,
      }
   }

   /// Maximum number of rows to return. Must be greater than zero.
   pub fn limit(mut self, limit: u64) -> Self {
      self.limit = limit;
      self
   }

   /// Number of rows to skip
   pub fn offset(mut self, offset: u64) -> Self {
      self.offset = offset;
      self
   }

   /// Fetch the rows of this page
   pub async fn execute(self) -> Result<Vec<Record>> {
      self
         .client
         .fetch_page(&self.database, &self.table, self.limit, self.offset)
         .await
   }

   /// Fetch the rows of this page and count the whole table
   pub async fn page(self) -> Result<RecordPage> {
      let records = self
         .client
         .fetch_page(&self.database, &self.table, self.limit, self.offset)
         .await?;
      let total = self.client.count_records(&self.database, &self.table).await?;

      Ok(RecordPage {
         records,
         limit: self.limit,
         offset: self.offset,
         total,
      })
   }
}

impl IntoFuture for RecordsBuilder {
   type Output = Result<Vec<Record>>;
   type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send>>;

   fn into_future(self) -> Self::IntoFuture {
      Box::pin(self.execute())
   }
}

#[cfg(test)]
mod tests {
   use std::sync::Arc;

   use sqlx_mysql_conn_mgr::ConnectionManager;

   use super::*;

   fn client() -> AdminClient {
      AdminClient::new(Arc::new(ConnectionManager::new(None)))
   }

   #[test]
   fn test_defaults() {
      let builder = client().records("shop", "users");
      assert_eq!(builder.limit, DEFAULT_PAGE_LIMIT);
      assert_eq!(builder.offset, 0);

      let builder = builder.limit(10).offset(20);
      assert_eq!(builder.limit, 10);
      assert_eq!(builder.offset, 20);
   }

   #[tokio::test]
   async fn test_zero_limit_is_rejected() {
      let err = client().records("shop", "users").limit(0).await.unwrap_err();
      assert_eq!(err.error_code(), "VALIDATION_ERROR");
   }

   #[tokio::test]
   async fn test_page_requires_connection() {
      let err = client().records("shop", "users").page().await.unwrap_err();
      assert!(err.is_not_connected());
   }

   #[test]
   fn test_has_more() {
      let page = RecordPage {
         records: vec![Record::new(); 10],
         limit: 10,
         offset: 0,
         total: 25,
      };
      assert!(page.has_more());

      let page = RecordPage {
         records: vec![Record::new(); 5],
         limit: 10,
         offset: 20,
         total: 25,
      };
      assert!(!page.has_more());
   }
}
