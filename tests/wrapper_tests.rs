//! Requires a reachable MySQL server.
//! Run with: cargo test --features mysql-tests
//!
//! Connection parameters come from MYSQL_TEST_HOST, MYSQL_TEST_PORT,
//! MYSQL_TEST_USER and MYSQL_TEST_PASSWORD. Each test works in its own
//! database so tests can run in parallel.
#![cfg(feature = "mysql-tests")]

use std::sync::Arc;

use serde_json::{Value as JsonValue, json};
use sqlx_mysql_admin::{
   AdminClient, ColumnDefinition, ConnectionConfig, ConnectionManager, DEFAULT_ID_COLUMN, Error,
   KeyKind, ManagerConfig, QueryResult, RecordPayload,
};

fn test_config() -> ConnectionConfig {
   let env = |key: &str, default: &str| std::env::var(key).unwrap_or_else(|_| default.into());
   ConnectionConfig::new(
      env("MYSQL_TEST_HOST", "127.0.0.1"),
      env("MYSQL_TEST_PORT", "3306").parse().unwrap(),
      env("MYSQL_TEST_USER", "root"),
      env("MYSQL_TEST_PASSWORD", "x"),
   )
}

/// Connected client plus a freshly created, empty database
async fn create_test_db(name: &str) -> (AdminClient, String) {
   let _ = tracing_subscriber::fmt()
      .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
      .with_test_writer()
      .try_init();

   let client = AdminClient::from_env();
   client
      .connect(test_config())
      .await
      .expect("Failed to connect to test server");

   let database = format!("admin_test_{}", name);
   client.drop_database(&database).await.unwrap();
   client.create_database(&database).await.unwrap();

   (client, database)
}

async fn cleanup(client: AdminClient, database: &str) {
   client.drop_database(database).await.unwrap();
   client.disconnect().await;
}

fn users_columns() -> Vec<ColumnDefinition> {
   vec![
      ColumnDefinition::new("id", "INT")
         .primary()
         .auto_increment()
         .not_null(),
      ColumnDefinition::new("email", "VARCHAR").length("255").not_null(),
   ]
}

#[tokio::test]
async fn test_shop_users_round_trip() {
   let (client, db) = create_test_db("shop").await;

   assert!(client.list_databases().await.unwrap().contains(&db));

   client.create_table(&db, "users", &users_columns()).await.unwrap();
   assert_eq!(client.list_tables(&db).await.unwrap(), vec!["users"]);

   let columns = client.describe_table(&db, "users").await.unwrap();
   assert_eq!(columns.len(), 2);

   let id = &columns[0];
   assert_eq!(id.name, "id");
   assert_eq!(id.key_kind, KeyKind::Primary);
   assert!(!id.nullable);
   assert!(id.is_auto_increment());

   let email = &columns[1];
   assert_eq!(email.name, "email");
   assert_eq!(email.key_kind, KeyKind::None);
   assert!(!email.nullable);
   assert!(email.declared_type.starts_with("varchar(255)"));

   let result = client
      .insert_record(&db, "users", RecordPayload::new().insert("email", "a@b.com"))
      .await
      .unwrap();
   assert_eq!(result.affected_rows, 1);
   assert_eq!(result.insert_id, Some(1));

   let records = client.list_records(&db, "users", 10, 0).await.unwrap();
   assert_eq!(records.len(), 1);
   assert_eq!(records[0]["id"], json!(1));
   assert_eq!(records[0]["email"], json!("a@b.com"));

   // Column order follows the table
   let keys: Vec<_> = records[0].keys().map(String::as_str).collect();
   assert_eq!(keys, vec!["id", "email"]);

   cleanup(client, &db).await;
}

#[tokio::test]
async fn test_create_database_and_table_are_idempotent() {
   let (client, db) = create_test_db("idempotent").await;

   client.create_database(&db).await.unwrap();
   client.create_table(&db, "users", &users_columns()).await.unwrap();
   client.create_table(&db, "users", &users_columns()).await.unwrap();

   client.drop_table(&db, "users").await.unwrap();
   client.drop_table(&db, "users").await.unwrap();
   assert!(client.list_tables(&db).await.unwrap().is_empty());

   client.drop_database(&db).await.unwrap();
   client.drop_database(&db).await.unwrap();
   assert!(!client.list_databases().await.unwrap().contains(&db));

   client.disconnect().await;
}

#[tokio::test]
async fn test_update_changes_only_targeted_row() {
   let (client, db) = create_test_db("update").await;
   client.create_table(&db, "users", &users_columns()).await.unwrap();

   for email in ["first@x.com", "second@x.com"] {
      client
         .insert_record(&db, "users", RecordPayload::new().insert("email", email))
         .await
         .unwrap();
   }

   let result = client
      .update_record(
         &db,
         "users",
         2,
         DEFAULT_ID_COLUMN,
         // The id inside the payload is ignored, never rewritten
         RecordPayload::new()
            .insert("id", 99)
            .insert("email", "changed@x.com"),
      )
      .await
      .unwrap();
   assert_eq!(result.affected_rows, 1);
   assert_eq!(result.insert_id, None);

   let first = client
      .fetch_record(&db, "users", 1, "id")
      .await
      .unwrap()
      .unwrap();
   assert_eq!(first["email"], json!("first@x.com"));

   let second = client
      .fetch_record(&db, "users", 2, "id")
      .await
      .unwrap()
      .unwrap();
   assert_eq!(second["email"], json!("changed@x.com"));

   assert!(client.fetch_record(&db, "users", 99, "id").await.unwrap().is_none());

   cleanup(client, &db).await;
}

#[tokio::test]
async fn test_delete_removes_only_targeted_row() {
   let (client, db) = create_test_db("delete").await;
   client.create_table(&db, "users", &users_columns()).await.unwrap();

   for email in ["a@x.com", "b@x.com", "c@x.com"] {
      client
         .insert_record(&db, "users", RecordPayload::new().insert("email", email))
         .await
         .unwrap();
   }

   // String ids are bound as parameters too
   let result = client.delete_record(&db, "users", "2", "id").await.unwrap();
   assert_eq!(result.affected_rows, 1);

   let remaining: Vec<_> = client
      .list_records(&db, "users", 10, 0)
      .await
      .unwrap()
      .into_iter()
      .map(|record| record["email"].clone())
      .collect();
   assert_eq!(remaining, vec![json!("a@x.com"), json!("c@x.com")]);

   let result = client.delete_record(&db, "users", 2, "id").await.unwrap();
   assert_eq!(result.affected_rows, 0);

   cleanup(client, &db).await;
}

#[tokio::test]
async fn test_pagination_and_count() {
   let (client, db) = create_test_db("pages").await;
   client.create_table(&db, "users", &users_columns()).await.unwrap();

   for i in 0..25 {
      client
         .insert_record(
            &db,
            "users",
            RecordPayload::new().insert("email", format!("user{}@x.com", i)),
         )
         .await
         .unwrap();
   }

   assert_eq!(client.count_records(&db, "users").await.unwrap(), 25);

   // Default limit covers the whole table
   assert_eq!(client.records(&db, "users").await.unwrap().len(), 25);

   let page = client
      .records(&db, "users")
      .limit(10)
      .offset(20)
      .page()
      .await
      .unwrap();
   assert_eq!(page.records.len(), 5);
   assert_eq!(page.total, 25);
   assert!(!page.has_more());
   assert_eq!(page.records[0]["email"], json!("user20@x.com"));

   cleanup(client, &db).await;
}

#[tokio::test]
async fn test_payload_keys_are_checked_against_table() {
   let (client, db) = create_test_db("payload").await;
   client.create_table(&db, "users", &users_columns()).await.unwrap();

   let err = client
      .insert_record(&db, "users", RecordPayload::new().insert("nope", 1))
      .await
      .unwrap_err();
   match err {
      Error::Validation { field, .. } => assert_eq!(field, "nope"),
      other => panic!("expected validation error, got {:?}", other),
   }

   let err = client
      .delete_record(&db, "users", 1, "missing_column")
      .await
      .unwrap_err();
   assert_eq!(err.error_code(), "VALIDATION_ERROR");

   assert_eq!(client.count_records(&db, "users").await.unwrap(), 0);

   cleanup(client, &db).await;
}

#[tokio::test]
async fn test_empty_insert_uses_defaults() {
   let (client, db) = create_test_db("defaults").await;
   client
      .create_table(
         &db,
         "settings",
         &[
            ColumnDefinition::new("id", "INT")
               .primary()
               .auto_increment()
               .not_null(),
            ColumnDefinition::new("theme", "VARCHAR")
               .length("20")
               .default_value("dark"),
            ColumnDefinition::new("note", "TEXT").default_value("NULL"),
         ],
      )
      .await
      .unwrap();

   let result = client
      .insert_record(&db, "settings", RecordPayload::new())
      .await
      .unwrap();
   assert_eq!(result.insert_id, Some(1));

   let row = client
      .fetch_record(&db, "settings", 1, "id")
      .await
      .unwrap()
      .unwrap();
   assert_eq!(row["theme"], json!("dark"));
   assert!(row["note"].is_null());

   cleanup(client, &db).await;
}

#[tokio::test]
async fn test_identifier_injection_is_escaped() {
   let (client, db) = create_test_db("injection").await;
   client
      .create_table(&db, "victim", &[ColumnDefinition::new("a", "INT")])
      .await
      .unwrap();

   let hostile = "a`; DROP TABLE victim; --";
   client
      .create_table(&db, hostile, &[ColumnDefinition::new("b", "INT")])
      .await
      .unwrap();

   let mut tables = client.list_tables(&db).await.unwrap();
   tables.sort();
   assert_eq!(tables, vec![hostile.to_string(), "victim".to_string()]);

   client.drop_table(&db, hostile).await.unwrap();
   assert_eq!(client.list_tables(&db).await.unwrap(), vec!["victim"]);

   cleanup(client, &db).await;
}

#[tokio::test]
async fn test_raw_query_result_shapes() {
   let (client, db) = create_test_db("raw").await;
   client.create_table(&db, "users", &users_columns()).await.unwrap();

   // Unqualified names resolve against the selected database
   let result = client
      .raw_query(&db, "INSERT INTO users (email) VALUES ('raw@x.com')")
      .await
      .unwrap();
   let write = result.write_result().unwrap();
   assert_eq!(write.affected_rows, 1);
   assert_eq!(write.insert_id, Some(1));
   assert!(result.rows().is_none());

   let result = client
      .raw_query(&db, "SELECT id, email FROM users")
      .await
      .unwrap();
   let rows = result.rows().unwrap();
   assert_eq!(rows.len(), 1);
   assert_eq!(rows[0]["email"], json!("raw@x.com"));

   // An empty row set is still a row set
   let result = client
      .raw_query(&db, "SELECT * FROM users WHERE id = 42")
      .await
      .unwrap();
   assert!(matches!(result, QueryResult::Rows { ref rows } if rows.is_empty()));

   let result = client
      .raw_query(&db, "UPDATE users SET email = 'x@x.com'")
      .await
      .unwrap();
   assert_eq!(result.write_result().unwrap().affected_rows, 1);

   let err = client.raw_query(&db, "SELEC nonsense").await.unwrap_err();
   assert_eq!(err.error_code(), "MYSQL_1064");

   cleanup(client, &db).await;
}

#[tokio::test]
async fn test_raw_query_session_state_does_not_leak() {
   let (setup, db) = create_test_db("session").await;
   setup.disconnect().await;

   // One pooled connection, so a leaked session would be observed directly
   let manager = ConnectionManager::new(Some(ManagerConfig {
      max_connections: 1,
      ..Default::default()
   }));
   let client = AdminClient::new(Arc::new(manager));
   client.connect(test_config()).await.unwrap();
   client
      .create_table(&db, "users", &users_columns())
      .await
      .unwrap();

   client.raw_query(&db, "SET @marker = 5").await.unwrap();
   let result = client.raw_query(&db, "SELECT @marker AS marker").await.unwrap();
   assert_eq!(result.rows().unwrap()[0]["marker"], JsonValue::Null);

   // An unfinished transaction is rolled back, not left open for the next caller
   client
      .raw_query(
         &db,
         "START TRANSACTION; INSERT INTO users (email) VALUES ('pending@x.com')",
      )
      .await
      .unwrap();
   assert_eq!(client.count_records(&db, "users").await.unwrap(), 0);

   cleanup(client, &db).await;
}

#[tokio::test]
async fn test_raw_query_multiple_statements() {
   let (client, db) = create_test_db("multi").await;
   client.create_table(&db, "users", &users_columns()).await.unwrap();

   let result = client
      .raw_query(
         &db,
         "INSERT INTO users (email) VALUES ('a@x.com'); \
          INSERT INTO users (email) VALUES ('b@x.com')",
      )
      .await
      .unwrap();
   let write = result.write_result().unwrap();
   assert_eq!(write.affected_rows, 2);
   assert_eq!(write.insert_id, Some(2));

   cleanup(client, &db).await;
}

#[tokio::test]
async fn test_value_decoding() {
   let (client, db) = create_test_db("decode").await;
   client
      .raw_query(
         &db,
         "CREATE TABLE t (\
            id INT PRIMARY KEY, \
            price DECIMAL(10,2), \
            active TINYINT(1), \
            big BIGINT UNSIGNED, \
            ratio DOUBLE, \
            data BLOB, \
            doc JSON, \
            born DATE)",
      )
      .await
      .unwrap();

   client
      .insert_record(
         &db,
         "t",
         RecordPayload::try_from(json!({
            "id": 1,
            "price": "10.50",
            "active": true,
            "big": 18446744073709551615u64,
            "ratio": 0.25,
            "data": "hello",
            "doc": {"a": [1, 2]},
            "born": "2024-02-29",
         }))
         .unwrap(),
      )
      .await
      .unwrap();

   let row = client.fetch_record(&db, "t", 1, "id").await.unwrap().unwrap();
   assert_eq!(row["price"], json!("10.50"));
   assert_eq!(row["active"], json!(true));
   assert_eq!(row["big"], json!(18446744073709551615u64));
   assert_eq!(row["ratio"], json!(0.25));
   assert_eq!(row["data"], json!("aGVsbG8="));
   assert_eq!(row["doc"], json!({"a": [1, 2]}));
   assert_eq!(row["born"], json!("2024-02-29"));

   cleanup(client, &db).await;
}

#[tokio::test]
async fn test_engine_errors_carry_mysql_code() {
   let (client, db) = create_test_db("engine").await;

   let err = client.describe_table(&db, "missing").await.unwrap_err();
   assert_eq!(err.engine_code(), Some(1146));
   assert_eq!(err.error_code(), "MYSQL_1146");

   cleanup(client, &db).await;
}

#[tokio::test]
async fn test_operations_fail_after_disconnect() {
   let (client, db) = create_test_db("disconnect").await;
   client.drop_database(&db).await.unwrap();

   client.disconnect().await;
   assert!(client.current_connection().is_none());

   let err = client.list_databases().await.unwrap_err();
   assert!(err.is_not_connected());
}
