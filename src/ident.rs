//! Identifier quoting with errors attributed to the offending field

use sqlx_mysql_conn_mgr::{Error as ConnError, quote_identifier};

use crate::{Error, Result};

/// Quote one identifier, reporting a bad name as a validation error on `field`.
pub(crate) fn quote(field: &str, name: &str) -> Result<String> {
   quote_identifier(name).map_err(|e| match e {
      ConnError::InvalidIdentifier { reason, .. } => Error::validation(field, reason),
      other => Error::ConnectionManager(other),
   })
}

/// `` `database`.`table` ``
pub(crate) fn qualified(database: &str, table: &str) -> Result<String> {
   Ok(format!(
      "{}.{}",
      quote("database", database)?,
      quote("table", table)?
   ))
}
