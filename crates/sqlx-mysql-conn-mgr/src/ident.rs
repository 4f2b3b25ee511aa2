//! Identifier quoting for database, table and column names
//!
//! MySQL has no way to bind identifiers as parameters, so schema object names
//! are the one place where text is spliced into a statement. Every such name
//! goes through [`quote_identifier`], which wraps it in backticks and doubles any
//! embedded backtick so the name can never close the quoted context.

use crate::Result;
use crate::error::Error;

/// Longest identifier MySQL accepts for databases, tables and columns
pub const MAX_IDENTIFIER_LEN: usize = 64;

/// Check that `name` is usable as a MySQL identifier.
pub fn validate_identifier(name: &str) -> Result<()> {
   let reason = if name.is_empty() {
      Some("must not be empty")
   } else if name.chars().count() > MAX_IDENTIFIER_LEN {
      Some("longer than 64 characters")
   } else if name.contains('\0') {
      Some("contains a NUL character")
   } else if name.ends_with(' ') {
      Some("ends with a space")
   } else {
      None
   };

   match reason {
      Some(reason) => Err(Error::InvalidIdentifier {
         name: name.to_string(),
         reason,
      }),
      None => Ok(()),
   }
}

/// Quote `name` as a backtick-delimited identifier.
///
/// # Examples
///
/// ```
/// use sqlx_mysql_conn_mgr::quote_identifier;
///
/// assert_eq!(quote_identifier("users").unwrap(), "`users`");
/// assert_eq!(quote_identifier("we`ird").unwrap(), "`we``ird`");
/// assert!(quote_identifier("").is_err());
/// ```
pub fn quote_identifier(name: &str) -> Result<String> {
   validate_identifier(name)?;
   Ok(format!("`{}`", name.replace('`', "``")))
}

/// Quote a `database.table` pair so the statement never depends on the
/// session's selected database.
pub fn qualified(database: &str, table: &str) -> Result<String> {
   Ok(format!(
      "{}.{}",
      quote_identifier(database)?,
      quote_identifier(table)?
   ))
}
