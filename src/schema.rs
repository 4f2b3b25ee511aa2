//! Table definitions in both directions: rendering `CREATE TABLE` from
//! [`ColumnDefinition`]s and reading `DESCRIBE` output into [`ColumnDescriptor`]s.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::mysql::MySqlRow;

use crate::decode::text_column;
use crate::ident::{qualified, quote};
use crate::{Error, Result};

static TYPE_NAME: LazyLock<Regex> =
   LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z ]*$").unwrap());

static TYPE_LENGTH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+(,\d+)?$").unwrap());

/// One column of a table to be created
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDefinition {
   pub name: String,

   /// Base type name such as `INT`, `VARCHAR` or `DOUBLE PRECISION`
   #[serde(rename = "type")]
   pub data_type: String,

   /// Display width or precision, e.g. `"255"` or `"10,2"`; for `ENUM` and
   /// `SET` the member list, e.g. `"'active','inactive'"`
   #[serde(default)]
   pub length: Option<String>,

   #[serde(default)]
   pub not_null: bool,

   #[serde(default)]
   pub is_primary: bool,

   #[serde(default)]
   pub auto_increment: bool,

   #[serde(default, alias = "default")]
   pub default_value: Option<String>,
}

impl ColumnDefinition {
   pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
      Self {
         name: name.into(),
         data_type: data_type.into(),
         ..Default::default()
      }
   }

   pub fn length(mut self, length: impl Into<String>) -> Self {
      self.length = Some(length.into());
      self
   }

   pub fn not_null(mut self) -> Self {
      self.not_null = true;
      self
   }

   pub fn primary(mut self) -> Self {
      self.is_primary = true;
      self
   }

   pub fn auto_increment(mut self) -> Self {
      self.auto_increment = true;
      self
   }

   pub fn default_value(mut self, value: impl Into<String>) -> Self {
      self.default_value = Some(value.into());
      self
   }
}

/// Kind of index a column participates in, from the `Key` column of `DESCRIBE`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyKind {
   #[default]
   None,
   Primary,
   Unique,
   Indexed,
}

impl KeyKind {
   fn from_describe(key: &str) -> Self {
      match key {
         "PRI" => KeyKind::Primary,
         "UNI" => KeyKind::Unique,
         "MUL" => KeyKind::Indexed,
         _ => KeyKind::None,
      }
   }
}

/// One column as reported by `DESCRIBE`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDescriptor {
   pub name: String,
   /// Full declared type, e.g. `varchar(255)` or `int unsigned`
   pub declared_type: String,
   pub nullable: bool,
   pub key_kind: KeyKind,
   pub default_value: Option<String>,
   /// e.g. `auto_increment`, `on update CURRENT_TIMESTAMP`
   pub extra: Option<String>,
}

impl ColumnDescriptor {
   /// Read one `DESCRIBE` row (`Field`, `Type`, `Null`, `Key`, `Default`, `Extra`).
   pub(crate) fn from_describe_row(row: &MySqlRow) -> Result<Self> {
      let name = text_column(row, 0)?.unwrap_or_default();
      let declared_type = text_column(row, 1)?.unwrap_or_default();
      let nullable = text_column(row, 2)?.is_some_and(|v| v.eq_ignore_ascii_case("YES"));
      let key_kind = KeyKind::from_describe(text_column(row, 3)?.as_deref().unwrap_or_default());
      let default_value = text_column(row, 4)?;
      let extra = text_column(row, 5)?.filter(|v| !v.is_empty());

      Ok(Self {
         name,
         declared_type,
         nullable,
         key_kind,
         default_value,
         extra,
      })
   }

   pub fn is_auto_increment(&self) -> bool {
      self
         .extra
         .as_deref()
         .is_some_and(|extra| extra.to_ascii_lowercase().contains("auto_increment"))
   }
}

/// Render one column clause: `` `name` TYPE[(length)] [NOT NULL] [AUTO_INCREMENT] [DEFAULT …] ``
pub(crate) fn render_column(column: &ColumnDefinition) -> Result<String> {
   let name = quote("column", &column.name)?;

   let data_type = column.data_type.trim();
   if !TYPE_NAME.is_match(data_type) {
      return Err(Error::validation(
         format!("type of column '{}'", column.name),
         format!("'{}' is not a type name", column.data_type),
      ));
   }

   let data_type = data_type.to_ascii_uppercase();
   let mut clause = format!("{} {}", name, data_type);
   let length = column.length.as_deref().map(str::trim).filter(|l| !l.is_empty());

   if data_type == "ENUM" || data_type == "SET" {
      let values = length.and_then(parse_value_list).ok_or_else(|| {
         Error::validation(
            format!("length of column '{}'", column.name),
            format!("{} needs a comma separated list of values", data_type),
         )
      })?;
      let rendered: Vec<String> = values.iter().map(|v| quote_literal(v)).collect();
      clause.push_str(&format!("({})", rendered.join(",")));
   } else if let Some(length) = length {
      if !TYPE_LENGTH.is_match(length) {
         return Err(Error::validation(
            format!("length of column '{}'", column.name),
            format!("'{}' must be digits, optionally followed by ',digits'", length),
         ));
      }
      clause.push_str(&format!("({})", length));
   }

   if column.not_null {
      clause.push_str(" NOT NULL");
   }

   if column.auto_increment {
      clause.push_str(" AUTO_INCREMENT");
   }

   // An empty default from a form means "no default"
   if let Some(default) = column.default_value.as_deref().filter(|d| !d.is_empty()) {
      clause.push_str(" DEFAULT ");
      clause.push_str(&render_default(default));
   }

   Ok(clause)
}

/// DDL cannot bind parameters, so literal defaults are escaped in place.
fn render_default(value: &str) -> String {
   if value.eq_ignore_ascii_case("NULL") {
      "NULL".to_string()
   } else if value.eq_ignore_ascii_case("CURRENT_TIMESTAMP") {
      "CURRENT_TIMESTAMP".to_string()
   } else {
      quote_literal(value)
   }
}

fn quote_literal(value: &str) -> String {
   format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
}

/// Split an ENUM/SET member list such as `'a','b'` or `a, b`.
///
/// Quoted members may contain commas; a doubled quote inside them is a literal
/// quote. Returns `None` for an empty list, an empty member or an unterminated
/// quote.
fn parse_value_list(list: &str) -> Option<Vec<String>> {
   let mut values = Vec::new();
   let mut chars = list.chars().peekable();

   loop {
      while chars.next_if(|c| c.is_whitespace()).is_some() {}

      let value = match chars.peek().copied() {
         Some(quote @ ('\'' | '"')) => {
            chars.next();
            let mut value = String::new();
            loop {
               match chars.next()? {
                  c if c == quote && chars.next_if_eq(&quote).is_some() => value.push(quote),
                  c if c == quote => break,
                  c => value.push(c),
               }
            }
            while chars.next_if(|c| c.is_whitespace()).is_some() {}
            value
         }
         _ => {
            let mut value = String::new();
            while let Some(c) = chars.next_if(|c| *c != ',') {
               value.push(c);
            }
            let value = value.trim().to_string();
            if value.is_empty() {
               return None;
            }
            value
         }
      };
      values.push(value);

      match chars.next() {
         None => return Some(values),
         Some(',') => {}
         Some(_) => return None,
      }
   }
}

/// Build `CREATE TABLE IF NOT EXISTS` for `database`.`table`.
///
/// # Errors
///
/// Returns `Error::Validation` when the column list is empty, names a column
/// twice, marks more than one column primary, or contains a column whose name,
/// type or length is malformed.
pub(crate) fn build_create_table(
   database: &str,
   table: &str,
   columns: &[ColumnDefinition],
) -> Result<String> {
   let target = qualified(database, table)?;

   if columns.is_empty() {
      return Err(Error::validation("columns", "at least one column is required"));
   }

   // Column names are case-insensitive in MySQL
   let mut seen = HashSet::with_capacity(columns.len());
   for column in columns {
      if !seen.insert(column.name.to_lowercase()) {
         return Err(Error::validation(
            "columns",
            format!("column '{}' is defined more than once", column.name),
         ));
      }
   }

   let primary: Vec<&ColumnDefinition> = columns.iter().filter(|c| c.is_primary).collect();
   if primary.len() > 1 {
      let names: Vec<&str> = primary.iter().map(|c| c.name.as_str()).collect();
      return Err(Error::validation(
         "columns",
         format!("only one primary key column is allowed, got {}", names.join(", ")),
      ));
   }

   let mut clauses = columns
      .iter()
      .map(render_column)
      .collect::<Result<Vec<_>>>()?;

   if let Some(column) = primary.first() {
      clauses.push(format!("PRIMARY KEY ({})", quote("column", &column.name)?));
   }

   Ok(format!(
      "CREATE TABLE IF NOT EXISTS {} ({})",
      target,
      clauses.join(", ")
   ))
}
