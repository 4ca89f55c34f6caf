//! Parameterised `SELECT` builder for block tables.
//!
//! Identifiers are validated and quoted; values only ever travel as bound
//! parameters.

use rusqlite::types::Value;

use crate::block::BlockError;
use crate::value::PropertyValue;

/// Accept ASCII identifiers that start with a letter or underscore.
pub(crate) fn validate_identifier(identifier: &str) -> Result<&str, BlockError> {
    let mut chars = identifier.chars();
    let valid = chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(identifier)
    } else {
        Err(BlockError::InvalidIdentifier {
            identifier: identifier.to_owned(),
        })
    }
}

/// Validate and double-quote an identifier.
pub(crate) fn quote_identifier(identifier: &str) -> Result<String, BlockError> {
    validate_identifier(identifier).map(|valid| format!("\"{valid}\""))
}

/// Convert a property value into a bindable SQLite value.
pub(crate) fn to_sql_value(value: &PropertyValue) -> Value {
    match value {
        PropertyValue::Null => Value::Null,
        PropertyValue::Integer(number) => Value::Integer(*number),
        PropertyValue::Real(number) => Value::Real(*number),
        PropertyValue::String(text) => Value::Text(text.clone()),
    }
}

/// `SELECT <columns> FROM <table> [WHERE ...] ORDER BY _fid [LIMIT n]`.
#[derive(Debug, Clone)]
pub(crate) struct SelectQuery {
    table: String,
    columns: String,
    conditions: Vec<String>,
    params: Vec<Value>,
    limit: Option<u32>,
}

impl SelectQuery {
    /// Start a query over an already quoted table and column list.
    pub(crate) fn new(table: &str, columns: &str) -> Self {
        Self {
            table: table.to_owned(),
            columns: columns.to_owned(),
            conditions: Vec::new(),
            params: Vec::new(),
            limit: None,
        }
    }

    /// Require `column = value`.
    pub(crate) fn where_eq(mut self, column: &str, value: Value) -> Result<Self, BlockError> {
        let quoted = quote_identifier(column)?;
        self.params.push(value);
        self.conditions.push(format!("{quoted} = ?{}", self.params.len()));
        Ok(self)
    }

    /// Require `_fid > fid`.
    pub(crate) fn after_fid(mut self, fid: i64) -> Self {
        self.params.push(Value::Integer(fid));
        self.conditions.push(format!("_fid > ?{}", self.params.len()));
        self
    }

    /// Cap the number of returned rows.
    pub(crate) const fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub(crate) fn sql(&self) -> String {
        let mut sql = format!("SELECT {} FROM {}", self.columns, self.table);
        if !self.conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.conditions.join(" AND "));
        }
        sql.push_str(" ORDER BY _fid");
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        sql
    }

    pub(crate) fn params(&self) -> &[Value] {
        &self.params
    }
}
