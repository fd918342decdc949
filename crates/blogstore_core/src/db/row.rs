//! Owned row snapshots and parameterized statements.
//!
//! Rows cross the blocking/async boundary, so they carry owned values keyed
//! by the column alias that produced them.

use super::{DbError, DbResult};
use rusqlite::types::{FromSql, Value, ValueRef};
use std::sync::Arc;

/// One result row detached from its SQLite statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    /// Builds a row from shared column names and positional values.
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    /// Builds a row from `(alias, value)` pairs.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        let (columns, values): (Vec<String>, Vec<Value>) = pairs
            .into_iter()
            .map(|(column, value)| (column.into(), value))
            .unzip();
        Self {
            columns: columns.into(),
            values,
        }
    }

    /// Column aliases in projection order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Reads one column converted through rusqlite's `FromSql`.
    ///
    /// # Errors
    /// - `MissingColumn` when the alias is not part of the projection.
    /// - `ColumnType` when the stored value cannot convert to `T`.
    pub fn get<T: FromSql>(&self, column: &str) -> DbResult<T> {
        let value = self.value(column)?;
        T::column_result(ValueRef::from(value)).map_err(|source| DbError::ColumnType {
            column: column.to_string(),
            source,
        })
    }

    /// Returns whether the column holds SQL NULL.
    pub fn is_null(&self, column: &str) -> DbResult<bool> {
        Ok(matches!(self.value(column)?, Value::Null))
    }

    fn value(&self, column: &str) -> DbResult<&Value> {
        self.columns
            .iter()
            .position(|current| current == column)
            .and_then(|index| self.values.get(index))
            .ok_or_else(|| DbError::MissingColumn(column.to_string()))
    }
}

/// SQL text plus positionally bound values.
///
/// Values are never interpolated into `sql`.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    sql: String,
    params: Vec<Value>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Appends one bound value for the next `?` placeholder.
    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }

    /// Appends bound values in order.
    pub fn bind_all(mut self, values: impl IntoIterator<Item = Value>) -> Self {
        self.params.extend(values);
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }
}
