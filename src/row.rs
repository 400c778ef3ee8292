//! Result rows.
//!
//! [`Rows`] is the row sequence returned by query-shaped calls. Backends hand
//! back tagged values; decoding into application types happens on demand via
//! [`FromSql`] when a column is read.

use std::sync::Arc;

use crate::convert::FromSql;
use crate::error::{Error, QueryError, Result};
use crate::value::SqlValue;

/// A single result row.
#[derive(Debug, Clone)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<SqlValue>,
}

impl Row {
    pub(crate) fn new(columns: Arc<[String]>, values: Vec<SqlValue>) -> Self {
        Self { columns, values }
    }

    /// Column names in result order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The raw tagged value of a column, by name.
    pub fn value(&self, column: &str) -> Option<&SqlValue> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.values.get(idx)
    }

    /// Decode a column by name.
    ///
    /// # Errors
    ///
    /// Fails if the column does not exist or the value cannot convert to `T`.
    pub fn get<T: FromSql>(&self, column: &str) -> Result<T> {
        let value = self.value(column).ok_or_else(|| {
            Error::Query(QueryError::Execution {
                message: format!("column not found: {column}"),
                sqlstate: None,
                sql: String::new(),
                params: String::new(),
            })
        })?;
        T::from_sql(value.clone())
    }

    /// Decode a column by position.
    ///
    /// # Errors
    ///
    /// Fails if the index is out of bounds or the value cannot convert to `T`.
    pub fn get_at<T: FromSql>(&self, index: usize) -> Result<T> {
        let value = self.values.get(index).ok_or_else(|| {
            Error::Query(QueryError::Execution {
                message: format!("column index {index} out of bounds (len {})", self.values.len()),
                sqlstate: None,
                sql: String::new(),
                params: String::new(),
            })
        })?;
        T::from_sql(value.clone())
    }

    /// Consume the row into its tagged values.
    pub fn into_values(self) -> Vec<SqlValue> {
        self.values
    }
}

/// Row sequence returned by a query.
///
/// Iteration yields rows in result order; column values decode lazily when
/// read through [`Row::get`].
#[derive(Debug)]
pub struct Rows {
    columns: Arc<[String]>,
    rows: std::vec::IntoIter<Vec<SqlValue>>,
}

impl Rows {
    pub(crate) fn new(columns: Vec<String>, rows: Vec<Vec<SqlValue>>) -> Self {
        Self {
            columns: columns.into(),
            rows: rows.into_iter(),
        }
    }

    /// Column names in result order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows remaining in the sequence.
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }

    /// Collect all remaining rows.
    pub fn collect_all(self) -> Vec<Row> {
        self.collect()
    }
}

impl Iterator for Rows {
    type Item = Row;

    fn next(&mut self) -> Option<Self::Item> {
        let values = self.rows.next()?;
        Some(Row::new(Arc::clone(&self.columns), values))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}
