use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDateTime;

use crate::error::CatalogError;
use crate::types::SqlValue;

/// A row from a query result.
///
/// Column names and the name→index map are shared by every row of one result set.
#[derive(Debug, Clone)]
pub struct Row {
    pub column_names: Arc<Vec<String>>,
    pub values: Vec<SqlValue>,
    pub(crate) column_index: Arc<HashMap<String, usize>>,
}

impl Row {
    #[must_use]
    pub fn new(column_names: Arc<Vec<String>>, values: Vec<SqlValue>) -> Self {
        let column_index = Arc::new(index_columns(&column_names));
        Self {
            column_names,
            values,
            column_index,
        }
    }

    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&SqlValue> {
        self.column_index
            .get(column_name)
            .and_then(|idx| self.values.get(*idx))
    }

    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&SqlValue> {
        self.values.get(index)
    }

    /// # Errors
    /// Returns `CatalogError::ExecutionError` if the column is absent, NULL or not an integer.
    pub fn int(&self, column: &str) -> Result<i64, CatalogError> {
        self.get(column)
            .and_then(SqlValue::as_int)
            .ok_or_else(|| missing(column, "integer"))
    }

    /// # Errors
    /// Returns `CatalogError::ExecutionError` if the column is absent or not an integer.
    pub fn opt_int(&self, column: &str) -> Result<Option<i64>, CatalogError> {
        match self.get(column) {
            Some(SqlValue::Null) => Ok(None),
            Some(value) => value.as_int().map(Some).ok_or_else(|| missing(column, "integer")),
            None => Err(missing(column, "integer")),
        }
    }

    /// # Errors
    /// Returns `CatalogError::ExecutionError` if the column is absent, NULL or not numeric.
    pub fn float(&self, column: &str) -> Result<f64, CatalogError> {
        self.get(column)
            .and_then(SqlValue::as_float)
            .ok_or_else(|| missing(column, "number"))
    }

    /// # Errors
    /// Returns `CatalogError::ExecutionError` if the column is absent or not numeric.
    pub fn opt_float(&self, column: &str) -> Result<Option<f64>, CatalogError> {
        match self.get(column) {
            Some(SqlValue::Null) => Ok(None),
            Some(value) => value.as_float().map(Some).ok_or_else(|| missing(column, "number")),
            None => Err(missing(column, "number")),
        }
    }

    /// # Errors
    /// Returns `CatalogError::ExecutionError` if the column is absent, NULL or not text.
    pub fn text(&self, column: &str) -> Result<String, CatalogError> {
        self.get(column)
            .and_then(SqlValue::as_text)
            .map(str::to_string)
            .ok_or_else(|| missing(column, "text"))
    }

    /// # Errors
    /// Returns `CatalogError::ExecutionError` if the column is absent or not text.
    pub fn opt_text(&self, column: &str) -> Result<Option<String>, CatalogError> {
        match self.get(column) {
            Some(SqlValue::Null) => Ok(None),
            Some(value) => value
                .as_text()
                .map(|s| Some(s.to_string()))
                .ok_or_else(|| missing(column, "text")),
            None => Err(missing(column, "text")),
        }
    }

    /// # Errors
    /// Returns `CatalogError::ExecutionError` if the column is absent or not a 0/1 flag.
    pub fn boolean(&self, column: &str) -> Result<bool, CatalogError> {
        self.get(column)
            .and_then(SqlValue::as_bool)
            .ok_or_else(|| missing(column, "boolean"))
    }

    /// # Errors
    /// Returns `CatalogError::ExecutionError` if the column is absent or not a timestamp.
    pub fn timestamp(&self, column: &str) -> Result<NaiveDateTime, CatalogError> {
        self.get(column)
            .and_then(SqlValue::as_timestamp)
            .ok_or_else(|| missing(column, "timestamp"))
    }
}

/// Deterministic mapping from a raw row to a response shape.
///
/// Implementations read only the columns they name, so extra columns in the projection
/// (such as a pagination `total_count`) never reach the mapped value.
pub trait FromRow: Sized {
    /// # Errors
    /// Returns `CatalogError` if a required column is missing or has the wrong type.
    fn from_row(row: &Row) -> Result<Self, CatalogError>;
}

pub(crate) fn index_columns(column_names: &[String]) -> HashMap<String, usize> {
    column_names
        .iter()
        .enumerate()
        .map(|(i, name)| (name.clone(), i))
        .collect()
}

fn missing(column: &str, expected: &str) -> CatalogError {
    CatalogError::ExecutionError(format!("column '{column}' missing or not {expected}"))
}
