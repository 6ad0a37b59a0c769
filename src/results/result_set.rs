use std::sync::Arc;

use super::row::{FromRow, Row, index_columns};
use crate::error::CatalogError;
use crate::types::SqlValue;

/// Rows returned by a statement plus the rows-affected count.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    pub results: Vec<Row>,
    pub rows_affected: usize,
    column_names: Option<Arc<Vec<String>>>,
    column_index: Option<Arc<std::collections::HashMap<String, usize>>>,
}

impl ResultSet {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> ResultSet {
        ResultSet {
            results: Vec::with_capacity(capacity),
            rows_affected: 0,
            column_names: None,
            column_index: None,
        }
    }

    pub fn set_column_names(&mut self, column_names: Arc<Vec<String>>) {
        self.column_index = Some(Arc::new(index_columns(&column_names)));
        self.column_names = Some(column_names);
    }

    #[must_use]
    pub fn column_names(&self) -> Option<&Arc<Vec<String>>> {
        self.column_names.as_ref()
    }

    /// Append a row that shares this set's column metadata.
    pub fn add_row_values(&mut self, values: Vec<SqlValue>) {
        if let (Some(column_names), Some(column_index)) = (&self.column_names, &self.column_index)
        {
            self.results.push(Row {
                column_names: Arc::clone(column_names),
                values,
                column_index: Arc::clone(column_index),
            });
            self.rows_affected += 1;
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    #[must_use]
    pub fn first(&self) -> Option<&Row> {
        self.results.first()
    }

    /// Map every row through [`FromRow`].
    ///
    /// # Errors
    /// Propagates the first mapping failure.
    pub fn map_rows<T: FromRow>(&self) -> Result<Vec<T>, CatalogError> {
        self.results.iter().map(T::from_row).collect()
    }

    /// Map the first row, if any.
    ///
    /// # Errors
    /// Propagates a mapping failure.
    pub fn map_first<T: FromRow>(&self) -> Result<Option<T>, CatalogError> {
        self.results.first().map(T::from_row).transpose()
    }
}
