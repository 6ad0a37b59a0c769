use thiserror::Error;

use rusqlite::ErrorCode;
use rusqlite::ffi;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("connection pool exhausted after waiting {waited_ms} ms")]
    PoolExhausted { waited_ms: u128 },

    #[error("connection pool is closed")]
    PoolClosed,

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Invalid sort field: {0}")]
    InvalidSortField(String),

    #[error("Invalid page spec: {0}")]
    InvalidPageSpec(String),

    #[error("{0}")]
    UniqueConstraintViolation(String),

    #[error("{0}")]
    ConstraintViolation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("row {row}: {reason}")]
    RowValidation { row: usize, reason: String },

    #[error("{0}")]
    Validation(String),

    #[error("Incorrect email or password")]
    InvalidCredentials,

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("The uploaded file contains no data rows")]
    EmptyInput,

    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error(transparent)]
    StoreError(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),
}

impl CatalogError {
    /// Classify a driver error, splitting constraint failures out of the catch-all.
    #[must_use]
    pub fn from_sqlite(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(failure, message) = &err
            && failure.code == ErrorCode::ConstraintViolation
        {
            let detail = message
                .clone()
                .unwrap_or_else(|| "constraint violation".to_string());
            return match failure.extended_code {
                ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    CatalogError::UniqueConstraintViolation(detail)
                }
                _ => CatalogError::ConstraintViolation(detail),
            };
        }
        CatalogError::StoreError(err)
    }

    /// HTTP status the boundary uses for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            CatalogError::NotFound(_) => 404,
            CatalogError::InvalidCredentials => 401,
            CatalogError::InvalidSortField(_)
            | CatalogError::InvalidPageSpec(_)
            | CatalogError::UniqueConstraintViolation(_)
            | CatalogError::ConstraintViolation(_)
            | CatalogError::RowValidation { .. }
            | CatalogError::Validation(_)
            | CatalogError::UnsupportedFormat(_)
            | CatalogError::EmptyInput
            | CatalogError::MissingColumns(_) => 400,
            CatalogError::PoolExhausted { .. }
            | CatalogError::PoolClosed
            | CatalogError::ConnectionError(_)
            | CatalogError::StoreError(_)
            | CatalogError::Storage(_)
            | CatalogError::ConfigError(_)
            | CatalogError::ExecutionError(_) => 500,
        }
    }

    /// Message safe to hand to a client. Internal failures never leak detail.
    #[must_use]
    pub fn public_message(&self) -> String {
        if self.status_code() >= 500 {
            "Internal server error".to_string()
        } else {
            self.to_string()
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, CatalogError::NotFound(_))
    }
}
