use std::time::Duration;

use crate::error::CatalogError;

use super::ConnectionPool;

/// Options for a pooled SQLite database.
#[derive(Debug, Clone)]
pub struct PoolOptions {
    pub db_path: String,
    /// Connections opened eagerly by [`ConnectionPool::initialize`].
    pub min_size: usize,
    /// Hard ceiling on connections checked out at once.
    pub max_size: usize,
    /// How long `acquire` waits for a free connection before `PoolExhausted`.
    pub acquire_timeout: Duration,
    /// Deadline for opening one connection (and for the whole warm-up).
    pub connect_timeout: Duration,
    /// SQLite `busy_timeout` applied to each new connection.
    pub busy_timeout: Duration,
}

impl PoolOptions {
    #[must_use]
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
            min_size: 1,
            max_size: 8,
            acquire_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_secs(5),
        }
    }

    #[must_use]
    pub fn builder(db_path: impl Into<String>) -> PoolOptionsBuilder {
        PoolOptionsBuilder::new(db_path)
    }

    /// # Errors
    /// Returns `CatalogError::ConfigError` when the sizes are inconsistent.
    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.max_size == 0 {
            return Err(CatalogError::ConfigError(
                "pool max_size must be at least 1".into(),
            ));
        }
        if self.min_size > self.max_size {
            return Err(CatalogError::ConfigError(format!(
                "pool min_size ({}) exceeds max_size ({})",
                self.min_size, self.max_size
            )));
        }
        if self.db_path.trim().is_empty() {
            return Err(CatalogError::ConfigError("database path is empty".into()));
        }
        Ok(())
    }
}

/// Fluent builder for [`PoolOptions`].
#[derive(Debug, Clone)]
pub struct PoolOptionsBuilder {
    opts: PoolOptions,
}

impl PoolOptionsBuilder {
    #[must_use]
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            opts: PoolOptions::new(db_path),
        }
    }

    #[must_use]
    pub fn min_size(mut self, min_size: usize) -> Self {
        self.opts.min_size = min_size;
        self
    }

    #[must_use]
    pub fn max_size(mut self, max_size: usize) -> Self {
        self.opts.max_size = max_size;
        self
    }

    #[must_use]
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.opts.acquire_timeout = timeout;
        self
    }

    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.opts.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.opts.busy_timeout = timeout;
        self
    }

    #[must_use]
    pub fn finish(self) -> PoolOptions {
        self.opts
    }

    /// Build the pool and run its eager warm-up.
    ///
    /// # Errors
    /// Returns `CatalogError` if the options are invalid or the store is unreachable.
    pub async fn connect(self) -> Result<ConnectionPool, CatalogError> {
        ConnectionPool::connect(self.finish()).await
    }
}
