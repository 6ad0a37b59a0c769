//! Bounded pool of SQLite connections.
//!
//! Built on `deadpool::managed`: the pool enforces the size ceiling, queues waiters,
//! and recycles returned connections through [`SqliteManager`], which refuses to hand
//! out a session that is still inside a transaction.

mod connection;
mod manager;
mod options;

use std::sync::Arc;
use std::time::{Duration, Instant};

use deadpool::Runtime;
use deadpool::managed::{Pool, PoolError, TimeoutType};
use serde::Serialize;
use tokio::sync::OnceCell;

use crate::error::CatalogError;

pub use connection::PooledConnection;
pub(crate) use connection::run_blocking;
pub use manager::{SharedConnection, SqliteManager};
pub use options::{PoolOptions, PoolOptionsBuilder};

/// Delays between attempts when opening a connection fails transiently.
const ACQUIRE_BACKOFF: &[Duration] = &[
    Duration::from_millis(10),
    Duration::from_millis(25),
    Duration::from_millis(50),
];

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    pub max_size: usize,
    /// Live connections, idle or checked out.
    pub size: usize,
    pub idle: usize,
    pub in_use: usize,
    /// Callers currently suspended in `acquire`.
    pub waiting: usize,
    pub closed: bool,
}

#[derive(Debug)]
struct PoolInner {
    pool: Pool<SqliteManager>,
    options: PoolOptions,
    warmed: OnceCell<()>,
}

/// Shared handle to the connection pool. Cloning is cheap; all clones see the same pool.
#[derive(Debug, Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    /// Build a pool without opening any connection yet.
    ///
    /// # Errors
    /// Returns `ConfigError` if the options are inconsistent.
    pub fn new(options: PoolOptions) -> Result<Self, CatalogError> {
        options.validate()?;
        let manager = SqliteManager::new(options.db_path.clone(), options.busy_timeout);
        let pool = Pool::builder(manager)
            .max_size(options.max_size)
            .wait_timeout(Some(options.acquire_timeout))
            .create_timeout(Some(options.connect_timeout))
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| CatalogError::ConfigError(format!("cannot build pool: {e}")))?;
        Ok(Self {
            inner: Arc::new(PoolInner {
                pool,
                options,
                warmed: OnceCell::new(),
            }),
        })
    }

    /// Build the pool and eagerly open `min_size` connections.
    ///
    /// # Errors
    /// Returns `ConnectionError` if the store cannot be reached within the connect timeout.
    pub async fn connect(options: PoolOptions) -> Result<Self, CatalogError> {
        let pool = Self::new(options)?;
        pool.initialize().await?;
        Ok(pool)
    }

    #[must_use]
    pub fn options(&self) -> &PoolOptions {
        &self.inner.options
    }

    /// Open `min_size` connections up front. Calling it again is a no-op once it succeeded.
    ///
    /// # Errors
    /// Returns `ConnectionError` when warm-up fails or exceeds the connect timeout,
    /// `PoolClosed` after shutdown.
    pub async fn initialize(&self) -> Result<(), CatalogError> {
        self.inner
            .warmed
            .get_or_try_init(|| self.warm_up())
            .await
            .map(|_| ())
    }

    async fn warm_up(&self) -> Result<(), CatalogError> {
        let opts = &self.inner.options;
        let deadline = opts.connect_timeout;
        let open_all = async {
            let mut held = Vec::with_capacity(opts.min_size);
            for _ in 0..opts.min_size {
                let object = self.inner.pool.get().await.map_err(|err| match err {
                    PoolError::Closed => CatalogError::PoolClosed,
                    other => CatalogError::ConnectionError(format!("warm-up failed: {other}")),
                })?;
                held.push(object);
            }
            Ok::<usize, CatalogError>(held.len())
        };
        match tokio::time::timeout(deadline, open_all).await {
            Ok(Ok(opened)) => {
                tracing::info!(
                    db_path = %opts.db_path,
                    opened,
                    max_size = opts.max_size,
                    "connection pool initialized"
                );
                Ok(())
            }
            Ok(Err(err)) => {
                tracing::error!(error = %err, "connection pool warm-up failed");
                Err(err)
            }
            Err(_) => {
                tracing::error!(timeout_ms = deadline.as_millis(), "connection pool warm-up timed out");
                Err(CatalogError::ConnectionError(format!(
                    "store unreachable within {} ms",
                    deadline.as_millis()
                )))
            }
        }
    }

    /// Check out a connection, waiting up to the acquire timeout for one to free up.
    ///
    /// Connection-creation failures are retried a few times with backoff. A wait
    /// timeout is not retried.
    ///
    /// # Errors
    /// `PoolExhausted` on wait timeout, `PoolClosed` after shutdown, `ConnectionError`
    /// when a new connection cannot be opened.
    pub async fn acquire(&self) -> Result<PooledConnection, CatalogError> {
        let started = Instant::now();
        let mut attempt = 0;
        loop {
            match self.inner.pool.get().await {
                Ok(object) => return Ok(PooledConnection::new(object)),
                Err(PoolError::Timeout(TimeoutType::Wait)) => {
                    let waited_ms = started.elapsed().as_millis();
                    tracing::warn!(waited_ms, "connection pool exhausted");
                    return Err(CatalogError::PoolExhausted { waited_ms });
                }
                Err(PoolError::Closed) => return Err(CatalogError::PoolClosed),
                Err(err) => {
                    if let Some(delay) = ACQUIRE_BACKOFF.get(attempt) {
                        tracing::warn!(attempt = attempt + 1, error = %err, "acquire failed, retrying");
                        tokio::time::sleep(*delay).await;
                        attempt += 1;
                        continue;
                    }
                    tracing::error!(error = %err, "acquire failed after retries");
                    return Err(match err {
                        PoolError::Backend(inner) => inner,
                        other => CatalogError::ConnectionError(other.to_string()),
                    });
                }
            }
        }
    }

    /// Return a connection. Equivalent to dropping it; a dirty connection is discarded.
    pub fn release(&self, conn: PooledConnection) {
        conn.release();
    }

    /// Close the pool. Idle connections close now, checked-out ones when returned.
    pub fn shutdown(&self) {
        if self.inner.pool.is_closed() {
            return;
        }
        let status = self.status();
        self.inner.pool.close();
        tracing::info!(
            idle_closed = status.idle,
            in_use = status.in_use,
            "connection pool shut down"
        );
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.pool.is_closed()
    }

    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let status = self.inner.pool.status();
        PoolStatus {
            max_size: status.max_size,
            size: status.size,
            idle: status.available,
            in_use: status.size.saturating_sub(status.available),
            waiting: status.waiting,
            closed: self.inner.pool.is_closed(),
        }
    }

    /// Make the next `count` connection attempts fail.
    #[doc(hidden)]
    pub fn fail_next_connects_for_tests(&self, count: usize) {
        self.inner.pool.manager().fail_next_connects(count);
    }
}
