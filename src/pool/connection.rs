use std::sync::Arc;

use deadpool::managed::Object;
use rusqlite::Connection;

use crate::error::CatalogError;
use crate::results::ResultSet;
use crate::sqlite::{execute_with_args, query_with_args};
use crate::types::SqlValue;

use super::manager::{SharedConnection, SqliteManager};

/// Run blocking work against a shared connection on the blocking thread pool.
///
/// The closure holds the connection mutex for its whole duration, so statements from
/// one session never interleave.
///
/// # Errors
/// Returns the closure's error, or `ExecutionError` if the blocking task panicked.
pub(crate) async fn run_blocking<F, R>(conn: &SharedConnection, func: F) -> Result<R, CatalogError>
where
    F: FnOnce(&mut Connection) -> Result<R, CatalogError> + Send + 'static,
    R: Send + 'static,
{
    let handle = Arc::clone(conn);
    tokio::task::spawn_blocking(move || {
        let mut guard = handle.blocking_lock();
        func(&mut guard)
    })
    .await
    .map_err(|e| CatalogError::ExecutionError(format!("sqlite worker failed: {e}")))?
}

/// A connection checked out of the [`ConnectionPool`](super::ConnectionPool).
///
/// Dropping it hands the connection back. A connection left inside a transaction is
/// discarded instead of returned.
pub struct PooledConnection {
    object: Option<Object<SqliteManager>>,
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("checked_out", &self.object.is_some())
            .finish()
    }
}

impl PooledConnection {
    pub(crate) fn new(object: Object<SqliteManager>) -> Self {
        Self {
            object: Some(object),
        }
    }

    fn shared(&self) -> Result<&SharedConnection, CatalogError> {
        self.object
            .as_deref()
            .ok_or_else(|| CatalogError::ConnectionError("connection already released".into()))
    }

    /// Run arbitrary blocking work with exclusive access to the underlying connection.
    ///
    /// # Errors
    /// Returns whatever the closure returns, or `ConnectionError` after release.
    pub async fn with_connection<F, R>(&self, func: F) -> Result<R, CatalogError>
    where
        F: FnOnce(&mut Connection) -> Result<R, CatalogError> + Send + 'static,
        R: Send + 'static,
    {
        run_blocking(self.shared()?, func).await
    }

    /// Run a row-returning statement outside any explicit transaction.
    ///
    /// # Errors
    /// Returns the classified store error.
    pub async fn query(&self, sql: &str, args: &[SqlValue]) -> Result<ResultSet, CatalogError> {
        let sql = sql.to_owned();
        let args = args.to_vec();
        self.with_connection(move |conn| query_with_args(conn, &sql, &args))
            .await
    }

    /// # Errors
    /// Returns the classified store error.
    pub async fn execute(&self, sql: &str, args: &[SqlValue]) -> Result<usize, CatalogError> {
        let sql = sql.to_owned();
        let args = args.to_vec();
        self.with_connection(move |conn| execute_with_args(conn, &sql, &args))
            .await
    }

    /// Execute several `;`-separated statements without arguments (DDL, pragmas).
    ///
    /// # Errors
    /// Returns the classified store error.
    pub async fn execute_batch(&self, sql: &str) -> Result<(), CatalogError> {
        let sql = sql.to_owned();
        self.with_connection(move |conn| {
            conn.execute_batch(&sql).map_err(|err| {
                tracing::error!(%sql, error = %err, "batch failed");
                CatalogError::from_sqlite(err)
            })
        })
        .await
    }

    pub(crate) fn shared_handle(&self) -> Result<SharedConnection, CatalogError> {
        self.shared().map(Arc::clone)
    }

    /// Roll back an open transaction without leaving the current thread.
    ///
    /// Returns false when the session is locked by an unfinished blocking task, in which
    /// case nothing was attempted.
    pub(crate) fn rollback_in_place(&self) -> bool {
        let Some(shared) = self.object.as_deref() else {
            return true;
        };
        let Ok(conn) = shared.try_lock() else {
            return false;
        };
        if !conn.is_autocommit()
            && let Err(err) = conn.execute_batch("ROLLBACK")
        {
            tracing::warn!(error = %err, "rollback during drop failed");
        }
        conn.is_autocommit()
    }

    /// True when the session is busy or still inside an open transaction.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        match self.object.as_deref() {
            Some(shared) => match shared.try_lock() {
                Ok(conn) => !conn.is_autocommit(),
                Err(_) => true,
            },
            None => false,
        }
    }

    /// Hand the connection back to the pool, or discard it when dirty.
    pub fn release(mut self) {
        self.return_or_discard();
    }

    /// Remove the connection from the pool for good.
    pub fn discard(mut self) {
        if let Some(object) = self.object.take() {
            drop(Object::take(object));
            tracing::debug!("pooled connection discarded");
        }
    }

    fn return_or_discard(&mut self) {
        if self.is_dirty() {
            if let Some(object) = self.object.take() {
                tracing::warn!("discarding connection released inside a transaction");
                drop(Object::take(object));
            }
        } else {
            // Object's own Drop returns it to the idle set.
            self.object.take();
        }
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        self.return_or_discard();
    }
}
