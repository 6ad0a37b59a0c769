use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use deadpool::managed::{self, Metrics, RecycleError, RecycleResult};
use rusqlite::{Connection, OpenFlags};
use tokio::sync::Mutex;

use crate::error::CatalogError;

/// A pooled SQLite session. The mutex lets blocking work run off the async runtime.
pub type SharedConnection = Arc<Mutex<Connection>>;

/// Opens and recycles SQLite connections for the deadpool pool.
#[derive(Debug)]
pub struct SqliteManager {
    db_path: String,
    busy_timeout: Duration,
    fail_next_connects: AtomicUsize,
}

impl SqliteManager {
    #[must_use]
    pub fn new(db_path: String, busy_timeout: Duration) -> Self {
        Self {
            db_path,
            busy_timeout,
            fail_next_connects: AtomicUsize::new(0),
        }
    }

    pub(crate) fn fail_next_connects(&self, count: usize) {
        self.fail_next_connects.store(count, Ordering::SeqCst);
    }

    fn take_injected_failure(&self) -> bool {
        self.fail_next_connects
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

fn open_connection(path: &str, busy_timeout: Duration) -> Result<Connection, CatalogError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_URI
        | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    let conn = Connection::open_with_flags(path, flags)
        .map_err(|e| CatalogError::ConnectionError(format!("cannot open '{path}': {e}")))?;
    conn.busy_timeout(busy_timeout)
        .map_err(|e| CatalogError::ConnectionError(format!("busy_timeout: {e}")))?;
    // journal_mode returns a row, so it is read through a query rather than execute_batch.
    let _mode: String = conn
        .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
        .map_err(|e| CatalogError::ConnectionError(format!("journal_mode: {e}")))?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(|e| CatalogError::ConnectionError(format!("foreign_keys: {e}")))?;
    Ok(conn)
}

impl managed::Manager for SqliteManager {
    type Type = SharedConnection;
    type Error = CatalogError;

    async fn create(&self) -> Result<SharedConnection, CatalogError> {
        if self.take_injected_failure() {
            return Err(CatalogError::ConnectionError(
                "injected connect failure".into(),
            ));
        }
        let path = self.db_path.clone();
        let busy_timeout = self.busy_timeout;
        let conn = tokio::task::spawn_blocking(move || open_connection(&path, busy_timeout))
            .await
            .map_err(|e| CatalogError::ConnectionError(format!("connect task failed: {e}")))??;
        tracing::debug!(db_path = %self.db_path, "opened sqlite connection");
        Ok(Arc::new(Mutex::new(conn)))
    }

    async fn recycle(
        &self,
        conn: &mut SharedConnection,
        _metrics: &Metrics,
    ) -> RecycleResult<CatalogError> {
        // A connection still locked by a detached blocking task, or one left inside a
        // transaction, is never handed to the next caller.
        let guard = conn.try_lock().map_err(|_| {
            RecycleError::Backend(CatalogError::ConnectionError(
                "connection still busy".into(),
            ))
        })?;
        if !guard.is_autocommit() {
            tracing::warn!("discarding pooled connection left inside a transaction");
            return Err(RecycleError::Backend(CatalogError::ConnectionError(
                "connection left inside a transaction".into(),
            )));
        }
        Ok(())
    }
}
