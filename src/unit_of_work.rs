//! Transaction scope bound to one pooled connection.
//!
//! `UnitOfWork<Idle>` holds a checked-out connection with no open transaction;
//! `UnitOfWork<Active>` holds one inside `BEGIN`. Statement methods exist only on
//! `Active`, and `commit`/`rollback` consume the value, so the connection goes back to
//! the pool exactly once on every path. Dropping an `Active` scope (early return, `?`,
//! a cancelled future) rolls back synchronously before release.

use std::marker::PhantomData;

use rusqlite::Connection;

use crate::error::CatalogError;
use crate::pool::{ConnectionPool, PooledConnection, run_blocking};
use crate::query_builder::QueryPlan;
use crate::results::{FromRow, ResultSet};
use crate::sqlite::{execute_with_args, query_with_args};
use crate::tx_outcome::TxOutcome;
use crate::types::SqlValue;

/// Marker types for typestate
pub enum Idle {}
pub enum Active {}

pub struct UnitOfWork<State> {
    conn: Option<PooledConnection>,
    /// True while a transaction is open and nobody has committed or rolled it back.
    needs_rollback: bool,
    _state: PhantomData<State>,
}

impl<State> std::fmt::Debug for UnitOfWork<State> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("conn", &self.conn)
            .field("needs_rollback", &self.needs_rollback)
            .finish()
    }
}

impl UnitOfWork<Idle> {
    /// Check out a connection from the pool.
    ///
    /// # Errors
    /// Returns the pool's acquire error.
    pub async fn from_pool(pool: &ConnectionPool) -> Result<Self, CatalogError> {
        Ok(Self::from_connection(pool.acquire().await?))
    }

    #[must_use]
    pub fn from_connection(conn: PooledConnection) -> Self {
        Self {
            conn: Some(conn),
            needs_rollback: false,
            _state: PhantomData,
        }
    }

    /// Start a write transaction (`BEGIN IMMEDIATE`), taking the write lock up front.
    ///
    /// # Errors
    /// Returns the store error if the transaction cannot start; the connection is released.
    pub async fn begin(self) -> Result<UnitOfWork<Active>, CatalogError> {
        self.begin_with("BEGIN IMMEDIATE").await
    }

    /// Start a read transaction (`BEGIN DEFERRED`), giving every read one snapshot.
    ///
    /// # Errors
    /// Returns the store error if the transaction cannot start; the connection is released.
    pub async fn begin_read(self) -> Result<UnitOfWork<Active>, CatalogError> {
        self.begin_with("BEGIN DEFERRED").await
    }

    async fn begin_with(mut self, statement: &'static str) -> Result<UnitOfWork<Active>, CatalogError> {
        let conn = self.take_conn()?;
        let handle = conn.shared_handle()?;
        run_blocking(&handle, move |c| {
            c.execute_batch(statement).map_err(CatalogError::from_sqlite)
        })
        .await?;
        Ok(UnitOfWork {
            conn: Some(conn),
            needs_rollback: true,
            _state: PhantomData,
        })
    }

    /// Give the connection back without ever starting a transaction.
    pub fn release(mut self) {
        if let Some(conn) = self.conn.take() {
            conn.release();
        }
    }
}

impl UnitOfWork<Active> {
    /// Acquire a connection and open a write transaction on it.
    ///
    /// # Errors
    /// `PoolExhausted`/`PoolClosed`/`ConnectionError` from the pool, or the store error
    /// from `BEGIN`.
    pub async fn write(pool: &ConnectionPool) -> Result<Self, CatalogError> {
        UnitOfWork::<Idle>::from_pool(pool).await?.begin().await
    }

    /// Acquire a connection and open a read transaction on it.
    ///
    /// # Errors
    /// Same as [`UnitOfWork::write`].
    pub async fn read(pool: &ConnectionPool) -> Result<Self, CatalogError> {
        UnitOfWork::<Idle>::from_pool(pool).await?.begin_read().await
    }

    fn conn(&self) -> Result<&PooledConnection, CatalogError> {
        self.conn
            .as_ref()
            .ok_or_else(|| CatalogError::ExecutionError("unit of work already finished".into()))
    }

    /// Run blocking work with the transaction's connection.
    ///
    /// # Errors
    /// Whatever the closure returns.
    pub async fn with_connection<F, R>(&self, func: F) -> Result<R, CatalogError>
    where
        F: FnOnce(&mut Connection) -> Result<R, CatalogError> + Send + 'static,
        R: Send + 'static,
    {
        self.conn()?.with_connection(func).await
    }

    /// # Errors
    /// Returns the classified store error.
    pub async fn query(&self, sql: &str, args: &[SqlValue]) -> Result<ResultSet, CatalogError> {
        let sql = sql.to_owned();
        let args = args.to_vec();
        self.with_connection(move |c| query_with_args(c, &sql, &args))
            .await
    }

    /// # Errors
    /// Returns the classified store error.
    pub async fn execute(&self, sql: &str, args: &[SqlValue]) -> Result<usize, CatalogError> {
        let sql = sql.to_owned();
        let args = args.to_vec();
        self.with_connection(move |c| execute_with_args(c, &sql, &args))
            .await
    }

    /// Run a composed plan that yields rows.
    ///
    /// # Errors
    /// Returns the classified store error.
    pub async fn fetch(&self, plan: &QueryPlan) -> Result<ResultSet, CatalogError> {
        self.query(&plan.sql, &plan.args).await
    }

    /// Run a composed plan and map every row.
    ///
    /// # Errors
    /// Store errors, or `ExecutionError` when a row does not match `T`.
    pub async fn fetch_all<T: FromRow>(&self, plan: &QueryPlan) -> Result<Vec<T>, CatalogError> {
        self.fetch(plan).await?.map_rows()
    }

    /// Run a composed plan and map the first row, if any.
    ///
    /// # Errors
    /// Store errors, or `ExecutionError` when the row does not match `T`.
    pub async fn fetch_optional<T: FromRow>(
        &self,
        plan: &QueryPlan,
    ) -> Result<Option<T>, CatalogError> {
        self.fetch(plan).await?.map_first()
    }

    /// Run a composed plan that yields no rows.
    ///
    /// # Errors
    /// Returns the classified store error.
    pub async fn run(&self, plan: &QueryPlan) -> Result<usize, CatalogError> {
        self.execute(&plan.sql, &plan.args).await
    }

    /// # Errors
    /// Returns the classified store error.
    pub async fn execute_batch(&self, sql: &str) -> Result<(), CatalogError> {
        self.conn()?.execute_batch(sql).await
    }

    /// Open a named savepoint inside the transaction.
    ///
    /// # Errors
    /// Returns the store error.
    pub async fn savepoint(&self, name: &'static str) -> Result<(), CatalogError> {
        self.execute_batch(&format!("SAVEPOINT {name}")).await
    }

    /// Keep the work done since the savepoint.
    ///
    /// # Errors
    /// Returns the store error.
    pub async fn release_savepoint(&self, name: &'static str) -> Result<(), CatalogError> {
        self.execute_batch(&format!("RELEASE SAVEPOINT {name}")).await
    }

    /// Undo the work done since the savepoint and drop it; the outer transaction stays open.
    ///
    /// # Errors
    /// Returns the store error.
    pub async fn rollback_to(&self, name: &'static str) -> Result<(), CatalogError> {
        self.execute_batch(&format!("ROLLBACK TO SAVEPOINT {name}; RELEASE SAVEPOINT {name}"))
            .await
    }

    /// Commit and release the connection.
    ///
    /// # Errors
    /// Returns the store error after a best-effort rollback.
    pub async fn commit(mut self) -> Result<TxOutcome, CatalogError> {
        let conn = self.take_conn()?;
        self.needs_rollback = false;
        let handle = conn.shared_handle()?;
        let result = run_blocking(&handle, |c| {
            c.execute_batch("COMMIT").map_err(CatalogError::from_sqlite)
        })
        .await;
        match result {
            Ok(()) => {
                conn.release();
                Ok(TxOutcome::Committed)
            }
            Err(err) => {
                tracing::error!(error = %err, "commit failed, rolling back");
                let _ = run_blocking(&handle, |c| {
                    if !c.is_autocommit() {
                        c.execute_batch("ROLLBACK").map_err(CatalogError::from_sqlite)?;
                    }
                    Ok(())
                })
                .await;
                conn.release();
                Err(err)
            }
        }
    }

    /// Roll back and release the connection. Never fails; errors are logged.
    pub async fn rollback(mut self) -> TxOutcome {
        let Ok(conn) = self.take_conn() else {
            return TxOutcome::RolledBack;
        };
        self.needs_rollback = false;
        if let Ok(handle) = conn.shared_handle() {
            let result = run_blocking(&handle, |c| {
                if !c.is_autocommit() {
                    c.execute_batch("ROLLBACK").map_err(CatalogError::from_sqlite)?;
                }
                Ok(())
            })
            .await;
            if let Err(err) = result {
                tracing::warn!(error = %err, "rollback failed");
            }
        }
        // A session that could not roll back is discarded by release.
        conn.release();
        TxOutcome::RolledBack
    }

    /// Commit when `result` is `Ok`, roll back otherwise, and pass the result through.
    ///
    /// # Errors
    /// The original error, or the commit error.
    pub async fn finish<T>(self, result: Result<T, CatalogError>) -> Result<T, CatalogError> {
        match result {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(err) => {
                self.rollback().await;
                Err(err)
            }
        }
    }
}

impl<State> UnitOfWork<State> {
    fn take_conn(&mut self) -> Result<PooledConnection, CatalogError> {
        self.conn
            .take()
            .ok_or_else(|| CatalogError::ExecutionError("unit of work already finished".into()))
    }
}

impl<State> Drop for UnitOfWork<State> {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        if self.needs_rollback {
            if conn.rollback_in_place() {
                tracing::debug!("unit of work dropped while active, rolled back");
            } else {
                tracing::warn!("unit of work dropped mid-statement, discarding connection");
                conn.discard();
                return;
            }
        }
        conn.release();
    }
}
