//! Per-resource persistence.
//!
//! Every repository follows the same contract ([`ResourceRepository`]): it borrows a
//! connection from the pool through a [`UnitOfWork`], composes statements with the
//! query builder, commits mutations before returning success and rolls back on any
//! error. Repositories hold no mutable state of their own.

pub mod item_images;
pub mod items;
pub mod reviews;
pub mod users;

use async_trait::async_trait;

use crate::error::CatalogError;
use crate::model::{ListParams, Page};
use crate::pool::ConnectionPool;
use crate::query_builder::{
    FilterSpec, Projection, QueryPlan, SortColumn, TOTAL_COUNT_COLUMN, build_filter,
    build_order, build_page, compose, compose_count,
};
use crate::results::FromRow;
use crate::unit_of_work::{Active, UnitOfWork};

pub use items::{ItemFilter, ItemRepository, ItemDeletion};
pub use reviews::{ReviewFilter, ReviewRepository};
pub use users::{UserFilter, UserRepository};

/// CRUD contract shared by every resource.
#[async_trait]
pub trait ResourceRepository: Send + Sync {
    type Record: Send;
    type Create: Send;
    type Changes: Send;
    type Filter: Send + Sync;
    /// What a successful delete reports.
    type Deleted: Send;

    /// # Errors
    /// `UniqueConstraintViolation` on duplicates, `ConstraintViolation`/`NotFound` on
    /// missing references, store errors otherwise.
    async fn create(&self, fields: Self::Create) -> Result<Self::Record, CatalogError>;

    /// # Errors
    /// `NotFound` when no row has `id`.
    async fn get_by_id(&self, id: i64) -> Result<Self::Record, CatalogError>;

    /// # Errors
    /// `InvalidSortField`/`InvalidPageSpec` before any connection is acquired.
    async fn list(
        &self,
        filter: &Self::Filter,
        params: &ListParams,
    ) -> Result<Page<Self::Record>, CatalogError>;

    /// Apply only the supplied fields.
    ///
    /// # Errors
    /// `NotFound` when no row has `id`; `UniqueConstraintViolation` on duplicates.
    async fn update(&self, id: i64, changes: Self::Changes) -> Result<Self::Record, CatalogError>;

    /// # Errors
    /// `NotFound` when no row has `id`, on every call.
    async fn delete(&self, id: i64) -> Result<Self::Deleted, CatalogError>;
}

/// Everything a list query needs besides the request itself.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ListQuery {
    pub projection: Projection,
    pub sortable: &'static [SortColumn],
    pub tiebreaker: &'static str,
    pub max_limit: i64,
}

/// The statements for one list page, built and validated before any connection is taken.
#[derive(Debug, Clone)]
pub(crate) struct PageQuery {
    rows: QueryPlan,
    count: QueryPlan,
    skip: i64,
    limit: i64,
}

impl PageQuery {
    /// # Errors
    /// `InvalidSortField` or `InvalidPageSpec`.
    pub(crate) fn build(
        query: &ListQuery,
        filter: &FilterSpec,
        params: &ListParams,
    ) -> Result<Self, CatalogError> {
        let order = build_order(
            &params.sort_by,
            params.direction,
            query.sortable,
            query.tiebreaker,
        )?;
        let page = build_page(params.skip, params.limit, query.max_limit)?;
        let filter = build_filter(filter);
        Ok(Self {
            rows: compose(&query.projection, &filter, &order, &page),
            count: compose_count(&query.projection, &filter),
            skip: page.skip,
            limit: page.limit,
        })
    }

    /// Run on an open unit of work, so callers can load related rows from the same
    /// snapshot.
    ///
    /// The total comes from the window column on the page rows; an empty page past the
    /// first falls back to the count query over the same filter.
    pub(crate) async fn fetch<T: FromRow>(
        &self,
        uow: &UnitOfWork<Active>,
    ) -> Result<Page<T>, CatalogError> {
        let rs = uow.fetch(&self.rows).await?;
        let total = match rs.first() {
            Some(row) => row.int(TOTAL_COUNT_COLUMN)?,
            None if self.skip > 0 => match uow.fetch(&self.count).await?.first() {
                Some(row) => row.int(TOTAL_COUNT_COLUMN)?,
                None => 0,
            },
            None => 0,
        };
        Ok(Page {
            items: rs.map_rows()?,
            total,
            skip: self.skip,
            limit: self.limit,
        })
    }
}

/// Run one page of a list query inside a read transaction.
///
/// Sort and page are validated first, so a bad request never takes a connection.
pub(crate) async fn list_page<T>(
    pool: &ConnectionPool,
    query: &ListQuery,
    filter: &FilterSpec,
    params: &ListParams,
) -> Result<Page<T>, CatalogError>
where
    T: FromRow + Send + 'static,
{
    let page = PageQuery::build(query, filter, params)?;
    let uow = UnitOfWork::read(pool).await?;
    let fetched = page.fetch(&uow).await;
    uow.finish(fetched).await
}

/// Fetch at most one mapped row.
pub(crate) async fn fetch_one<T: FromRow>(
    uow: &UnitOfWork<Active>,
    sql: &str,
    args: &[crate::types::SqlValue],
) -> Result<Option<T>, CatalogError> {
    uow.query(sql, args).await?.map_first()
}

/// Whether any row matches `sql` (expected to `SELECT 1 ... LIMIT 1`).
pub(crate) async fn exists(
    uow: &UnitOfWork<Active>,
    sql: &str,
    args: &[crate::types::SqlValue],
) -> Result<bool, CatalogError> {
    Ok(!uow.query(sql, args).await?.is_empty())
}

/// Replace the driver's constraint text with a client-facing message.
pub(crate) fn rename_unique(err: CatalogError, messages: &[(&str, &str)]) -> CatalogError {
    if let CatalogError::UniqueConstraintViolation(detail) = &err
        && let Some((_, message)) = messages.iter().find(|(column, _)| detail.contains(column))
    {
        return CatalogError::UniqueConstraintViolation((*message).to_string());
    }
    err
}

/// Log the end of a repository operation at a level matching its outcome.
pub(crate) fn observe<T>(
    resource: &'static str,
    op: &'static str,
    result: Result<T, CatalogError>,
) -> Result<T, CatalogError> {
    match &result {
        Ok(_) => tracing::debug!(resource, op, "completed"),
        Err(err) if err.status_code() < 500 => {
            tracing::warn!(resource, op, error = %err, "rejected");
        }
        Err(err) => tracing::error!(resource, op, error = %err, "failed"),
    }
    result
}
