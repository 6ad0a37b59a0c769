//! Parameterized statement composition.
//!
//! Everything here is pure. Caller values only ever reach a [`QueryPlan`] through its
//! argument list; identifiers (columns, tables, sort expressions) are `&'static str`
//! picked from compile-time allow-lists, so nothing a client sends can alter statement text.
//!
//! Placeholders are anonymous `?`, bound in order. Every composer appends arguments in the
//! same order it writes placeholders, and [`compose`]/[`compose_count`] share one
//! [`FilterClause`] so a page and its total always see the same predicate.

mod dml;
mod filter;
mod order;
mod page;

pub use dml::{delete_by_key, in_list, insert_many, insert_returning, update_coalesce};
pub use filter::{FilterClause, FilterSpec, Predicate, build_filter, escape_like};
pub use order::{OrderClause, SortColumn, SortDirection, build_order};
pub use page::{PageClause, build_page};

use crate::types::SqlValue;

/// Statement text plus its positional arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub sql: String,
    pub args: Vec<SqlValue>,
}

impl QueryPlan {
    #[must_use]
    pub fn new(sql: impl Into<String>, args: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            args,
        }
    }

    /// Number of `?` placeholders in the text.
    #[must_use]
    pub fn placeholder_count(&self) -> usize {
        self.sql.matches('?').count()
    }
}

/// The fixed projection of a list query: its select list and its `FROM` (joins included).
#[derive(Debug, Clone, Copy)]
pub struct Projection {
    pub columns: &'static str,
    pub from: &'static str,
}

/// Name of the window column carrying the filtered total on every page row.
pub const TOTAL_COUNT_COLUMN: &str = "total_count";

fn push_where(sql: &mut String, filter: &FilterClause) {
    if !filter.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&filter.text);
    }
}

/// Assemble one page of a list query.
///
/// Every row carries `COUNT(*) OVER ()` as `total_count`, computed over the same filter
/// before `LIMIT`/`OFFSET` apply.
#[must_use]
pub fn compose(
    select: &Projection,
    filter: &FilterClause,
    order: &OrderClause,
    page: &PageClause,
) -> QueryPlan {
    let mut sql = format!(
        "SELECT {}, COUNT(*) OVER () AS {TOTAL_COUNT_COLUMN} FROM {}",
        select.columns, select.from
    );
    push_where(&mut sql, filter);
    sql.push(' ');
    sql.push_str(&order.text);
    sql.push(' ');
    sql.push_str(page.text());

    let mut args = Vec::with_capacity(filter.args.len() + 2);
    args.extend(filter.args.iter().cloned());
    args.extend(page.args());
    QueryPlan { sql, args }
}

/// Count the rows matching `filter`, for pages that came back empty.
#[must_use]
pub fn compose_count(select: &Projection, filter: &FilterClause) -> QueryPlan {
    let mut sql = format!("SELECT COUNT(*) AS {TOTAL_COUNT_COLUMN} FROM {}", select.from);
    push_where(&mut sql, filter);
    QueryPlan {
        sql,
        args: filter.args.clone(),
    }
}

/// Assemble a non-paginated ordered query, bounded by `limit` (used by exports).
#[must_use]
pub fn compose_unpaged(
    select: &Projection,
    filter: &FilterClause,
    order: &OrderClause,
    limit: i64,
) -> QueryPlan {
    let mut sql = format!("SELECT {} FROM {}", select.columns, select.from);
    push_where(&mut sql, filter);
    sql.push(' ');
    sql.push_str(&order.text);
    sql.push_str(" LIMIT ?");
    let mut args = filter.args.clone();
    args.push(SqlValue::Int(limit));
    QueryPlan { sql, args }
}
