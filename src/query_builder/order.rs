use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

impl FromStr for SortDirection {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            other => Err(CatalogError::InvalidSortField(format!(
                "sort direction must be 'asc' or 'desc', got '{other}'"
            ))),
        }
    }
}

/// A sortable field: the public name clients send and the column expression it maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortColumn {
    pub name: &'static str,
    pub expr: &'static str,
}

impl SortColumn {
    #[must_use]
    pub const fn new(name: &'static str, expr: &'static str) -> Self {
        Self { name, expr }
    }
}

/// A rendered `ORDER BY` clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderClause {
    pub text: String,
}

/// Resolve `sort_by` against the allow-list.
///
/// The primary key is appended as a tiebreaker so pages never overlap when the sort
/// column has duplicates.
///
/// # Errors
/// `InvalidSortField` when `sort_by` is not one of `allowed`.
pub fn build_order(
    sort_by: &str,
    direction: SortDirection,
    allowed: &[SortColumn],
    tiebreaker: &'static str,
) -> Result<OrderClause, CatalogError> {
    let Some(column) = allowed.iter().find(|c| c.name == sort_by) else {
        let names: Vec<&str> = allowed.iter().map(|c| c.name).collect();
        return Err(CatalogError::InvalidSortField(format!(
            "'{sort_by}' is not sortable; allowed: {}",
            names.join(", ")
        )));
    };
    let dir = direction.keyword();
    let text = if column.expr == tiebreaker {
        format!("ORDER BY {} {dir}", column.expr)
    } else {
        format!("ORDER BY {} {dir}, {tiebreaker} {dir}", column.expr)
    };
    Ok(OrderClause { text })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALLOWED: &[SortColumn] = &[
        SortColumn::new("id", "i.id"),
        SortColumn::new("price", "i.price"),
    ];

    #[test]
    fn unknown_columns_are_rejected() {
        let err = build_order("price; DROP TABLE items", SortDirection::Asc, ALLOWED, "i.id")
            .expect_err("must reject");
        assert!(matches!(err, CatalogError::InvalidSortField(_)));
    }

    #[test]
    fn tiebreaker_follows_direction() {
        let order = build_order("price", SortDirection::Desc, ALLOWED, "i.id").expect("order");
        assert_eq!(order.text, "ORDER BY i.price DESC, i.id DESC");
        let order = build_order("id", SortDirection::Asc, ALLOWED, "i.id").expect("order");
        assert_eq!(order.text, "ORDER BY i.id ASC");
    }

    #[test]
    fn direction_parses_case_insensitively() {
        assert_eq!("DESC".parse::<SortDirection>().expect("desc"), SortDirection::Desc);
        assert!("sideways".parse::<SortDirection>().is_err());
    }
}
