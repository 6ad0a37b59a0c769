use crate::error::CatalogError;
use crate::types::SqlValue;

/// Validated `LIMIT`/`OFFSET` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageClause {
    pub skip: i64,
    pub limit: i64,
}

impl PageClause {
    #[must_use]
    pub fn text(&self) -> &'static str {
        "LIMIT ? OFFSET ?"
    }

    /// Arguments in placeholder order: limit, then offset.
    #[must_use]
    pub fn args(&self) -> [SqlValue; 2] {
        [SqlValue::Int(self.limit), SqlValue::Int(self.skip)]
    }
}

/// # Errors
/// `InvalidPageSpec` unless `0 <= skip` and `1 <= limit <= max_limit`.
pub fn build_page(skip: i64, limit: i64, max_limit: i64) -> Result<PageClause, CatalogError> {
    if skip < 0 {
        return Err(CatalogError::InvalidPageSpec(format!(
            "skip must be >= 0, got {skip}"
        )));
    }
    if limit < 1 || limit > max_limit {
        return Err(CatalogError::InvalidPageSpec(format!(
            "limit must be between 1 and {max_limit}, got {limit}"
        )));
    }
    Ok(PageClause { skip, limit })
}
