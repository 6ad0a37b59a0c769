use std::collections::BTreeSet;

use crate::error::CatalogError;
use crate::pool::ConnectionPool;
use crate::unit_of_work::{Active, UnitOfWork};

/// Embedded DDL for every catalog table.
pub const SCHEMA_SQL: &str = include_str!("../sql/schema.sql");

const TABLES_SQL: &str =
    "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'";

async fn table_names(uow: &UnitOfWork<Active>) -> Result<BTreeSet<String>, CatalogError> {
    let rs = uow.query(TABLES_SQL, &[]).await?;
    rs.results.iter().map(|row| row.text("name")).collect()
}

/// Apply the schema in one transaction and return the tables it created.
///
/// # Errors
/// Returns the store error; nothing is applied in that case.
pub async fn migrate(pool: &ConnectionPool) -> Result<Vec<String>, CatalogError> {
    let uow = UnitOfWork::write(pool).await?;
    let applied = async {
        let before = table_names(&uow).await?;
        uow.execute_batch(SCHEMA_SQL).await?;
        let after = table_names(&uow).await?;
        Ok::<_, CatalogError>(after.difference(&before).cloned().collect::<Vec<_>>())
    }
    .await;
    let created = uow.finish(applied).await?;
    if created.is_empty() {
        tracing::info!("schema up to date");
    } else {
        tracing::info!(tables = ?created, "created tables");
    }
    Ok(created)
}
