use async_trait::async_trait;
use validator::Validate;

use crate::error::CatalogError;
use crate::model::{NewItem, validation_message};
use crate::repository::items::{insert_item, insert_items};
use crate::unit_of_work::{Active, UnitOfWork};

use super::{BulkTarget, RawRow};

/// Item rows: `name` and `price` required, `description` and `tax` optional.
#[derive(Debug, Clone, Copy, Default)]
pub struct ItemRows;

fn invalid(row: &RawRow, reason: impl Into<String>) -> CatalogError {
    CatalogError::RowValidation {
        row: row.row_number,
        reason: reason.into(),
    }
}

#[async_trait]
impl BulkTarget for ItemRows {
    type Valid = NewItem;
    type Prepared = NewItem;

    const REQUIRED: &'static [&'static str] = &["name", "price"];
    const RESOURCE: &'static str = "items";

    fn validate(&self, row: &RawRow) -> Result<NewItem, CatalogError> {
        let name = row
            .text("name")
            .ok_or_else(|| invalid(row, "name is required"))?;
        let price = row
            .number("price")
            .map_err(|reason| invalid(row, reason))?
            .ok_or_else(|| invalid(row, "price is required"))?;
        let tax = row.number("tax").map_err(|reason| invalid(row, reason))?;
        let item = NewItem {
            name,
            description: row.text("description"),
            price,
            tax,
        };
        item.validate()
            .map_err(|errors| invalid(row, validation_message(&errors)))?;
        Ok(item)
    }

    fn key(row: &NewItem) -> String {
        row.name.clone()
    }

    async fn prepare(&self, row: NewItem) -> Result<NewItem, CatalogError> {
        Ok(row)
    }

    async fn insert_one(&self, uow: &UnitOfWork<Active>, row: &NewItem) -> Result<(), CatalogError> {
        insert_item(uow, row).await.map(|_| ())
    }

    async fn insert_chunk(
        &self,
        uow: &UnitOfWork<Active>,
        rows: &[&NewItem],
    ) -> Result<usize, CatalogError> {
        insert_items(uow, rows).await
    }
}
