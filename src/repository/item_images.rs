//! Image rows attached to items.
//!
//! These run on a unit of work opened by the item repository, so image rows always change
//! in the same transaction as the item they belong to.

use std::collections::HashMap;

use crate::error::CatalogError;
use crate::model::{ItemImage, NewItemImage};
use crate::query_builder::{QueryPlan, in_list, insert_returning};
use crate::types::SqlValue;
use crate::unit_of_work::{Active, UnitOfWork};

use super::fetch_one;

const IMAGE_COLUMNS: &str = "id, item_id, image_path, image_filename, original_filename, \
     file_extension, file_size, created_at";

/// # Errors
/// `ConstraintViolation` when the item does not exist.
pub async fn insert(uow: &UnitOfWork<Active>, image: NewItemImage) -> Result<ItemImage, CatalogError> {
    let plan = insert_returning(
        "item_images",
        &[
            "item_id",
            "image_path",
            "image_filename",
            "original_filename",
            "file_extension",
            "file_size",
        ],
        vec![
            image.item_id.into(),
            image.stored.path.into(),
            image.stored.filename.into(),
            image.original_filename.into(),
            image.file_extension.into(),
            image.file_size.into(),
        ],
        IMAGE_COLUMNS,
    );
    uow.fetch_optional::<ItemImage>(&plan)
        .await?
        .ok_or_else(|| CatalogError::ExecutionError("insert returned no row".into()))
}

/// Images of one item, newest first.
///
/// # Errors
/// Store errors.
pub async fn list_by_item(
    uow: &UnitOfWork<Active>,
    item_id: i64,
) -> Result<Vec<ItemImage>, CatalogError> {
    let plan = QueryPlan::new(
        format!(
            "SELECT {IMAGE_COLUMNS} FROM item_images WHERE item_id = ? \
             ORDER BY created_at DESC, id DESC"
        ),
        vec![SqlValue::Int(item_id)],
    );
    uow.fetch_all(&plan).await
}

/// Images for a page of items in one query, grouped by item id.
///
/// # Errors
/// Store errors.
pub async fn list_for_items(
    uow: &UnitOfWork<Active>,
    item_ids: &[i64],
) -> Result<HashMap<i64, Vec<ItemImage>>, CatalogError> {
    let mut grouped: HashMap<i64, Vec<ItemImage>> = HashMap::new();
    if item_ids.is_empty() {
        return Ok(grouped);
    }
    let (condition, args) = in_list("item_id", item_ids.iter().copied().map(SqlValue::Int).collect());
    let plan = QueryPlan::new(
        format!(
            "SELECT {IMAGE_COLUMNS} FROM item_images WHERE {condition} \
             ORDER BY created_at DESC, id DESC"
        ),
        args,
    );
    for image in uow.fetch_all::<ItemImage>(&plan).await? {
        grouped.entry(image.item_id).or_default().push(image);
    }
    Ok(grouped)
}

/// One image, only if it belongs to `item_id`.
///
/// # Errors
/// Store errors.
pub async fn get(
    uow: &UnitOfWork<Active>,
    item_id: i64,
    image_id: i64,
) -> Result<Option<ItemImage>, CatalogError> {
    fetch_one(
        uow,
        &format!("SELECT {IMAGE_COLUMNS} FROM item_images WHERE id = ? AND item_id = ?"),
        &[image_id.into(), item_id.into()],
    )
    .await
}

/// # Errors
/// Store errors.
pub async fn delete(uow: &UnitOfWork<Active>, image_id: i64) -> Result<usize, CatalogError> {
    uow.execute("DELETE FROM item_images WHERE id = ?", &[image_id.into()])
        .await
}

/// # Errors
/// Store errors.
pub async fn delete_all_for_item(uow: &UnitOfWork<Active>, item_id: i64) -> Result<usize, CatalogError> {
    uow.execute("DELETE FROM item_images WHERE item_id = ?", &[item_id.into()])
        .await
}
