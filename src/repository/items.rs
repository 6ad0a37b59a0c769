use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::CatalogError;
use crate::model::{Item, ItemChanges, ItemImage, ListParams, NewItem, NewItemImage, Page};
use crate::pool::ConnectionPool;
use crate::query_builder::{
    FilterSpec, Projection, SortColumn, build_filter, build_order, compose_unpaged, delete_by_key,
    insert_many, insert_returning, update_coalesce,
};
use crate::services::storage::extension_of;
use crate::services::{FileCategory, FileStore};
use crate::types::SqlValue;
use crate::unit_of_work::{Active, UnitOfWork};

use super::{
    ListQuery, PageQuery, ResourceRepository, exists, fetch_one, item_images, observe,
    rename_unique,
};

const RESOURCE: &str = "items";

const ITEM_COLUMNS: &str = "id, name, description, price, tax, created_at";

const LIST: Projection = Projection {
    columns: "i.id AS id, i.name AS name, i.description AS description, \
              i.price AS price, i.tax AS tax, i.created_at AS created_at",
    from: "items i",
};

const SORTABLE: &[SortColumn] = &[
    SortColumn::new("id", "i.id"),
    SortColumn::new("name", "i.name"),
    SortColumn::new("price", "i.price"),
    SortColumn::new("tax", "i.tax"),
    SortColumn::new("created_at", "i.created_at"),
];

const DUPLICATE_MESSAGES: &[(&str, &str)] = &[("items.name", "Item name already exists")];

pub(crate) const INSERT_COLUMNS: &[&str] = &["name", "description", "price", "tax"];

const SELECT_BY_ID: &str =
    "SELECT id, name, description, price, tax, created_at FROM items WHERE id = ?";
const ITEM_EXISTS: &str = "SELECT 1 FROM items WHERE id = ? LIMIT 1";
const NAME_TAKEN: &str = "SELECT 1 FROM items WHERE name = ? AND id <> ? LIMIT 1";

/// Optional list predicates for items.
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    pub name: Option<String>,
    pub description: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}

impl ItemFilter {
    fn spec(&self) -> FilterSpec {
        FilterSpec::new()
            .contains("i.name", self.name.as_deref())
            .contains("i.description", self.description.as_deref())
            .at_least("i.price", self.min_price)
            .at_most("i.price", self.max_price)
    }
}

/// Result of deleting an item.
///
/// Rows are removed in one transaction; stored files are removed afterwards and a
/// failure there is reported here instead of undoing the deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemDeletion {
    pub item_id: i64,
    pub removed_images: usize,
    pub file_errors: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ItemRepository {
    pool: ConnectionPool,
    files: Arc<dyn FileStore>,
    max_limit: i64,
    export_limit: i64,
}

fn not_found() -> CatalogError {
    CatalogError::NotFound("Item not found".into())
}

fn item_args(item: &NewItem) -> Vec<SqlValue> {
    vec![
        item.name.as_str().into(),
        item.description.clone().into(),
        item.price.into(),
        item.tax.into(),
    ]
}

/// Insert one item on an open unit of work.
pub(crate) async fn insert_item(uow: &UnitOfWork<Active>, item: &NewItem) -> Result<Item, CatalogError> {
    let plan = insert_returning("items", INSERT_COLUMNS, item_args(item), ITEM_COLUMNS);
    uow.fetch_optional::<Item>(&plan)
        .await
        .map_err(|err| rename_unique(err, DUPLICATE_MESSAGES))?
        .ok_or_else(|| CatalogError::ExecutionError("insert returned no row".into()))
}

/// Insert many items with one multi-row statement.
pub(crate) async fn insert_items(uow: &UnitOfWork<Active>, items: &[&NewItem]) -> Result<usize, CatalogError> {
    if items.is_empty() {
        return Ok(0);
    }
    let rows: Vec<Vec<SqlValue>> = items.iter().map(|item| item_args(item)).collect();
    uow.run(&insert_many("items", INSERT_COLUMNS, &rows))
        .await
        .map_err(|err| rename_unique(err, DUPLICATE_MESSAGES))
}

async fn ensure_name_free(uow: &UnitOfWork<Active>, name: &str, except_id: i64) -> Result<(), CatalogError> {
    if exists(uow, NAME_TAKEN, &[name.into(), except_id.into()]).await? {
        return Err(CatalogError::UniqueConstraintViolation(
            "Item name already exists".into(),
        ));
    }
    Ok(())
}

async fn ensure_item(uow: &UnitOfWork<Active>, item_id: i64) -> Result<(), CatalogError> {
    if exists(uow, ITEM_EXISTS, &[item_id.into()]).await? {
        Ok(())
    } else {
        Err(not_found())
    }
}

impl ItemRepository {
    #[must_use]
    pub fn new(
        pool: ConnectionPool,
        files: Arc<dyn FileStore>,
        max_limit: i64,
        export_limit: i64,
    ) -> Self {
        Self {
            pool,
            files,
            max_limit,
            export_limit,
        }
    }

    /// Items matching `filter`, in the requested order, capped at the export limit.
    ///
    /// # Errors
    /// `InvalidSortField` before touching the pool; store errors otherwise.
    pub async fn export(
        &self,
        filter: &ItemFilter,
        sort_by: &str,
        direction: crate::query_builder::SortDirection,
    ) -> Result<Vec<Item>, CatalogError> {
        tracing::debug!(resource = RESOURCE, sort_by, "export");
        let result = async {
            let order = build_order(sort_by, direction, SORTABLE, "i.id")?;
            let plan = compose_unpaged(&LIST, &build_filter(&filter.spec()), &order, self.export_limit);
            let uow = UnitOfWork::read(&self.pool).await?;
            let rows = uow.fetch_all::<Item>(&plan).await;
            uow.finish(rows).await
        }
        .await;
        if let Ok(items) = &result {
            tracing::info!(resource = RESOURCE, rows = items.len(), "items exported");
        }
        observe(RESOURCE, "export", result)
    }

    /// Store an uploaded image and attach it to an item.
    ///
    /// The file is written first; if the row cannot be inserted the file is removed again.
    ///
    /// # Errors
    /// `NotFound` for an unknown item, `Storage` on file I/O failure.
    pub async fn attach_image(
        &self,
        item_id: i64,
        content: &[u8],
        original_filename: &str,
    ) -> Result<ItemImage, CatalogError> {
        tracing::debug!(resource = RESOURCE, item_id, original_filename, "attach_image");
        let result = async {
            {
                let uow = UnitOfWork::read(&self.pool).await?;
                let found = ensure_item(&uow, item_id).await;
                uow.finish(found).await?;
            }
            let stored = self
                .files
                .store(content, original_filename, FileCategory::Images)
                .await?;
            let new_image = NewItemImage {
                item_id,
                stored: stored.clone(),
                original_filename: original_filename.to_string(),
                file_extension: extension_of(original_filename),
                file_size: i64::try_from(content.len()).unwrap_or(i64::MAX),
            };
            let inserted = async {
                let uow = UnitOfWork::write(&self.pool).await?;
                let inserted = async {
                    ensure_item(&uow, item_id).await?;
                    item_images::insert(&uow, new_image).await
                }
                .await;
                uow.finish(inserted).await
            }
            .await;
            if inserted.is_err()
                && let Err(err) = self.files.remove(&stored).await
            {
                tracing::warn!(filename = %stored.filename, error = %err, "orphaned upload left on disk");
            }
            inserted
        }
        .await;
        if let Ok(image) = &result {
            tracing::info!(resource = RESOURCE, item_id, image_id = image.id, "image attached");
        }
        observe(RESOURCE, "attach_image", result)
    }

    /// # Errors
    /// `NotFound` for an unknown item.
    pub async fn list_images(&self, item_id: i64) -> Result<Vec<ItemImage>, CatalogError> {
        tracing::debug!(resource = RESOURCE, item_id, "list_images");
        let result = async {
            let uow = UnitOfWork::read(&self.pool).await?;
            let images = async {
                ensure_item(&uow, item_id).await?;
                item_images::list_by_item(&uow, item_id).await
            }
            .await;
            uow.finish(images).await
        }
        .await;
        observe(RESOURCE, "list_images", result)
    }

    /// Remove one image row, then its stored file.
    ///
    /// # Errors
    /// `NotFound` when the image does not belong to the item.
    pub async fn detach_image(&self, item_id: i64, image_id: i64) -> Result<ItemImage, CatalogError> {
        tracing::debug!(resource = RESOURCE, item_id, image_id, "detach_image");
        let result = async {
            let uow = UnitOfWork::write(&self.pool).await?;
            let removed = async {
                let image = item_images::get(&uow, item_id, image_id)
                    .await?
                    .ok_or_else(|| CatalogError::NotFound("Image not found".into()))?;
                item_images::delete(&uow, image.id).await?;
                Ok::<_, CatalogError>(image)
            }
            .await;
            let image = uow.finish(removed).await?;
            if let Err(err) = self.files.remove(&image.stored_file()).await {
                tracing::warn!(image_id, error = %err, "image row removed but file removal failed");
            }
            Ok::<_, CatalogError>(image)
        }
        .await;
        if result.is_ok() {
            tracing::info!(resource = RESOURCE, item_id, image_id, "image detached");
        }
        observe(RESOURCE, "detach_image", result)
    }
}

#[async_trait]
impl ResourceRepository for ItemRepository {
    type Record = Item;
    type Create = NewItem;
    type Changes = ItemChanges;
    type Filter = ItemFilter;
    type Deleted = ItemDeletion;

    async fn create(&self, fields: NewItem) -> Result<Item, CatalogError> {
        tracing::debug!(resource = RESOURCE, name = %fields.name, "create");
        let result = async {
            let uow = UnitOfWork::write(&self.pool).await?;
            let inserted = async {
                ensure_name_free(&uow, &fields.name, 0).await?;
                insert_item(&uow, &fields).await
            }
            .await;
            uow.finish(inserted).await
        }
        .await;
        if let Ok(item) = &result {
            tracing::info!(resource = RESOURCE, item_id = item.id, "item created");
        }
        observe(RESOURCE, "create", result)
    }

    async fn get_by_id(&self, id: i64) -> Result<Item, CatalogError> {
        tracing::debug!(resource = RESOURCE, id, "get_by_id");
        let result = async {
            let uow = UnitOfWork::read(&self.pool).await?;
            let found = async {
                let Some(mut item) = fetch_one::<Item>(&uow, SELECT_BY_ID, &[id.into()]).await? else {
                    return Err(not_found());
                };
                item.images = item_images::list_by_item(&uow, id).await?;
                Ok::<_, CatalogError>(item)
            }
            .await;
            uow.finish(found).await
        }
        .await;
        observe(RESOURCE, "get_by_id", result)
    }

    async fn list(&self, filter: &ItemFilter, params: &ListParams) -> Result<Page<Item>, CatalogError> {
        tracing::debug!(resource = RESOURCE, skip = params.skip, limit = params.limit, "list");
        let query = ListQuery {
            projection: LIST,
            sortable: SORTABLE,
            tiebreaker: "i.id",
            max_limit: self.max_limit,
        };
        let result = async {
            let plan = PageQuery::build(&query, &filter.spec(), params)?;
            let uow = UnitOfWork::read(&self.pool).await?;
            // images come from the same snapshot as the page
            let fetched = async {
                let mut page = plan.fetch::<Item>(&uow).await?;
                let ids: Vec<i64> = page.items.iter().map(|item| item.id).collect();
                let mut images = item_images::list_for_items(&uow, &ids).await?;
                for item in &mut page.items {
                    item.images = images.remove(&item.id).unwrap_or_default();
                }
                Ok::<_, CatalogError>(page)
            }
            .await;
            uow.finish(fetched).await
        }
        .await;
        observe(RESOURCE, "list", result)
    }

    async fn update(&self, id: i64, changes: ItemChanges) -> Result<Item, CatalogError> {
        tracing::debug!(resource = RESOURCE, id, "update");
        let result = async {
            let uow = UnitOfWork::write(&self.pool).await?;
            let updated = async {
                let current = fetch_one::<Item>(&uow, SELECT_BY_ID, &[id.into()])
                    .await?
                    .ok_or_else(not_found)?;
                if let Some(name) = changes.name.as_deref()
                    && name != current.name
                {
                    ensure_name_free(&uow, name, id).await?;
                }
                let plan = update_coalesce(
                    "items",
                    vec![
                        ("name", changes.name.clone().into()),
                        ("description", changes.description.clone().into()),
                        ("price", changes.price.into()),
                        ("tax", changes.tax.into()),
                    ],
                    "id",
                    id.into(),
                    ITEM_COLUMNS,
                );
                let mut item = uow
                    .fetch_optional::<Item>(&plan)
                    .await
                    .map_err(|err| rename_unique(err, DUPLICATE_MESSAGES))?
                    .ok_or_else(not_found)?;
                item.images = item_images::list_by_item(&uow, id).await?;
                Ok(item)
            }
            .await;
            uow.finish(updated).await
        }
        .await;
        if result.is_ok() {
            tracing::info!(resource = RESOURCE, id, "item updated");
        }
        observe(RESOURCE, "update", result)
    }

    /// Delete the item and its image rows in one transaction, then remove stored files.
    async fn delete(&self, id: i64) -> Result<ItemDeletion, CatalogError> {
        tracing::debug!(resource = RESOURCE, id, "delete");
        let result = async {
            let uow = UnitOfWork::write(&self.pool).await?;
            let removed = async {
                ensure_item(&uow, id).await?;
                let images = item_images::list_by_item(&uow, id).await?;
                item_images::delete_all_for_item(&uow, id).await?;
                uow.run(&delete_by_key("items", "id", id.into())).await?;
                Ok::<_, CatalogError>(images)
            }
            .await;
            let images = uow.finish(removed).await?;

            let mut file_errors = Vec::new();
            for image in &images {
                if let Err(err) = self.files.remove(&image.stored_file()).await {
                    tracing::warn!(image_id = image.id, error = %err, "stored image not removed");
                    file_errors.push(format!("{}: {err}", image.image_filename));
                }
            }
            Ok::<_, CatalogError>(ItemDeletion {
                item_id: id,
                removed_images: images.len(),
                file_errors,
            })
        }
        .await;
        if let Ok(deletion) = &result {
            tracing::info!(
                resource = RESOURCE,
                id,
                removed_images = deletion.removed_images,
                file_errors = deletion.file_errors.len(),
                "item deleted"
            );
        }
        observe(RESOURCE, "delete", result)
    }
}
