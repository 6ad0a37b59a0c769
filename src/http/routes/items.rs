use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::Router;
use serde::Deserialize;

use super::users::import_response;
use super::{ApiResult, BulkQuery, list_params, read_upload, respond};
use crate::bulk::{ImportReport, InsertMode, items_to_xlsx};
use crate::envelope::ApiResponse;
use crate::error::CatalogError;
use crate::http::error::ApiError;
use crate::http::extractors::{ValidJson, ValidPath, ValidQuery};
use crate::http::server::AppState;
use crate::model::{Item, ItemChanges, ItemImage, NewItem, Page};
use crate::repository::{ItemDeletion, ItemFilter, ResourceRepository};
use crate::services::FileCategory;

const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[derive(Debug, Default, Deserialize)]
pub struct ItemListQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    pub sort_by: Option<String>,
    pub sort_direction: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}

impl ItemListQuery {
    fn filter(&self) -> ItemFilter {
        ItemFilter {
            name: self.name.clone(),
            description: self.description.clone(),
            min_price: self.min_price,
            max_price: self.max_price,
        }
    }
}

/// POST /items
async fn create_item(
    State(state): State<Arc<AppState>>,
    ValidJson(payload): ValidJson<NewItem>,
) -> ApiResult<Item> {
    let item = state.items.create(payload).await?;
    Ok(respond(ApiResponse::created(item, "Item created successfully")))
}

/// GET /items
async fn list_items(
    State(state): State<Arc<AppState>>,
    ValidQuery(query): ValidQuery<ItemListQuery>,
) -> ApiResult<Page<Item>> {
    let filter = query.filter();
    let params = list_params(
        query.skip,
        query.limit,
        query.sort_by,
        query.sort_direction.as_deref(),
    )?;
    let page = state.items.list(&filter, &params).await?;
    Ok(respond(ApiResponse::ok(page, "Items retrieved successfully")))
}

/// GET /items/{id}
async fn get_item(
    State(state): State<Arc<AppState>>,
    ValidPath(id): ValidPath<i64>,
) -> ApiResult<Item> {
    let item = state.items.get_by_id(id).await?;
    Ok(respond(ApiResponse::ok(item, "Item retrieved successfully")))
}

/// PUT /items/{id}
async fn update_item(
    State(state): State<Arc<AppState>>,
    ValidPath(id): ValidPath<i64>,
    ValidJson(changes): ValidJson<ItemChanges>,
) -> ApiResult<Item> {
    let item = state.items.update(id, changes).await?;
    Ok(respond(ApiResponse::ok(item, "Item updated successfully")))
}

/// DELETE /items/{id}
async fn delete_item(
    State(state): State<Arc<AppState>>,
    ValidPath(id): ValidPath<i64>,
) -> ApiResult<ItemDeletion> {
    let deletion = state.items.delete(id).await?;
    let message = if deletion.file_errors.is_empty() {
        "Item deleted successfully".to_string()
    } else {
        format!(
            "Item deleted; {} stored file(s) could not be removed",
            deletion.file_errors.len()
        )
    };
    Ok(respond(ApiResponse::ok(deletion, message)))
}

/// POST /items/bulk-upload
async fn bulk_upload_items(
    State(state): State<Arc<AppState>>,
    ValidQuery(bulk): ValidQuery<BulkQuery>,
    form: Multipart,
) -> ApiResult<ImportReport> {
    let upload = read_upload(form, "file").await?;
    let report = state
        .importer
        .import(
            &state.item_rows,
            &upload.filename,
            upload.content,
            InsertMode::from_flag(bulk.all_or_nothing),
        )
        .await?;
    Ok(respond(import_response(report)))
}

/// GET /items/download-excel
async fn download_items(
    State(state): State<Arc<AppState>>,
    ValidQuery(query): ValidQuery<ItemListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = query.filter();
    let params = list_params(None, None, query.sort_by, query.sort_direction.as_deref())?;
    let items = state
        .items
        .export(&filter, &params.sort_by, params.direction)
        .await?;
    let bytes = tokio::task::spawn_blocking(move || items_to_xlsx(&items))
        .await
        .map_err(|e| CatalogError::ExecutionError(format!("export task failed: {e}")))??;
    let filename = format!(
        "items_{}.xlsx",
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    );
    Ok((
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        bytes,
    ))
}

/// POST /items/{id}/images
async fn upload_image(
    State(state): State<Arc<AppState>>,
    ValidPath(id): ValidPath<i64>,
    form: Multipart,
) -> ApiResult<ItemImage> {
    let upload = read_upload(form, "file").await?;
    if FileCategory::classify(&upload.filename, upload.content_type.as_deref())
        != FileCategory::Images
    {
        return Err(CatalogError::Validation(format!(
            "'{}' is not an image",
            upload.filename
        ))
        .into());
    }
    let image = state
        .items
        .attach_image(id, &upload.content, &upload.filename)
        .await?;
    Ok(respond(ApiResponse::created(image, "Image uploaded successfully")))
}

/// GET /items/{id}/images
async fn list_images(
    State(state): State<Arc<AppState>>,
    ValidPath(id): ValidPath<i64>,
) -> ApiResult<Vec<ItemImage>> {
    let images = state.items.list_images(id).await?;
    Ok(respond(ApiResponse::ok(images, "Images retrieved successfully")))
}

/// DELETE /items/{id}/images/{image_id}
async fn delete_image(
    State(state): State<Arc<AppState>>,
    ValidPath((id, image_id)): ValidPath<(i64, i64)>,
) -> ApiResult<ItemImage> {
    let image = state.items.detach_image(id, image_id).await?;
    Ok(respond(ApiResponse::ok(image, "Image deleted successfully")))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/items", get(list_items).post(create_item))
        .route("/items/bulk-upload", post(bulk_upload_items))
        .route("/items/download-excel", get(download_items))
        .route(
            "/items/{id}",
            get(get_item).put(update_item).delete(delete_item),
        )
        .route("/items/{id}/images", get(list_images).post(upload_image))
        .route("/items/{id}/images/{image_id}", delete(delete_image))
}
