use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CatalogError;
use crate::results::{FromRow, Row};
use crate::services::storage::StoredFile;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemImage {
    pub id: i64,
    pub item_id: i64,
    pub image_path: String,
    pub image_filename: String,
    pub original_filename: String,
    pub file_extension: String,
    pub file_size: i64,
    pub created_at: NaiveDateTime,
}

impl ItemImage {
    /// Location of the stored file, for removal through the file store.
    #[must_use]
    pub fn stored_file(&self) -> StoredFile {
        StoredFile {
            category: "images".to_string(),
            path: self.image_path.clone(),
            filename: self.image_filename.clone(),
        }
    }
}

impl FromRow for ItemImage {
    fn from_row(row: &Row) -> Result<Self, CatalogError> {
        Ok(Self {
            id: row.int("id")?,
            item_id: row.int("item_id")?,
            image_path: row.text("image_path")?,
            image_filename: row.text("image_filename")?,
            original_filename: row.text("original_filename")?,
            file_extension: row.text("file_extension")?,
            file_size: row.int("file_size")?,
            created_at: row.timestamp("created_at")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub tax: Option<f64>,
    pub created_at: NaiveDateTime,
    /// Newest first.
    #[serde(default)]
    pub images: Vec<ItemImage>,
}

impl FromRow for Item {
    fn from_row(row: &Row) -> Result<Self, CatalogError> {
        Ok(Self {
            id: row.int("id")?,
            name: row.text("name")?,
            description: row.opt_text("description")?,
            price: row.float("price")?,
            tax: row.opt_float("tax")?,
            created_at: row.timestamp("created_at")?,
            images: Vec::new(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Validate)]
pub struct NewItem {
    #[validate(length(min = 1, max = 100, message = "name must be 1 to 100 characters"))]
    pub name: String,
    pub description: Option<String>,
    #[validate(range(min = 0.0, message = "price must be non-negative"))]
    pub price: f64,
    #[validate(range(min = 0.0, message = "tax must be non-negative"))]
    pub tax: Option<f64>,
}

/// Partial update; `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Validate)]
pub struct ItemChanges {
    #[validate(length(min = 1, max = 100, message = "name must be 1 to 100 characters"))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 0.0, message = "price must be non-negative"))]
    pub price: Option<f64>,
    #[validate(range(min = 0.0, message = "tax must be non-negative"))]
    pub tax: Option<f64>,
}

/// Metadata for an image that has already been written to the file store.
#[derive(Debug, Clone)]
pub struct NewItemImage {
    pub item_id: i64,
    pub stored: StoredFile,
    pub original_filename: String,
    pub file_extension: String,
    pub file_size: i64,
}
