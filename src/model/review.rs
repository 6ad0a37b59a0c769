use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CatalogError;
use crate::results::{FromRow, Row};

/// A review, joined with its author's username and the item name on reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: i64,
    pub item_id: i64,
    pub usr_id: i64,
    pub review_content: String,
    pub score: i64,
    pub sentiment: Option<String>,
    pub confidence: Option<i64>,
    pub explanation: Option<String>,
    pub created_at: NaiveDateTime,
    pub username: Option<String>,
    pub item_name: Option<String>,
}

impl FromRow for Review {
    fn from_row(row: &Row) -> Result<Self, CatalogError> {
        Ok(Self {
            id: row.int("id")?,
            item_id: row.int("item_id")?,
            usr_id: row.int("usr_id")?,
            review_content: row.text("review_content")?,
            score: row.int("score")?,
            sentiment: row.opt_text("sentiment")?,
            confidence: row.opt_int("confidence")?,
            explanation: row.opt_text("explanation")?,
            created_at: row.timestamp("created_at")?,
            username: row.opt_text("username")?,
            item_name: row.opt_text("item_name")?,
        })
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewReview {
    pub item_id: i64,
    pub usr_id: i64,
    #[validate(length(min = 1, message = "review content is required"))]
    pub review_content: String,
    #[validate(range(min = 1, max = 5, message = "score must be between 1 and 5"))]
    pub score: i64,
    pub sentiment: Option<String>,
    #[validate(range(min = 0, max = 100, message = "confidence must be between 0 and 100"))]
    pub confidence: Option<i64>,
    pub explanation: Option<String>,
}

/// Partial update; `None` keeps the stored value.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ReviewChanges {
    #[validate(length(min = 1, message = "review content must not be empty"))]
    pub review_content: Option<String>,
    #[validate(range(min = 1, max = 5, message = "score must be between 1 and 5"))]
    pub score: Option<i64>,
    pub sentiment: Option<String>,
    #[validate(range(min = 0, max = 100, message = "confidence must be between 0 and 100"))]
    pub confidence: Option<i64>,
    pub explanation: Option<String>,
}
