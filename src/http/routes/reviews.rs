use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;

use super::{ApiResult, list_params, respond};
use crate::envelope::ApiResponse;
use crate::http::extractors::{ValidJson, ValidPath, ValidQuery};
use crate::http::server::AppState;
use crate::model::{NewReview, Page, Review, ReviewChanges};
use crate::repository::{ResourceRepository, ReviewFilter};

#[derive(Debug, Default, Deserialize)]
pub struct ReviewListQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    pub sort_by: Option<String>,
    pub sort_direction: Option<String>,
    pub item_id: Option<i64>,
    pub usr_id: Option<i64>,
    pub score: Option<i64>,
    pub min_score: Option<i64>,
    pub max_score: Option<i64>,
    pub content: Option<String>,
}

/// POST /reviews
async fn create_review(
    State(state): State<Arc<AppState>>,
    ValidJson(payload): ValidJson<NewReview>,
) -> ApiResult<Review> {
    let review = state.reviews.create(payload).await?;
    Ok(respond(ApiResponse::created(review, "Review created successfully")))
}

/// GET /reviews
async fn list_reviews(
    State(state): State<Arc<AppState>>,
    ValidQuery(query): ValidQuery<ReviewListQuery>,
) -> ApiResult<Page<Review>> {
    let params = list_params(
        query.skip,
        query.limit,
        query.sort_by,
        query.sort_direction.as_deref(),
    )?;
    let filter = ReviewFilter {
        item_id: query.item_id,
        usr_id: query.usr_id,
        score: query.score,
        min_score: query.min_score,
        max_score: query.max_score,
        content: query.content,
    };
    let page = state.reviews.list(&filter, &params).await?;
    Ok(respond(ApiResponse::ok(page, "Reviews retrieved successfully")))
}

/// GET /reviews/{id}
async fn get_review(
    State(state): State<Arc<AppState>>,
    ValidPath(id): ValidPath<i64>,
) -> ApiResult<Review> {
    let review = state.reviews.get_by_id(id).await?;
    Ok(respond(ApiResponse::ok(review, "Review retrieved successfully")))
}

/// PUT /reviews/{id}
async fn update_review(
    State(state): State<Arc<AppState>>,
    ValidPath(id): ValidPath<i64>,
    ValidJson(changes): ValidJson<ReviewChanges>,
) -> ApiResult<Review> {
    let review = state.reviews.update(id, changes).await?;
    Ok(respond(ApiResponse::ok(review, "Review updated successfully")))
}

/// DELETE /reviews/{id}
async fn delete_review(
    State(state): State<Arc<AppState>>,
    ValidPath(id): ValidPath<i64>,
) -> ApiResult<()> {
    state.reviews.delete(id).await?;
    Ok(respond(ApiResponse::empty(200, "Review deleted successfully")))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/reviews", get(list_reviews).post(create_review))
        .route(
            "/reviews/{id}",
            get(get_review).put(update_review).delete(delete_review),
        )
}
