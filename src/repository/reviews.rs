use async_trait::async_trait;

use crate::error::CatalogError;
use crate::model::{ListParams, NewReview, Page, Review, ReviewChanges};
use crate::pool::ConnectionPool;
use crate::query_builder::{FilterSpec, Projection, SortColumn, insert_returning, update_coalesce};
use crate::unit_of_work::{Active, UnitOfWork};

use super::{ListQuery, ResourceRepository, exists, fetch_one, list_page, observe};

const RESOURCE: &str = "reviews";

const JOINED: Projection = Projection {
    columns: "r.id AS id, r.item_id AS item_id, r.usr_id AS usr_id, \
              r.review_content AS review_content, r.score AS score, \
              r.sentiment AS sentiment, r.confidence AS confidence, \
              r.explanation AS explanation, r.created_at AS created_at, \
              u.username AS username, i.name AS item_name",
    from: "item_review r JOIN users u ON r.usr_id = u.id JOIN items i ON r.item_id = i.id",
};

const SORTABLE: &[SortColumn] = &[
    SortColumn::new("id", "r.id"),
    SortColumn::new("score", "r.score"),
    SortColumn::new("created_at", "r.created_at"),
    SortColumn::new("item_id", "r.item_id"),
    SortColumn::new("usr_id", "r.usr_id"),
];

const ITEM_EXISTS: &str = "SELECT 1 FROM items WHERE id = ? LIMIT 1";
const USER_EXISTS: &str = "SELECT 1 FROM users WHERE id = ? LIMIT 1";

/// Optional list predicates for reviews.
#[derive(Debug, Clone, Default)]
pub struct ReviewFilter {
    pub item_id: Option<i64>,
    pub usr_id: Option<i64>,
    pub score: Option<i64>,
    pub min_score: Option<i64>,
    pub max_score: Option<i64>,
    /// Substring of the review text.
    pub content: Option<String>,
}

impl ReviewFilter {
    fn spec(&self) -> FilterSpec {
        FilterSpec::new()
            .eq("r.item_id", self.item_id)
            .eq("r.usr_id", self.usr_id)
            .eq("r.score", self.score)
            .at_least("r.score", self.min_score)
            .at_most("r.score", self.max_score)
            .contains("r.review_content", self.content.as_deref())
    }
}

#[derive(Debug, Clone)]
pub struct ReviewRepository {
    pool: ConnectionPool,
    max_limit: i64,
}

fn not_found() -> CatalogError {
    CatalogError::NotFound("Review not found".into())
}

async fn fetch_joined(uow: &UnitOfWork<Active>, id: i64) -> Result<Option<Review>, CatalogError> {
    let sql = format!(
        "SELECT {} FROM {} WHERE r.id = ?",
        JOINED.columns, JOINED.from
    );
    fetch_one(uow, &sql, &[id.into()]).await
}

impl ReviewRepository {
    #[must_use]
    pub fn new(pool: ConnectionPool, max_limit: i64) -> Self {
        Self { pool, max_limit }
    }
}

#[async_trait]
impl ResourceRepository for ReviewRepository {
    type Record = Review;
    type Create = NewReview;
    type Changes = ReviewChanges;
    type Filter = ReviewFilter;
    type Deleted = ();

    async fn create(&self, fields: NewReview) -> Result<Review, CatalogError> {
        tracing::debug!(
            resource = RESOURCE,
            item_id = fields.item_id,
            usr_id = fields.usr_id,
            "create"
        );
        let result = async {
            let uow = UnitOfWork::write(&self.pool).await?;
            let inserted = async {
                if !exists(&uow, ITEM_EXISTS, &[fields.item_id.into()]).await? {
                    return Err(CatalogError::NotFound("Item not found".into()));
                }
                if !exists(&uow, USER_EXISTS, &[fields.usr_id.into()]).await? {
                    return Err(CatalogError::NotFound("User not found".into()));
                }
                let plan = insert_returning(
                    "item_review",
                    &[
                        "item_id",
                        "usr_id",
                        "review_content",
                        "score",
                        "sentiment",
                        "confidence",
                        "explanation",
                    ],
                    vec![
                        fields.item_id.into(),
                        fields.usr_id.into(),
                        fields.review_content.as_str().into(),
                        fields.score.into(),
                        fields.sentiment.clone().into(),
                        fields.confidence.into(),
                        fields.explanation.clone().into(),
                    ],
                    "id",
                );
                let rs = uow.fetch(&plan).await?;
                let id = rs
                    .first()
                    .ok_or_else(|| CatalogError::ExecutionError("insert returned no row".into()))?
                    .int("id")?;
                fetch_joined(&uow, id)
                    .await?
                    .ok_or_else(|| CatalogError::ExecutionError("inserted review vanished".into()))
            }
            .await;
            uow.finish(inserted).await
        }
        .await;
        if let Ok(review) = &result {
            tracing::info!(resource = RESOURCE, review_id = review.id, "review created");
        }
        observe(RESOURCE, "create", result)
    }

    async fn get_by_id(&self, id: i64) -> Result<Review, CatalogError> {
        tracing::debug!(resource = RESOURCE, id, "get_by_id");
        let result = async {
            let uow = UnitOfWork::read(&self.pool).await?;
            let found = fetch_joined(&uow, id).await;
            uow.finish(found).await?.ok_or_else(not_found)
        }
        .await;
        observe(RESOURCE, "get_by_id", result)
    }

    async fn list(&self, filter: &ReviewFilter, params: &ListParams) -> Result<Page<Review>, CatalogError> {
        tracing::debug!(resource = RESOURCE, skip = params.skip, limit = params.limit, "list");
        let query = ListQuery {
            projection: JOINED,
            sortable: SORTABLE,
            tiebreaker: "r.id",
            max_limit: self.max_limit,
        };
        let result = list_page(&self.pool, &query, &filter.spec(), params).await;
        observe(RESOURCE, "list", result)
    }

    async fn update(&self, id: i64, changes: ReviewChanges) -> Result<Review, CatalogError> {
        tracing::debug!(resource = RESOURCE, id, "update");
        let result = async {
            let uow = UnitOfWork::write(&self.pool).await?;
            let updated = async {
                let plan = update_coalesce(
                    "item_review",
                    vec![
                        ("review_content", changes.review_content.clone().into()),
                        ("score", changes.score.into()),
                        ("sentiment", changes.sentiment.clone().into()),
                        ("confidence", changes.confidence.into()),
                        ("explanation", changes.explanation.clone().into()),
                    ],
                    "id",
                    id.into(),
                    "id",
                );
                if uow.fetch(&plan).await?.is_empty() {
                    return Err(not_found());
                }
                fetch_joined(&uow, id).await?.ok_or_else(not_found)
            }
            .await;
            uow.finish(updated).await
        }
        .await;
        if result.is_ok() {
            tracing::info!(resource = RESOURCE, id, "review updated");
        }
        observe(RESOURCE, "update", result)
    }

    async fn delete(&self, id: i64) -> Result<(), CatalogError> {
        tracing::debug!(resource = RESOURCE, id, "delete");
        let result = async {
            let uow = UnitOfWork::write(&self.pool).await?;
            let deleted = uow
                .execute("DELETE FROM item_review WHERE id = ?", &[id.into()])
                .await;
            match uow.finish(deleted).await? {
                0 => Err(not_found()),
                _ => Ok(()),
            }
        }
        .await;
        if result.is_ok() {
            tracing::info!(resource = RESOURCE, id, "review deleted");
        }
        observe(RESOURCE, "delete", result)
    }
}
