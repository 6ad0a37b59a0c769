mod common;

use catalog_service::prelude::*;
use common::{TestEnv, new_item, new_user};

fn review(item_id: i64, usr_id: i64, score: i64, content: &str) -> NewReview {
    NewReview {
        item_id,
        usr_id,
        review_content: content.to_string(),
        score,
        sentiment: None,
        confidence: None,
        explanation: None,
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn reviews_carry_joined_names() -> Result<(), Box<dyn std::error::Error>> {
    let env = TestEnv::new().await?;
    let user = env.users().create(new_user(1)).await?;
    let item = env.items().create(new_item("Kettle", 30.0)).await?;
    let reviews = env.reviews();

    let created = reviews
        .create(review(item.id, user.id, 4, "boils fast"))
        .await?;
    assert_eq!(created.username.as_deref(), Some("user1"));
    assert_eq!(created.item_name.as_deref(), Some("Kettle"));
    assert_eq!(reviews.get_by_id(created.id).await?, created);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_references_are_not_found() -> Result<(), Box<dyn std::error::Error>> {
    let env = TestEnv::new().await?;
    let user = env.users().create(new_user(1)).await?;
    let item = env.items().create(new_item("Kettle", 30.0)).await?;
    let reviews = env.reviews();

    match reviews.create(review(9_999, user.id, 3, "?")).await {
        Err(CatalogError::NotFound(msg)) => assert_eq!(msg, "Item not found"),
        other => panic!("expected missing item, got {other:?}"),
    }
    match reviews.create(review(item.id, 9_999, 3, "?")).await {
        Err(CatalogError::NotFound(msg)) => assert_eq!(msg, "User not found"),
        other => panic!("expected missing user, got {other:?}"),
    }
    assert_eq!(env.count("item_review").await?, 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn update_keeps_unsupplied_analysis_fields() -> Result<(), Box<dyn std::error::Error>> {
    let env = TestEnv::new().await?;
    let user = env.users().create(new_user(1)).await?;
    let item = env.items().create(new_item("Kettle", 30.0)).await?;
    let reviews = env.reviews();

    let mut fields = review(item.id, user.id, 2, "leaks");
    fields.sentiment = Some("negative".into());
    fields.confidence = Some(91);
    let created = reviews.create(fields).await?;

    let updated = reviews
        .update(
            created.id,
            ReviewChanges {
                score: Some(3),
                ..ReviewChanges::default()
            },
        )
        .await?;
    assert_eq!(updated.score, 3);
    assert_eq!(updated.review_content, "leaks");
    assert_eq!(updated.sentiment.as_deref(), Some("negative"));
    assert_eq!(updated.confidence, Some(91));

    assert!(reviews
        .update(9_999, ReviewChanges::default())
        .await
        .unwrap_err()
        .is_not_found());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn list_filters_by_score_range_and_content() -> Result<(), Box<dyn std::error::Error>> {
    let env = TestEnv::new().await?;
    let user = env.users().create(new_user(1)).await?;
    let item = env.items().create(new_item("Kettle", 30.0)).await?;
    let other = env.items().create(new_item("Toaster", 25.0)).await?;
    let reviews = env.reviews();
    for (item_id, score, text) in [
        (item.id, 1, "awful"),
        (item.id, 3, "fine"),
        (item.id, 5, "great kettle"),
        (other.id, 4, "great toaster"),
    ] {
        reviews.create(review(item_id, user.id, score, text)).await?;
    }

    let by_range = ReviewFilter {
        min_score: Some(3),
        max_score: Some(4),
        ..ReviewFilter::default()
    };
    let params = ListParams {
        sort_by: "score".into(),
        direction: SortDirection::Asc,
        ..ListParams::default()
    };
    let page = reviews.list(&by_range, &params).await?;
    let scores: Vec<i64> = page.items.iter().map(|r| r.score).collect();
    assert_eq!(scores, [3, 4]);

    let by_item_and_text = ReviewFilter {
        item_id: Some(item.id),
        content: Some("great".into()),
        ..ReviewFilter::default()
    };
    let page = reviews.list(&by_item_and_text, &ListParams::default()).await?;
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].review_content, "great kettle");
    assert_eq!(page.items[0].item_name.as_deref(), Some("Kettle"));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn reviews_cascade_with_their_user() -> Result<(), Box<dyn std::error::Error>> {
    let env = TestEnv::new().await?;
    let user = env.users().create(new_user(1)).await?;
    let item = env.items().create(new_item("Kettle", 30.0)).await?;
    let reviews = env.reviews();
    let created = reviews.create(review(item.id, user.id, 5, "ok")).await?;

    reviews.delete(created.id).await?;
    assert!(reviews.delete(created.id).await.unwrap_err().is_not_found());

    reviews.create(review(item.id, user.id, 5, "again")).await?;
    env.users().delete(user.id).await?;
    assert_eq!(env.count("item_review").await?, 0);
    Ok(())
}
