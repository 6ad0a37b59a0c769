mod common;

use catalog_service::prelude::*;
use common::{TestEnv, new_item};

#[tokio::test(flavor = "multi_thread")]
async fn update_preserves_unspecified_fields() -> Result<(), Box<dyn std::error::Error>> {
    let env = TestEnv::new().await?;
    let items = env.items();
    let item = items.create(new_item("X", 100.0)).await?;

    let updated = items
        .update(
            item.id,
            ItemChanges {
                price: Some(500.0),
                ..ItemChanges::default()
            },
        )
        .await?;
    assert_eq!(updated.name, "X");
    assert_eq!(updated.price, 500.0);
    assert_eq!(updated.description, item.description);
    assert_eq!(updated.tax, item.tax);
    assert_eq!(updated.created_at, item.created_at);
    assert_eq!(items.get_by_id(item.id).await?, updated);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn names_are_unique() -> Result<(), Box<dyn std::error::Error>> {
    let env = TestEnv::new().await?;
    let items = env.items();
    items.create(new_item("Mug", 4.0)).await?;
    let other = items.create(new_item("Plate", 6.0)).await?;

    match items.create(new_item("Mug", 9.0)).await {
        Err(CatalogError::UniqueConstraintViolation(msg)) => {
            assert_eq!(msg, "Item name already exists");
        }
        other => panic!("expected duplicate, got {other:?}"),
    }
    let rename = items
        .update(
            other.id,
            ItemChanges {
                name: Some("Mug".into()),
                ..ItemChanges::default()
            },
        )
        .await;
    assert!(matches!(rename, Err(CatalogError::UniqueConstraintViolation(_))));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn list_pages_stay_within_total() -> Result<(), Box<dyn std::error::Error>> {
    let env = TestEnv::new().await?;
    let items = env.items();
    for n in 0..12 {
        items.create(new_item(&format!("item {n:02}"), f64::from(n))).await?;
    }

    let filter = ItemFilter {
        min_price: Some(2.0),
        max_price: Some(9.0),
        ..ItemFilter::default()
    };
    for skip in [0, 3, 6, 7] {
        let params = ListParams {
            skip,
            limit: 3,
            sort_by: "price".into(),
            direction: SortDirection::Asc,
        };
        let page = items.list(&filter, &params).await?;
        assert_eq!(page.total, 8);
        assert!(page.items.len() <= 3);
        assert!(skip + i64::try_from(page.items.len())? <= page.total);
        if let Some(first) = page.items.first() {
            assert_eq!(first.price, 2.0 + f64::from(u32::try_from(skip)?));
        }
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn images_attach_list_and_detach() -> Result<(), Box<dyn std::error::Error>> {
    let env = TestEnv::new().await?;
    let items = env.items();
    let item = items.create(new_item("Lamp", 20.0)).await?;

    let first = items.attach_image(item.id, b"first-png", "front.PNG").await?;
    let second = items.attach_image(item.id, b"second", "side.jpg").await?;
    assert_eq!(first.file_extension, ".png");
    assert_eq!(first.file_size, 9);
    assert!(first.stored_file().full_path().exists());

    let images = items.list_images(item.id).await?;
    let ids: Vec<i64> = images.iter().map(|i| i.id).collect();
    assert_eq!(ids, [second.id, first.id], "newest first");

    let fetched = items.get_by_id(item.id).await?;
    assert_eq!(fetched.images.len(), 2);
    let listed = items.list(&ItemFilter::default(), &ListParams::default()).await?;
    assert_eq!(listed.items[0].images.len(), 2);

    let removed = items.detach_image(item.id, first.id).await?;
    assert!(!removed.stored_file().full_path().exists());
    assert_eq!(items.list_images(item.id).await?.len(), 1);

    // An image is only reachable through the item it belongs to.
    let other = items.create(new_item("Shade", 5.0)).await?;
    assert!(items.detach_image(other.id, second.id).await.unwrap_err().is_not_found());
    assert!(items.attach_image(9_999, b"x", "x.png").await.unwrap_err().is_not_found());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn delete_removes_rows_then_files() -> Result<(), Box<dyn std::error::Error>> {
    let env = TestEnv::new().await?;
    let items = env.items();
    let item = items.create(new_item("Vase", 14.0)).await?;
    let kept = items.attach_image(item.id, b"a", "a.png").await?;
    let lost = items.attach_image(item.id, b"b", "b.png").await?;

    // A file already gone is not an error; the deletion still completes.
    std::fs::remove_file(lost.stored_file().full_path())?;

    let deletion = items.delete(item.id).await?;
    assert_eq!(deletion.item_id, item.id);
    assert_eq!(deletion.removed_images, 2);
    assert!(deletion.file_errors.is_empty());
    assert!(!kept.stored_file().full_path().exists());
    assert_eq!(env.count("item_images").await?, 0);
    assert_eq!(env.count("items").await?, 0);

    for _ in 0..2 {
        assert!(items.delete(item.id).await.unwrap_err().is_not_found());
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn export_respects_filter_and_order() -> Result<(), Box<dyn std::error::Error>> {
    let env = TestEnv::new().await?;
    let items = env.items();
    for (name, price) in [("b", 2.0), ("a", 1.0), ("c", 3.0)] {
        items.create(new_item(name, price)).await?;
    }

    let filter = ItemFilter {
        min_price: Some(1.5),
        ..ItemFilter::default()
    };
    let exported = items.export(&filter, "name", SortDirection::Desc).await?;
    let names: Vec<&str> = exported.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, ["c", "b"]);

    assert!(matches!(
        items.export(&filter, "nope", SortDirection::Asc).await,
        Err(CatalogError::InvalidSortField(_))
    ));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn list_loads_images_with_the_page_on_one_connection() -> Result<(), Box<dyn std::error::Error>> {
    let env = TestEnv::with_pool(|opts| PoolOptions {
        max_size: 1,
        ..opts
    })
    .await?;
    let items = env.items();
    let lamp = items.create(new_item("Lamp", 20.0)).await?;
    let rug = items.create(new_item("Rug", 60.0)).await?;
    items.create(new_item("Bare", 5.0)).await?;
    items.attach_image(lamp.id, b"a", "a.png").await?;
    items.attach_image(rug.id, b"b", "b.png").await?;
    items.attach_image(rug.id, b"c", "c.png").await?;

    let params = ListParams {
        sort_by: "name".into(),
        direction: SortDirection::Asc,
        ..ListParams::default()
    };
    let page = items.list(&ItemFilter::default(), &params).await?;
    let counts: Vec<(&str, usize)> = page
        .items
        .iter()
        .map(|item| (item.name.as_str(), item.images.len()))
        .collect();
    assert_eq!(counts, [("Bare", 0), ("Lamp", 1), ("Rug", 2)]);
    assert!(page.items[2].images.iter().all(|image| image.item_id == rug.id));
    assert_eq!(env.pool.status().in_use, 0);

    // past the last row the total still comes back
    let beyond = ListParams {
        skip: 10,
        ..params
    };
    let empty = items.list(&ItemFilter::default(), &beyond).await?;
    assert!(empty.items.is_empty());
    assert_eq!(empty.total, 3);
    Ok(())
}
