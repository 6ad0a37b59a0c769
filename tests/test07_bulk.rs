mod common;

use async_trait::async_trait;
use catalog_service::bulk::{BulkTarget, RawRow};
use catalog_service::prelude::*;
use common::{TestEnv, new_item, workbook};

const ITEM_HEADERS: &[&str] = &["name", "description", "price", "tax"];

fn five_items_third_negative() -> Vec<u8> {
    workbook(
        ITEM_HEADERS,
        &[
            vec!["Lamp", "desk lamp", "20", ""],
            vec!["Chair", "", "45.5", "4"],
            vec!["Broken", "bad price", "-3", ""],
            vec!["Table", "oak", "120", ""],
            vec!["Rug", "wool", "60", "6"],
        ],
    )
}

#[tokio::test(flavor = "multi_thread")]
async fn best_effort_keeps_the_good_rows() -> Result<(), Box<dyn std::error::Error>> {
    let env = TestEnv::new().await?;
    let importer = BulkImporter::new(env.pool.clone(), 500);

    let report = importer
        .import(
            &ItemRows,
            "items.xlsx",
            five_items_third_negative(),
            InsertMode::BestEffort,
        )
        .await?;

    assert_eq!(report.status, ImportStatus::PartialSuccess);
    assert_eq!(report.total_rows, 5);
    assert_eq!(report.success_count, 4);
    assert_eq!(report.error_count, 1);
    assert_eq!(report.validation_errors.len(), 1);
    // header is sheet row 1, so the third data row is sheet row 4
    assert_eq!(report.validation_errors[0].row, 4);
    assert!(report.validation_errors[0].error.contains("price"));
    assert_eq!(env.count("items").await?, 4);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn all_or_nothing_persists_nothing_on_one_bad_row() -> Result<(), Box<dyn std::error::Error>> {
    let env = TestEnv::new().await?;
    let importer = BulkImporter::new(env.pool.clone(), 500);

    let report = importer
        .import(
            &ItemRows,
            "items.xlsx",
            five_items_third_negative(),
            InsertMode::AllOrNothing,
        )
        .await?;

    assert_eq!(report.status, ImportStatus::Error);
    assert_eq!(report.success_count, 0);
    assert_eq!(report.error_count, 1);
    assert_eq!(report.insert_mode, InsertMode::AllOrNothing);
    assert_eq!(env.count("items").await?, 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn all_or_nothing_rolls_back_on_a_store_conflict() -> Result<(), Box<dyn std::error::Error>> {
    let env = TestEnv::new().await?;
    env.items().create(new_item("Table", 10.0)).await?;
    let importer = BulkImporter::new(env.pool.clone(), 2);

    let content = workbook(
        ITEM_HEADERS,
        &[
            vec!["Lamp", "", "20", ""],
            vec!["Chair", "", "45", ""],
            vec!["Table", "", "120", ""],
        ],
    );
    let report = importer
        .import(&ItemRows, "items.xlsx", content, InsertMode::AllOrNothing)
        .await?;

    assert_eq!(report.status, ImportStatus::Error);
    assert_eq!(report.success_count, 0);
    assert_eq!(report.failed_items.len(), 1);
    assert!(report.failed_items[0].error.contains("nothing imported"));
    // only the pre-existing row survives
    assert_eq!(env.count("items").await?, 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn duplicates_fail_alone_in_best_effort() -> Result<(), Box<dyn std::error::Error>> {
    let env = TestEnv::new().await?;
    env.items().create(new_item("Chair", 10.0)).await?;
    // small batches so the rows span several transactions
    let importer = BulkImporter::new(env.pool.clone(), 2);

    let content = workbook(
        ITEM_HEADERS,
        &[
            vec!["Lamp", "", "20", ""],
            vec!["Chair", "", "45", ""],
            vec!["Table", "", "120", ""],
            vec!["Lamp", "", "25", ""],
            vec!["Rug", "", "60", ""],
        ],
    );
    let report = importer
        .import(&ItemRows, "items.xlsx", content, InsertMode::BestEffort)
        .await?;

    assert_eq!(report.status, ImportStatus::PartialSuccess);
    assert_eq!(report.processed_count, 5);
    assert_eq!(report.success_count, 3);
    let failed: Vec<(usize, &str)> = report
        .failed_items
        .iter()
        .map(|f| (f.row, f.key.as_str()))
        .collect();
    assert_eq!(failed, [(3, "Chair"), (5, "Lamp")]);
    assert_eq!(env.count("items").await?, 4);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn file_level_problems_are_errors() -> Result<(), Box<dyn std::error::Error>> {
    let env = TestEnv::new().await?;
    let importer = BulkImporter::new(env.pool.clone(), 500);

    let csv = b"name,price\nLamp,20\n".to_vec();
    assert!(matches!(
        importer
            .import(&ItemRows, "items.csv", csv, InsertMode::BestEffort)
            .await,
        Err(CatalogError::UnsupportedFormat(_))
    ));

    let garbage = b"not a workbook".to_vec();
    assert!(matches!(
        importer
            .import(&ItemRows, "items.xlsx", garbage, InsertMode::BestEffort)
            .await,
        Err(CatalogError::UnsupportedFormat(_))
    ));

    let no_price = workbook(&["name", "description"], &[vec!["Lamp", "desk"]]);
    match importer
        .import(&ItemRows, "items.xlsx", no_price, InsertMode::BestEffort)
        .await
    {
        Err(CatalogError::MissingColumns(cols)) => assert_eq!(cols, ["price"]),
        other => panic!("expected missing columns, got {other:?}"),
    }

    let header_only = workbook(ITEM_HEADERS, &[]);
    assert!(matches!(
        importer
            .import(&ItemRows, "items.xlsx", header_only, InsertMode::BestEffort)
            .await,
        Err(CatalogError::EmptyInput)
    ));
    assert_eq!(env.count("items").await?, 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn users_are_imported_with_hashed_passwords() -> Result<(), Box<dyn std::error::Error>> {
    let env = TestEnv::new().await?;
    let importer = BulkImporter::new(env.pool.clone(), 500);
    let rows = UserRows::new(env.hasher());

    let content = workbook(
        &["Username", "Email", "Password"],
        &[
            vec!["ann", "ann@example.com", "long enough pw"],
            vec!["bob", "not-an-email", "long enough pw"],
            vec!["cat", "cat@example.com", "long enough pw"],
        ],
    );
    let report = importer
        .import(&rows, "people.xlsx", content, InsertMode::BestEffort)
        .await?;

    assert_eq!(report.success_count, 2);
    assert_eq!(report.validation_errors.len(), 1);
    assert_eq!(report.validation_errors[0].row, 3);

    let users = env.users();
    let ann = users.login("ann@example.com", "long enough pw").await?;
    assert_eq!(ann.username, "ann");
    assert!(ann.is_active);
    Ok(())
}

/// Item rows that close the pool once `last` has been written.
struct ClosePoolAfter {
    pool: ConnectionPool,
    last: &'static str,
}

#[async_trait]
impl BulkTarget for ClosePoolAfter {
    type Valid = NewItem;
    type Prepared = NewItem;

    const REQUIRED: &'static [&'static str] = ItemRows::REQUIRED;
    const RESOURCE: &'static str = "items";

    fn validate(&self, row: &RawRow) -> Result<NewItem, CatalogError> {
        ItemRows.validate(row)
    }

    fn key(row: &NewItem) -> String {
        ItemRows::key(row)
    }

    async fn prepare(&self, row: NewItem) -> Result<NewItem, CatalogError> {
        Ok(row)
    }

    async fn insert_one(&self, uow: &UnitOfWork<Active>, row: &NewItem) -> Result<(), CatalogError> {
        ItemRows.insert_one(uow, row).await?;
        if row.name == self.last {
            self.pool.shutdown();
        }
        Ok(())
    }

    async fn insert_chunk(
        &self,
        uow: &UnitOfWork<Active>,
        rows: &[&NewItem],
    ) -> Result<usize, CatalogError> {
        ItemRows.insert_chunk(uow, rows).await
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn losing_the_pool_mid_import_still_reports() -> Result<(), Box<dyn std::error::Error>> {
    let env = TestEnv::new().await?;
    let importer = BulkImporter::new(env.pool.clone(), 2);
    let target = ClosePoolAfter {
        pool: env.pool.clone(),
        last: "B",
    };

    let content = workbook(
        &["name", "price"],
        &[vec!["A", "1"], vec!["B", "2"], vec!["C", "3"], vec!["D", "4"]],
    );
    let report = importer
        .import(&target, "items.xlsx", content, InsertMode::BestEffort)
        .await?;

    assert_eq!(report.status, ImportStatus::PartialSuccess);
    assert_eq!(report.success_count, 2);
    assert_eq!(report.error_count, 2);
    let failed: Vec<(usize, &str)> = report
        .failed_items
        .iter()
        .map(|f| (f.row, f.key.as_str()))
        .collect();
    assert_eq!(failed, [(4, "C"), (5, "D")]);

    // the first batch was committed before the pool closed
    let db_path = env.dir.path().join("catalog.db");
    let reopened = PoolOptions::builder(db_path.to_string_lossy().into_owned())
        .connect()
        .await?;
    let uow = UnitOfWork::read(&reopened).await?;
    let rs = uow.query("SELECT COUNT(*) AS cnt FROM items", &[]).await;
    let rs = uow.finish(rs).await?;
    assert_eq!(rs.first().map(|row| row.int("cnt")).transpose()?, Some(2));
    Ok(())
}
