mod common;

use catalog_service::prelude::*;
use common::TestEnv;

async fn insert_marker(uow: &UnitOfWork<Active>, name: &str) -> Result<usize, CatalogError> {
    uow.execute(
        "INSERT INTO items (name, price) VALUES (?, ?)",
        &[name.into(), 1.0.into()],
    )
    .await
}

async fn fail_after_begin(pool: &ConnectionPool) -> Result<(), CatalogError> {
    let uow = UnitOfWork::write(pool).await?;
    insert_marker(&uow, "never committed").await?;
    Err(CatalogError::ExecutionError("boom".into()))
}

#[tokio::test(flavor = "multi_thread")]
async fn error_after_begin_returns_the_connection() -> Result<(), Box<dyn std::error::Error>> {
    let env = TestEnv::new().await?;
    let before = env.pool.status();

    assert!(fail_after_begin(&env.pool).await.is_err());

    let after = env.pool.status();
    assert_eq!(after.idle, before.idle);
    assert_eq!(after.in_use, 0);
    assert_eq!(env.count("items").await?, 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn commit_and_rollback_report_their_outcome() -> Result<(), Box<dyn std::error::Error>> {
    let env = TestEnv::new().await?;

    let uow = UnitOfWork::write(&env.pool).await?;
    insert_marker(&uow, "kept").await?;
    assert_eq!(uow.commit().await?, TxOutcome::Committed);

    let uow = UnitOfWork::write(&env.pool).await?;
    insert_marker(&uow, "discarded").await?;
    let outcome = uow.rollback().await;
    assert!(!outcome.is_committed());

    assert_eq!(env.count("items").await?, 1);
    assert_eq!(env.pool.status().in_use, 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn finish_commits_ok_and_rolls_back_err() -> Result<(), Box<dyn std::error::Error>> {
    let env = TestEnv::new().await?;

    let uow = UnitOfWork::write(&env.pool).await?;
    let inserted = insert_marker(&uow, "ok").await;
    assert_eq!(uow.finish(inserted).await?, 1);

    let uow = UnitOfWork::write(&env.pool).await?;
    // Duplicate name: the statement fails and the whole scope is rolled back.
    let failed = insert_marker(&uow, "ok").await;
    let err = uow.finish(failed).await.unwrap_err();
    assert!(matches!(err, CatalogError::UniqueConstraintViolation(_)));

    assert_eq!(env.count("items").await?, 1);
    assert_eq!(env.pool.status().in_use, 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn savepoints_undo_only_their_own_work() -> Result<(), Box<dyn std::error::Error>> {
    let env = TestEnv::new().await?;
    let uow = UnitOfWork::write(&env.pool).await?;
    insert_marker(&uow, "outer").await?;

    uow.savepoint("nested").await?;
    insert_marker(&uow, "inner").await?;
    uow.rollback_to("nested").await?;

    uow.savepoint("nested").await?;
    insert_marker(&uow, "inner kept").await?;
    uow.release_savepoint("nested").await?;
    uow.commit().await?;

    assert_eq!(env.count("items").await?, 2);
    Ok(())
}

/// A scope abandoned mid-flight (as when a request future is cancelled) rolls back
/// before its connection is reused.
#[tokio::test(flavor = "multi_thread")]
async fn dropped_scope_rolls_back() -> Result<(), Box<dyn std::error::Error>> {
    let env = TestEnv::with_pool(|opts| PoolOptions {
        max_size: 1,
        ..opts
    })
    .await?;
    {
        let uow = UnitOfWork::write(&env.pool).await?;
        insert_marker(&uow, "abandoned").await?;
    }
    assert_eq!(env.pool.status().in_use, 0);

    // With one connection, the next scope necessarily reuses it.
    let uow = UnitOfWork::write(&env.pool).await?;
    insert_marker(&uow, "fresh").await?;
    uow.commit().await?;
    assert_eq!(env.count("items").await?, 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn idle_scope_releases_without_a_transaction() -> Result<(), Box<dyn std::error::Error>> {
    let env = TestEnv::new().await?;
    let idle = UnitOfWork::<Idle>::from_pool(&env.pool).await?;
    assert_eq!(env.pool.status().in_use, 1);
    idle.release();
    assert_eq!(env.pool.status().in_use, 0);
    Ok(())
}
