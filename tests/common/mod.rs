#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use catalog_service::http::{AppState, Limits};
use catalog_service::prelude::*;
use catalog_service::schema;
use tempfile::TempDir;

/// A migrated database in its own temp directory, plus an upload root next to it.
pub struct TestEnv {
    pub dir: TempDir,
    pub pool: ConnectionPool,
}

impl TestEnv {
    pub async fn new() -> Result<Self, Box<dyn std::error::Error>> {
        Self::with_pool(|opts| opts).await
    }

    pub async fn with_pool(
        tweak: impl FnOnce(PoolOptions) -> PoolOptions,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let db_path = dir.path().join("catalog.db");
        let options = PoolOptions::builder(db_path.to_string_lossy().into_owned())
            .max_size(4)
            .acquire_timeout(Duration::from_secs(2))
            .finish();
        let pool = ConnectionPool::connect(tweak(options)).await?;
        schema::migrate(&pool).await?;
        Ok(Self { dir, pool })
    }

    pub fn hasher(&self) -> Arc<dyn PasswordHasher> {
        // Minimum bcrypt cost keeps the suite fast.
        Arc::new(BcryptHasher::new(4))
    }

    pub fn files(&self) -> Arc<LocalFileStore> {
        Arc::new(LocalFileStore::new(self.dir.path().join("uploads")))
    }

    pub fn users(&self) -> UserRepository {
        UserRepository::new(self.pool.clone(), self.hasher(), 100)
    }

    pub fn items(&self) -> ItemRepository {
        ItemRepository::new(self.pool.clone(), self.files(), 100, 10_000)
    }

    pub fn reviews(&self) -> ReviewRepository {
        ReviewRepository::new(self.pool.clone(), 100)
    }

    pub fn state(&self) -> AppState {
        AppState::new(self.pool.clone(), self.hasher(), self.files(), Limits::default())
    }

    pub async fn count(&self, table: &str) -> Result<i64, CatalogError> {
        let uow = UnitOfWork::read(&self.pool).await?;
        let rs = uow
            .query(&format!("SELECT COUNT(*) AS cnt FROM {table}"), &[])
            .await;
        let rs = uow.finish(rs).await?;
        rs.first()
            .ok_or_else(|| CatalogError::ExecutionError("no count row".into()))?
            .int("cnt")
    }
}

pub fn new_user(n: usize) -> NewUser {
    NewUser {
        username: format!("user{n}"),
        email: format!("user{n}@example.com"),
        password: "correct horse".to_string(),
        is_active: true,
    }
}

pub fn new_item(name: &str, price: f64) -> NewItem {
    NewItem {
        name: name.to_string(),
        description: Some(format!("{name} description")),
        price,
        tax: None,
    }
}

/// An `.xlsx` workbook: one header row then one row per entry of `rows`.
/// Cells parsing as numbers are written as numbers, blanks are left empty.
pub fn workbook(headers: &[&str], rows: &[Vec<&str>]) -> Vec<u8> {
    let mut book = rust_xlsxwriter::Workbook::new();
    let sheet = book.add_worksheet();
    for (col, header) in (0u16..).zip(headers) {
        sheet.write_string(0, col, *header).unwrap();
    }
    for (row, values) in (1u32..).zip(rows) {
        for (col, value) in (0u16..).zip(values) {
            if value.is_empty() {
                continue;
            }
            match value.parse::<f64>() {
                Ok(number) => sheet.write_number(row, col, number).unwrap(),
                Err(_) => sheet.write_string(row, col, *value).unwrap(),
            };
        }
    }
    book.save_to_buffer().unwrap()
}
