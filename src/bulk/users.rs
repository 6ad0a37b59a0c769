use std::sync::Arc;

use async_trait::async_trait;
use validator::Validate;

use crate::error::CatalogError;
use crate::model::{NewUser, validation_message};
use crate::repository::users::insert_user;
use crate::services::PasswordHasher;
use crate::unit_of_work::{Active, UnitOfWork};

use super::{BulkTarget, RawRow};

/// User rows: `username`, `email` and `password`, all required.
#[derive(Debug, Clone)]
pub struct UserRows {
    hasher: Arc<dyn PasswordHasher>,
}

/// A user row with its password already hashed.
#[derive(Debug, Clone)]
pub struct HashedUser {
    pub username: String,
    pub email: String,
    pub hashed_password: String,
}

impl UserRows {
    #[must_use]
    pub fn new(hasher: Arc<dyn PasswordHasher>) -> Self {
        Self { hasher }
    }
}

#[async_trait]
impl BulkTarget for UserRows {
    type Valid = NewUser;
    type Prepared = HashedUser;

    const REQUIRED: &'static [&'static str] = &["username", "email", "password"];
    const RESOURCE: &'static str = "users";

    fn validate(&self, row: &RawRow) -> Result<NewUser, CatalogError> {
        let required = |column: &str| {
            row.text(column).ok_or_else(|| CatalogError::RowValidation {
                row: row.row_number,
                reason: format!("{column} is required"),
            })
        };
        let user = NewUser {
            username: required("username")?,
            email: required("email")?,
            password: required("password")?,
            is_active: true,
        };
        user.validate().map_err(|errors| CatalogError::RowValidation {
            row: row.row_number,
            reason: validation_message(&errors),
        })?;
        Ok(user)
    }

    fn key(row: &NewUser) -> String {
        row.email.clone()
    }

    async fn prepare(&self, row: NewUser) -> Result<HashedUser, CatalogError> {
        let hasher = Arc::clone(&self.hasher);
        let NewUser {
            username,
            email,
            password,
            ..
        } = row;
        let hashed_password = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| CatalogError::ExecutionError(format!("hashing task failed: {e}")))??;
        Ok(HashedUser {
            username,
            email,
            hashed_password,
        })
    }

    async fn insert_one(&self, uow: &UnitOfWork<Active>, row: &HashedUser) -> Result<(), CatalogError> {
        insert_user(uow, &row.username, &row.email, row.hashed_password.clone(), true)
            .await
            .map(|_| ())
    }

    async fn insert_chunk(
        &self,
        uow: &UnitOfWork<Active>,
        rows: &[&HashedUser],
    ) -> Result<usize, CatalogError> {
        for row in rows {
            self.insert_one(uow, row).await?;
        }
        Ok(rows.len())
    }
}
