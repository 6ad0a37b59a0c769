use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CatalogError;
use crate::results::{FromRow, Row};

use super::EMAIL_RE;

/// Public projection of a user. The password hash never leaves the repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

impl FromRow for User {
    fn from_row(row: &Row) -> Result<Self, CatalogError> {
        Ok(Self {
            id: row.int("id")?,
            username: row.text("username")?,
            email: row.text("email")?,
            is_active: row.boolean("is_active")?,
            created_at: row.timestamp("created_at")?,
        })
    }
}

/// A user row together with its stored hash, for credential checks.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub hashed_password: String,
}

impl FromRow for UserCredentials {
    fn from_row(row: &Row) -> Result<Self, CatalogError> {
        Ok(Self {
            user: User::from_row(row)?,
            hashed_password: row.text("hashed_password")?,
        })
    }
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewUser {
    #[validate(length(min = 3, max = 50, message = "username must be 3 to 50 characters"))]
    pub username: String,
    #[validate(regex(path = *EMAIL_RE, message = "invalid email address"))]
    pub email: String,
    #[validate(length(min = 8, max = 100, message = "password must be 8 to 100 characters"))]
    pub password: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

/// Partial update; `None` keeps the stored value.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UserChanges {
    #[validate(length(min = 3, max = 50, message = "username must be 3 to 50 characters"))]
    pub username: Option<String>,
    #[validate(regex(path = *EMAIL_RE, message = "invalid email address"))]
    pub email: Option<String>,
    #[validate(length(min = 8, max = 100, message = "password must be 8 to 100 characters"))]
    pub password: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(regex(path = *EMAIL_RE, message = "invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}
