use std::sync::Arc;

use async_trait::async_trait;

use crate::error::CatalogError;
use crate::model::{ListParams, NewUser, Page, User, UserChanges, UserCredentials};
use crate::pool::ConnectionPool;
use crate::query_builder::{
    FilterSpec, Projection, SortColumn, delete_by_key, insert_returning, update_coalesce,
};
use crate::services::PasswordHasher;
use crate::types::SqlValue;
use crate::unit_of_work::{Active, UnitOfWork};

use super::{ListQuery, ResourceRepository, exists, fetch_one, list_page, observe, rename_unique};

const RESOURCE: &str = "users";

const USER_COLUMNS: &str = "id, username, email, is_active, created_at";

const LIST: Projection = Projection {
    columns: "u.id AS id, u.username AS username, u.email AS email, \
              u.is_active AS is_active, u.created_at AS created_at",
    from: "users u",
};

const SORTABLE: &[SortColumn] = &[
    SortColumn::new("id", "u.id"),
    SortColumn::new("username", "u.username"),
    SortColumn::new("email", "u.email"),
    SortColumn::new("is_active", "u.is_active"),
    SortColumn::new("created_at", "u.created_at"),
];

const DUPLICATE_MESSAGES: &[(&str, &str)] = &[
    ("users.email", "Email already registered"),
    ("users.username", "Username already taken"),
];

const SELECT_BY_ID: &str = "SELECT id, username, email, is_active, created_at FROM users WHERE id = ?";
const SELECT_CREDENTIALS_BY_EMAIL: &str = "SELECT id, username, email, is_active, created_at, hashed_password \
     FROM users WHERE email = ?";
const EMAIL_TAKEN: &str = "SELECT 1 FROM users WHERE email = ? AND id <> ? LIMIT 1";
const USERNAME_TAKEN: &str = "SELECT 1 FROM users WHERE username = ? AND id <> ? LIMIT 1";

/// Optional list predicates for users.
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    /// Substring of the username.
    pub username: Option<String>,
    /// Substring of the email.
    pub email: Option<String>,
    pub is_active: Option<bool>,
}

impl UserFilter {
    fn spec(&self) -> FilterSpec {
        FilterSpec::new()
            .contains("u.username", self.username.as_deref())
            .contains("u.email", self.email.as_deref())
            .eq("u.is_active", self.is_active)
    }
}

#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: ConnectionPool,
    hasher: Arc<dyn PasswordHasher>,
    max_limit: i64,
}

fn not_found() -> CatalogError {
    CatalogError::NotFound("User not found".into())
}

/// Reject a username or email already held by a user other than `except_id`.
///
/// Best-effort: the UNIQUE constraints still catch a concurrent insert.
async fn ensure_unique(
    uow: &UnitOfWork<Active>,
    username: Option<&str>,
    email: Option<&str>,
    except_id: i64,
) -> Result<(), CatalogError> {
    if let Some(email) = email
        && exists(uow, EMAIL_TAKEN, &[email.into(), except_id.into()]).await?
    {
        return Err(CatalogError::UniqueConstraintViolation(
            "Email already registered".into(),
        ));
    }
    if let Some(username) = username
        && exists(uow, USERNAME_TAKEN, &[username.into(), except_id.into()]).await?
    {
        return Err(CatalogError::UniqueConstraintViolation(
            "Username already taken".into(),
        ));
    }
    Ok(())
}

/// Insert one user on an open unit of work. The password must already be hashed.
pub(crate) async fn insert_user(
    uow: &UnitOfWork<Active>,
    username: &str,
    email: &str,
    hashed_password: String,
    is_active: bool,
) -> Result<User, CatalogError> {
    let plan = insert_returning(
        "users",
        &["username", "email", "hashed_password", "is_active"],
        vec![
            username.into(),
            email.into(),
            hashed_password.into(),
            is_active.into(),
        ],
        USER_COLUMNS,
    );
    uow.fetch_optional::<User>(&plan)
        .await
        .map_err(|err| rename_unique(err, DUPLICATE_MESSAGES))?
        .ok_or_else(|| CatalogError::ExecutionError("insert returned no row".into()))
}

impl UserRepository {
    #[must_use]
    pub fn new(pool: ConnectionPool, hasher: Arc<dyn PasswordHasher>, max_limit: i64) -> Self {
        Self {
            pool,
            hasher,
            max_limit,
        }
    }

    #[must_use]
    pub fn hasher(&self) -> Arc<dyn PasswordHasher> {
        Arc::clone(&self.hasher)
    }

    /// Hash off the async runtime; bcrypt is deliberately slow.
    pub(crate) async fn hash_password(&self, plaintext: String) -> Result<String, CatalogError> {
        let hasher = Arc::clone(&self.hasher);
        tokio::task::spawn_blocking(move || hasher.hash(&plaintext))
            .await
            .map_err(|e| CatalogError::ExecutionError(format!("hashing task failed: {e}")))?
    }

    async fn verify_password(&self, plaintext: String, hash: String) -> Result<bool, CatalogError> {
        let hasher = Arc::clone(&self.hasher);
        tokio::task::spawn_blocking(move || hasher.verify(&plaintext, &hash))
            .await
            .map_err(|e| CatalogError::ExecutionError(format!("verify task failed: {e}")))?
    }

    /// # Errors
    /// `NotFound` when no user has this email.
    pub async fn get_by_email(&self, email: &str) -> Result<User, CatalogError> {
        tracing::debug!(resource = RESOURCE, email, "get_by_email");
        let result = async {
            let uow = UnitOfWork::read(&self.pool).await?;
            let found = fetch_one::<UserCredentials>(&uow, SELECT_CREDENTIALS_BY_EMAIL, &[email.into()]).await;
            uow.finish(found).await?.map(|c| c.user).ok_or_else(not_found)
        }
        .await;
        observe(RESOURCE, "get_by_email", result)
    }

    /// Check an email/password pair.
    ///
    /// Unknown email, wrong password and inactive account all fail the same way.
    ///
    /// # Errors
    /// `InvalidCredentials` on any mismatch.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, CatalogError> {
        tracing::debug!(resource = RESOURCE, email, "login");
        let result = async {
            let uow = UnitOfWork::read(&self.pool).await?;
            let found =
                fetch_one::<UserCredentials>(&uow, SELECT_CREDENTIALS_BY_EMAIL, &[email.into()]).await;
            let Some(creds) = uow.finish(found).await? else {
                return Err(CatalogError::InvalidCredentials);
            };
            if !creds.user.is_active {
                return Err(CatalogError::InvalidCredentials);
            }
            if self
                .verify_password(password.to_string(), creds.hashed_password)
                .await?
            {
                Ok(creds.user)
            } else {
                Err(CatalogError::InvalidCredentials)
            }
        }
        .await;
        if let Ok(user) = &result {
            tracing::info!(resource = RESOURCE, user_id = user.id, "login succeeded");
        }
        observe(RESOURCE, "login", result)
    }
}

#[async_trait]
impl ResourceRepository for UserRepository {
    type Record = User;
    type Create = NewUser;
    type Changes = UserChanges;
    type Filter = UserFilter;
    type Deleted = ();

    async fn create(&self, fields: NewUser) -> Result<User, CatalogError> {
        tracing::debug!(resource = RESOURCE, username = %fields.username, "create");
        let result = async {
            let hashed = self.hash_password(fields.password).await?;
            let uow = UnitOfWork::write(&self.pool).await?;
            let inserted = async {
                ensure_unique(&uow, Some(&fields.username), Some(&fields.email), 0).await?;
                insert_user(&uow, &fields.username, &fields.email, hashed, fields.is_active).await
            }
            .await;
            uow.finish(inserted).await
        }
        .await;
        if let Ok(user) = &result {
            tracing::info!(resource = RESOURCE, user_id = user.id, "user created");
        }
        observe(RESOURCE, "create", result)
    }

    async fn get_by_id(&self, id: i64) -> Result<User, CatalogError> {
        tracing::debug!(resource = RESOURCE, id, "get_by_id");
        let result = async {
            let uow = UnitOfWork::read(&self.pool).await?;
            let found = fetch_one::<User>(&uow, SELECT_BY_ID, &[id.into()]).await;
            uow.finish(found).await?.ok_or_else(not_found)
        }
        .await;
        observe(RESOURCE, "get_by_id", result)
    }

    async fn list(&self, filter: &UserFilter, params: &ListParams) -> Result<Page<User>, CatalogError> {
        tracing::debug!(resource = RESOURCE, skip = params.skip, limit = params.limit, "list");
        let query = ListQuery {
            projection: LIST,
            sortable: SORTABLE,
            tiebreaker: "u.id",
            max_limit: self.max_limit,
        };
        let result = list_page(&self.pool, &query, &filter.spec(), params).await;
        observe(RESOURCE, "list", result)
    }

    async fn update(&self, id: i64, changes: UserChanges) -> Result<User, CatalogError> {
        tracing::debug!(resource = RESOURCE, id, "update");
        let result = async {
            let hashed = match changes.password {
                Some(plaintext) => Some(self.hash_password(plaintext).await?),
                None => None,
            };
            let uow = UnitOfWork::write(&self.pool).await?;
            let updated = async {
                let current = fetch_one::<User>(&uow, SELECT_BY_ID, &[id.into()])
                    .await?
                    .ok_or_else(not_found)?;
                // Only values that actually change can collide with another user.
                let new_username = changes
                    .username
                    .as_deref()
                    .filter(|name| *name != current.username);
                let new_email = changes
                    .email
                    .as_deref()
                    .filter(|email| *email != current.email);
                ensure_unique(&uow, new_username, new_email, id).await?;

                let plan = update_coalesce(
                    "users",
                    vec![
                        ("username", changes.username.clone().into()),
                        ("email", changes.email.clone().into()),
                        ("hashed_password", hashed.into()),
                        ("is_active", changes.is_active.into()),
                    ],
                    "id",
                    id.into(),
                    USER_COLUMNS,
                );
                uow.fetch_optional::<User>(&plan)
                    .await
                    .map_err(|err| rename_unique(err, DUPLICATE_MESSAGES))?
                    .ok_or_else(not_found)
            }
            .await;
            uow.finish(updated).await
        }
        .await;
        if result.is_ok() {
            tracing::info!(resource = RESOURCE, id, "user updated");
        }
        observe(RESOURCE, "update", result)
    }

    async fn delete(&self, id: i64) -> Result<(), CatalogError> {
        tracing::debug!(resource = RESOURCE, id, "delete");
        let result = async {
            let uow = UnitOfWork::write(&self.pool).await?;
            let deleted = uow.run(&delete_by_key("users", "id", SqlValue::Int(id))).await;
            match uow.finish(deleted).await? {
                0 => Err(not_found()),
                _ => Ok(()),
            }
        }
        .await;
        if result.is_ok() {
            tracing::info!(resource = RESOURCE, id, "user deleted");
        }
        observe(RESOURCE, "delete", result)
    }
}
