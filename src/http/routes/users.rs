use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;

use super::{ApiResult, BulkQuery, list_params, read_upload, respond};
use crate::bulk::{ImportReport, ImportStatus, InsertMode};
use crate::envelope::ApiResponse;
use crate::http::extractors::{ValidJson, ValidPath, ValidQuery};
use crate::http::server::AppState;
use crate::model::{LoginRequest, NewUser, Page, User, UserChanges};
use crate::repository::{ResourceRepository, UserFilter};

#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    pub sort_by: Option<String>,
    pub sort_direction: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub is_active: Option<bool>,
}

/// POST /users
async fn create_user(
    State(state): State<Arc<AppState>>,
    ValidJson(payload): ValidJson<NewUser>,
) -> ApiResult<User> {
    let user = state.users.create(payload).await?;
    Ok(respond(ApiResponse::created(user, "User created successfully")))
}

/// GET /users
async fn list_users(
    State(state): State<Arc<AppState>>,
    ValidQuery(query): ValidQuery<UserListQuery>,
) -> ApiResult<Page<User>> {
    let params = list_params(
        query.skip,
        query.limit,
        query.sort_by,
        query.sort_direction.as_deref(),
    )?;
    let filter = UserFilter {
        username: query.username,
        email: query.email,
        is_active: query.is_active,
    };
    let page = state.users.list(&filter, &params).await?;
    Ok(respond(ApiResponse::ok(page, "Users retrieved successfully")))
}

/// GET /users/{id}
async fn get_user(
    State(state): State<Arc<AppState>>,
    ValidPath(id): ValidPath<i64>,
) -> ApiResult<User> {
    let user = state.users.get_by_id(id).await?;
    Ok(respond(ApiResponse::ok(user, "User retrieved successfully")))
}

/// GET /users/email/{email}
async fn get_user_by_email(
    State(state): State<Arc<AppState>>,
    ValidPath(email): ValidPath<String>,
) -> ApiResult<User> {
    let user = state.users.get_by_email(&email).await?;
    Ok(respond(ApiResponse::ok(user, "User retrieved successfully")))
}

/// PUT /users/{id}
async fn update_user(
    State(state): State<Arc<AppState>>,
    ValidPath(id): ValidPath<i64>,
    ValidJson(changes): ValidJson<UserChanges>,
) -> ApiResult<User> {
    let user = state.users.update(id, changes).await?;
    Ok(respond(ApiResponse::ok(user, "User updated successfully")))
}

/// DELETE /users/{id}
async fn delete_user(
    State(state): State<Arc<AppState>>,
    ValidPath(id): ValidPath<i64>,
) -> ApiResult<()> {
    state.users.delete(id).await?;
    Ok(respond(ApiResponse::empty(200, "User deleted successfully")))
}

/// POST /users/login
async fn login(
    State(state): State<Arc<AppState>>,
    ValidJson(payload): ValidJson<LoginRequest>,
) -> ApiResult<User> {
    let user = state.users.login(&payload.email, &payload.password).await?;
    Ok(respond(ApiResponse::ok(user, "Login successful")))
}

/// Envelope for a finished import: 400 when nothing went in.
pub(crate) fn import_response(report: ImportReport) -> ApiResponse<ImportReport> {
    let message = report.summary();
    let mut body = ApiResponse::ok(report, message);
    if matches!(body.data.as_ref().map(|r| r.status), Some(ImportStatus::Error)) {
        body.status_code = 400;
    }
    body
}

/// POST /users/bulk-upload
async fn bulk_upload_users(
    State(state): State<Arc<AppState>>,
    ValidQuery(bulk): ValidQuery<BulkQuery>,
    form: Multipart,
) -> ApiResult<ImportReport> {
    let upload = read_upload(form, "file").await?;
    let report = state
        .importer
        .import(
            &state.user_rows,
            &upload.filename,
            upload.content,
            InsertMode::from_flag(bulk.all_or_nothing),
        )
        .await?;
    Ok(respond(import_response(report)))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/login", post(login))
        .route("/users/bulk-upload", post(bulk_upload_users))
        .route("/users/email/{email}", get(get_user_by_email))
        .route(
            "/users/{id}",
            get(get_user).put(update_user).delete(delete_user),
        )
}
