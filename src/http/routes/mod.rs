//! Route groups, one module per resource.

pub mod health;
pub mod items;
pub mod reviews;
pub mod users;

use axum::Json;
use axum::extract::Multipart;
use axum::http::StatusCode;
use serde::Deserialize;

use super::error::ApiError;
use crate::envelope::ApiResponse;
use crate::error::CatalogError;
use crate::model::ListParams;

/// What every handler returns: the envelope plus a matching HTTP status.
pub type ApiResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), ApiError>;

pub(crate) fn respond<T>(body: ApiResponse<T>) -> (StatusCode, Json<ApiResponse<T>>) {
    let status = StatusCode::from_u16(body.status_code).unwrap_or(StatusCode::OK);
    (status, Json(body))
}

/// `?all_or_nothing=` on bulk uploads. Defaults to best-effort.
#[derive(Debug, Default, Deserialize)]
pub struct BulkQuery {
    #[serde(default)]
    pub all_or_nothing: bool,
}

/// Build list paging/sorting from raw query values; absent values take the defaults.
pub(crate) fn list_params(
    skip: Option<i64>,
    limit: Option<i64>,
    sort_by: Option<String>,
    sort_direction: Option<&str>,
) -> Result<ListParams, CatalogError> {
    let defaults = ListParams::default();
    Ok(ListParams {
        skip: skip.unwrap_or(defaults.skip),
        limit: limit.unwrap_or(defaults.limit),
        sort_by: sort_by
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.sort_by),
        direction: match sort_direction {
            Some(raw) if !raw.trim().is_empty() => raw.parse()?,
            _ => defaults.direction,
        },
    })
}

/// One uploaded file from a multipart form.
#[derive(Debug)]
pub struct Upload {
    pub filename: String,
    pub content_type: Option<String>,
    pub content: Vec<u8>,
}

/// Read the multipart field called `name`; other fields are skipped.
pub(crate) async fn read_upload(mut form: Multipart, name: &str) -> Result<Upload, ApiError> {
    let malformed = |e: axum::extract::multipart::MultipartError| {
        ApiError(CatalogError::Validation(format!("malformed upload: {}", e.body_text())))
    };
    while let Some(field) = form.next_field().await.map_err(malformed)? {
        if field.name() != Some(name) {
            continue;
        }
        let filename = field
            .file_name()
            .map(ToString::to_string)
            .filter(|f| !f.trim().is_empty())
            .ok_or_else(|| CatalogError::Validation("uploaded file has no name".into()))?;
        let content_type = field.content_type().map(ToString::to_string);
        let content = field.bytes().await.map_err(malformed)?.to_vec();
        return Ok(Upload {
            filename,
            content_type,
            content,
        });
    }
    Err(CatalogError::Validation(format!("missing form field '{name}'")).into())
}
