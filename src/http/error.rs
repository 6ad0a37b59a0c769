use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use validator::ValidationErrors;

use crate::envelope::ApiResponse;
use crate::error::CatalogError;
use crate::model::validation_message;

/// Handler error: any [`CatalogError`], rendered as the standard envelope.
#[derive(Debug)]
pub struct ApiError(pub CatalogError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse::from_error(&self.0);
        if body.status_code >= 500 {
            // The client gets a generic message; the detail stays in the log.
            tracing::error!(error = %self.0, "request failed");
        } else {
            tracing::debug!(status = body.status_code, error = %self.0, "request rejected");
        }
        let status =
            StatusCode::from_u16(body.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(body)).into_response()
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        Self(err)
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        Self(CatalogError::Validation(validation_message(&errors)))
    }
}
