//! The JSON shape every endpoint answers with: `{data, message, status_code}`.

use serde::Serialize;

use crate::error::CatalogError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse<T> {
    pub data: Option<T>,
    pub message: String,
    pub status_code: u16,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self {
            data: Some(data),
            message: message.into(),
            status_code: 200,
        }
    }

    pub fn created(data: T, message: impl Into<String>) -> Self {
        Self {
            data: Some(data),
            message: message.into(),
            status_code: 201,
        }
    }

    /// A payload-less response with an explicit status.
    pub fn empty(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            data: None,
            message: message.into(),
            status_code,
        }
    }
}

impl ApiResponse<()> {
    /// Client-safe rendering of an error; 500s never carry detail.
    #[must_use]
    pub fn from_error(err: &CatalogError) -> Self {
        Self::empty(err.status_code(), err.public_message())
    }
}
