//! HTTP boundary: routing, request extraction, and the JSON envelope every handler
//! answers with.

pub mod error;
pub mod extractors;
pub mod routes;
pub mod server;

pub use error::ApiError;
pub use extractors::{ValidJson, ValidPath, ValidQuery};
pub use server::{AppState, Limits, router, serve, shutdown_signal};
