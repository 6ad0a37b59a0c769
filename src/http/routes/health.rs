use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::Router;
use serde::Serialize;

use super::{ApiResult, respond};
use crate::envelope::ApiResponse;
use crate::http::server::AppState;
use crate::pool::PoolStatus;

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub version: &'static str,
    pub pool: PoolStatus,
}

/// GET /health
async fn health(State(state): State<Arc<AppState>>) -> ApiResult<HealthReport> {
    let pool = state.pool.status();
    let (status, code) = if pool.closed {
        ("unavailable", 503)
    } else {
        ("ok", 200)
    };
    let report = HealthReport {
        status,
        version: env!("CARGO_PKG_VERSION"),
        pool,
    };
    let mut body = ApiResponse::ok(report, status);
    body.status_code = code;
    Ok(respond(body))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health))
}
