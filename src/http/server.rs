use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use super::routes;
use crate::bulk::{BulkImporter, DEFAULT_BATCH_SIZE, ItemRows, UserRows};
use crate::config::AppConfig;
use crate::error::CatalogError;
use crate::pool::ConnectionPool;
use crate::repository::{ItemRepository, ReviewRepository, UserRepository};
use crate::services::{FileStore, PasswordHasher};

/// Largest accepted request body (uploads included).
const BODY_LIMIT: usize = 32 * 1024 * 1024;

/// Per-resource list ceilings and bulk batch size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub users: i64,
    pub items: i64,
    pub reviews: i64,
    pub export: i64,
    pub batch_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            users: 100,
            items: 100,
            reviews: 100,
            export: 10_000,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl Limits {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            users: config.max_users_limit,
            items: config.max_items_limit,
            reviews: config.max_reviews_limit,
            export: config.export_limit,
            batch_size: config.bulk_batch_size,
        }
    }
}

/// Everything a handler needs. Built once at startup and shared behind an `Arc`.
#[derive(Debug, Clone)]
pub struct AppState {
    pub pool: ConnectionPool,
    pub users: UserRepository,
    pub items: ItemRepository,
    pub reviews: ReviewRepository,
    pub importer: BulkImporter,
    pub item_rows: ItemRows,
    pub user_rows: UserRows,
}

impl AppState {
    #[must_use]
    pub fn new(
        pool: ConnectionPool,
        hasher: Arc<dyn PasswordHasher>,
        files: Arc<dyn FileStore>,
        limits: Limits,
    ) -> Self {
        Self {
            users: UserRepository::new(pool.clone(), Arc::clone(&hasher), limits.users),
            items: ItemRepository::new(pool.clone(), files, limits.items, limits.export),
            reviews: ReviewRepository::new(pool.clone(), limits.reviews),
            importer: BulkImporter::new(pool.clone(), limits.batch_size),
            item_rows: ItemRows,
            user_rows: UserRows::new(hasher),
            pool,
        }
    }
}

/// The full application router with request tracing.
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(routes::health::router())
        .merge(routes::users::router())
        .merge(routes::items::router())
        .merge(routes::reviews::router())
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// Serve until `shutdown` resolves, then close the pool.
///
/// # Errors
/// `ConnectionError` when the listener fails.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), CatalogError> {
    let pool = state.pool.clone();
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "listening");
    }
    let served = axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| CatalogError::ConnectionError(format!("server failed: {e}")));
    pool.shutdown();
    tracing::info!("server shutdown complete");
    served
}

/// Resolve on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "cannot listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        () = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
