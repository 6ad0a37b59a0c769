use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use catalog_service::config::AppConfig;
use catalog_service::http::{AppState, Limits, serve, shutdown_signal};
use catalog_service::services::{BcryptHasher, LocalFileStore};
use catalog_service::{CatalogError, ConnectionPool, logging, schema};

async fn run(config: AppConfig) -> Result<(), CatalogError> {
    config.validate()?;
    let pool = ConnectionPool::connect(config.pool_options()).await?;
    let created = schema::migrate(&pool).await?;
    tracing::info!(database = %config.database, created = ?created, "schema ready");

    let state = AppState::new(
        pool,
        Arc::new(BcryptHasher::new(config.bcrypt_cost)),
        Arc::new(LocalFileStore::new(&config.upload_dir)),
        Limits::from_config(&config),
    );
    let listener = TcpListener::bind(config.bind_addr()?)
        .await
        .map_err(|e| CatalogError::ConnectionError(format!("cannot bind: {e}")))?;
    serve(listener, state, shutdown_signal()).await
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = AppConfig::parse();
    if let Err(err) = logging::init(&config.log_level, config.log_destination, &config.log_file) {
        eprintln!("failed to open log file: {err}");
        return ExitCode::FAILURE;
    }
    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "catalog service stopped");
            ExitCode::FAILURE
        }
    }
}
