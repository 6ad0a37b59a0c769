//! Process configuration: command-line flags with `CATALOG_*` environment fallbacks.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::bulk::DEFAULT_BATCH_SIZE;
use crate::error::CatalogError;
use crate::logging::LogDestination;
use crate::pool::PoolOptions;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Catalog service: users, items, images and reviews")]
pub struct AppConfig {
    /// SQLite database file.
    #[arg(long, env = "CATALOG_DATABASE", default_value = "catalog.db")]
    pub database: String,
    #[arg(long, env = "CATALOG_POOL_MIN", default_value_t = 1)]
    pub pool_min: usize,
    #[arg(long, env = "CATALOG_POOL_MAX", default_value_t = 8)]
    pub pool_max: usize,
    #[arg(long, env = "CATALOG_ACQUIRE_TIMEOUT_MS", default_value_t = 5_000)]
    pub acquire_timeout_ms: u64,
    #[arg(long, env = "CATALOG_CONNECT_TIMEOUT_MS", default_value_t = 5_000)]
    pub connect_timeout_ms: u64,
    #[arg(long, env = "CATALOG_BUSY_TIMEOUT_MS", default_value_t = 5_000)]
    pub busy_timeout_ms: u64,

    #[arg(long, env = "CATALOG_HOST", default_value = "127.0.0.1")]
    pub host: String,
    #[arg(long, env = "CATALOG_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Root directory for uploaded files.
    #[arg(long, env = "CATALOG_UPLOAD_DIR", default_value = "uploads")]
    pub upload_dir: PathBuf,

    #[arg(long, env = "CATALOG_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
    #[arg(long, env = "CATALOG_LOG_DESTINATION", value_enum, default_value = "console")]
    pub log_destination: LogDestination,
    #[arg(long, env = "CATALOG_LOG_FILE", default_value = "logs/catalog.log")]
    pub log_file: PathBuf,

    #[arg(long, env = "CATALOG_BCRYPT_COST", default_value_t = 12)]
    pub bcrypt_cost: u32,

    #[arg(long, env = "CATALOG_MAX_USERS_LIMIT", default_value_t = 100)]
    pub max_users_limit: i64,
    #[arg(long, env = "CATALOG_MAX_ITEMS_LIMIT", default_value_t = 100)]
    pub max_items_limit: i64,
    #[arg(long, env = "CATALOG_MAX_REVIEWS_LIMIT", default_value_t = 100)]
    pub max_reviews_limit: i64,
    /// Row ceiling for the spreadsheet export.
    #[arg(long, env = "CATALOG_EXPORT_LIMIT", default_value_t = 10_000)]
    pub export_limit: i64,
    #[arg(long, env = "CATALOG_BULK_BATCH_SIZE", default_value_t = DEFAULT_BATCH_SIZE)]
    pub bulk_batch_size: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: "catalog.db".to_string(),
            pool_min: 1,
            pool_max: 8,
            acquire_timeout_ms: 5_000,
            connect_timeout_ms: 5_000,
            busy_timeout_ms: 5_000,
            host: "127.0.0.1".to_string(),
            port: 8000,
            upload_dir: PathBuf::from("uploads"),
            log_level: "info".to_string(),
            log_destination: LogDestination::Console,
            log_file: PathBuf::from("logs/catalog.log"),
            bcrypt_cost: 12,
            max_users_limit: 100,
            max_items_limit: 100,
            max_reviews_limit: 100,
            export_limit: 10_000,
            bulk_batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl AppConfig {
    #[must_use]
    pub fn pool_options(&self) -> PoolOptions {
        PoolOptions::builder(self.database.clone())
            .min_size(self.pool_min)
            .max_size(self.pool_max)
            .acquire_timeout(Duration::from_millis(self.acquire_timeout_ms))
            .connect_timeout(Duration::from_millis(self.connect_timeout_ms))
            .busy_timeout(Duration::from_millis(self.busy_timeout_ms))
            .finish()
    }

    /// # Errors
    /// `ConfigError` when the host and port do not form a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, CatalogError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| CatalogError::ConfigError(format!("invalid bind address: {e}")))
    }

    /// # Errors
    /// `ConfigError` for inconsistent pool sizes or non-positive limits.
    pub fn validate(&self) -> Result<(), CatalogError> {
        self.pool_options().validate()?;
        for (name, value) in [
            ("max_users_limit", self.max_users_limit),
            ("max_items_limit", self.max_items_limit),
            ("max_reviews_limit", self.max_reviews_limit),
            ("export_limit", self.export_limit),
        ] {
            if value < 1 {
                return Err(CatalogError::ConfigError(format!("{name} must be positive")));
            }
        }
        if !(4..=31).contains(&self.bcrypt_cost) {
            return Err(CatalogError::ConfigError(
                "bcrypt_cost must be between 4 and 31".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags_over_defaults() {
        let config = AppConfig::try_parse_from([
            "catalog-service",
            "--database",
            "/tmp/x.db",
            "--pool-max",
            "3",
            "--log-destination",
            "both",
            "--acquire-timeout-ms",
            "250",
        ])
        .unwrap();
        assert_eq!(config.log_destination, LogDestination::Both);
        let opts = config.pool_options();
        assert_eq!(opts.db_path, "/tmp/x.db");
        assert_eq!(opts.max_size, 3);
        assert_eq!(opts.acquire_timeout, Duration::from_millis(250));
        assert_eq!(config.export_limit, 10_000);
    }

    #[test]
    fn rejects_inverted_pool_sizes() {
        let config = AppConfig {
            pool_min: 9,
            ..AppConfig::default()
        };
        assert!(matches!(config.validate(), Err(CatalogError::ConfigError(_))));
    }

    #[test]
    fn default_binds_locally() {
        let addr = AppConfig::default().bind_addr().unwrap();
        assert_eq!(addr.port(), 8000);
        assert!(addr.ip().is_loopback());
    }
}
