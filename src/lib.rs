//! Pooled SQLite backend for users, items, item images and reviews.
//!
//! The layers, bottom up:
//! - [`pool`]: a bounded connection pool with timed acquire and retry on transient failure
//! - [`unit_of_work`]: one transaction on one borrowed connection, released exactly once
//! - [`query_builder`]: whitelist-checked filters, ordering and paging as parameterized plans
//! - [`repository`]: the per-resource CRUD contract
//! - [`bulk`]: spreadsheet import in all-or-nothing or best-effort mode, and export
//! - [`http`]: the axum boundary answering with [`envelope::ApiResponse`]

pub mod bulk;
pub mod config;
pub mod envelope;
pub mod error;
pub mod http;
pub mod logging;
pub mod model;
pub mod pool;
pub mod prelude;
pub mod query_builder;
pub mod repository;
pub mod results;
pub mod schema;
pub mod services;
pub mod sqlite;
pub mod tx_outcome;
pub mod types;
pub mod unit_of_work;

pub use error::CatalogError;
pub use pool::{ConnectionPool, PoolOptions};
pub use tx_outcome::TxOutcome;
pub use types::SqlValue;
pub use unit_of_work::UnitOfWork;
