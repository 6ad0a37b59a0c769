//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::bulk::{BulkImporter, ImportReport, ImportStatus, InsertMode, ItemRows, UserRows};
pub use crate::envelope::ApiResponse;
pub use crate::error::CatalogError;
pub use crate::model::{
    Item, ItemChanges, ItemImage, ListParams, NewItem, NewReview, NewUser, Page, Review,
    ReviewChanges, User, UserChanges,
};
pub use crate::pool::{ConnectionPool, PoolOptions, PoolStatus};
pub use crate::query_builder::{
    FilterSpec, QueryPlan, SortColumn, SortDirection, build_filter, build_order, build_page,
};
pub use crate::repository::{
    ItemDeletion, ItemFilter, ItemRepository, ResourceRepository, ReviewFilter,
    ReviewRepository, UserFilter, UserRepository,
};
pub use crate::results::{FromRow, ResultSet, Row};
pub use crate::services::{
    BcryptHasher, FileCategory, FileStore, LocalFileStore, PasswordHasher, StoredFile,
};
pub use crate::tx_outcome::TxOutcome;
pub use crate::types::SqlValue;
pub use crate::unit_of_work::{Active, Idle, UnitOfWork};
