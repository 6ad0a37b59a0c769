//! Spreadsheet import and export.
//!
//! An upload is parsed into raw rows, every row is validated on its own, and the valid
//! rows are persisted in one of two modes:
//!
//! * [`InsertMode::AllOrNothing`]: any validation or insert failure persists nothing.
//!   Rows go in as chunked multi-row INSERTs inside a single unit of work.
//! * [`InsertMode::BestEffort`]: each row runs under its own savepoint and a unit of work
//!   is committed every `batch_size` rows, so a bad row costs only itself.

pub mod export;
pub mod items;
pub mod parse;
pub mod users;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::CatalogError;
use crate::pool::ConnectionPool;
use crate::unit_of_work::{Active, UnitOfWork};

pub use export::items_to_xlsx;
pub use items::ItemRows;
pub use parse::{RawRow, check_extension, parse_rows};
pub use users::UserRows;

/// Rows per committed batch in best-effort mode, and per INSERT in all-or-nothing mode.
pub const DEFAULT_BATCH_SIZE: usize = 500;

const ROW_SAVEPOINT: &str = "bulk_row";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertMode {
    AllOrNothing,
    BestEffort,
}

impl InsertMode {
    #[must_use]
    pub fn from_flag(all_or_nothing: bool) -> Self {
        if all_or_nothing {
            InsertMode::AllOrNothing
        } else {
            InsertMode::BestEffort
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStatus {
    Success,
    PartialSuccess,
    Error,
}

/// A row rejected before any insert was attempted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowError {
    pub row: usize,
    pub error: String,
}

/// A valid row the store refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedRow {
    pub row: usize,
    /// Natural key of the row (item name, user email).
    pub key: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub status: ImportStatus,
    pub total_rows: usize,
    /// Rows that passed validation and reached the insert step.
    pub processed_count: usize,
    pub success_count: usize,
    pub error_count: usize,
    pub validation_errors: Vec<RowError>,
    pub failed_items: Vec<FailedRow>,
    pub insert_mode: InsertMode,
}

impl ImportReport {
    fn new(mode: InsertMode, total_rows: usize, validation_errors: Vec<RowError>) -> Self {
        Self {
            status: ImportStatus::Error,
            total_rows,
            processed_count: 0,
            success_count: 0,
            error_count: 0,
            validation_errors,
            failed_items: Vec::new(),
            insert_mode: mode,
        }
    }

    fn settle(mut self) -> Self {
        self.error_count = self.validation_errors.len() + self.failed_items.len();
        self.status = if self.error_count == 0 {
            ImportStatus::Success
        } else if self.success_count == 0 {
            ImportStatus::Error
        } else {
            ImportStatus::PartialSuccess
        };
        self
    }

    /// Summary line for the response envelope.
    #[must_use]
    pub fn summary(&self) -> String {
        match self.status {
            ImportStatus::Success => format!("Imported {} rows", self.success_count),
            ImportStatus::PartialSuccess => format!(
                "Imported {} of {} rows; {} failed",
                self.success_count, self.total_rows, self.error_count
            ),
            ImportStatus::Error => format!("No rows imported; {} failed", self.error_count),
        }
    }
}

/// A resource that rows of an upload can be imported into.
#[async_trait]
pub trait BulkTarget: Send + Sync + 'static {
    /// A row that passed validation.
    type Valid: Send + Sync;
    /// A validated row ready for the store (passwords hashed and so on).
    type Prepared: Send + Sync;

    /// Header names that must be present.
    const REQUIRED: &'static [&'static str];
    /// Resource name for logging.
    const RESOURCE: &'static str;

    /// # Errors
    /// `RowValidation` with the row number and reason.
    fn validate(&self, row: &RawRow) -> Result<Self::Valid, CatalogError>;

    /// Natural key used in failure reports.
    fn key(row: &Self::Valid) -> String;

    async fn prepare(&self, row: Self::Valid) -> Result<Self::Prepared, CatalogError>;

    async fn insert_one(
        &self,
        uow: &UnitOfWork<Active>,
        row: &Self::Prepared,
    ) -> Result<(), CatalogError>;

    /// Insert a chunk; returns the number of rows written.
    async fn insert_chunk(
        &self,
        uow: &UnitOfWork<Active>,
        rows: &[&Self::Prepared],
    ) -> Result<usize, CatalogError>;
}

struct Staged<P> {
    row: usize,
    key: String,
    prepared: P,
}

#[derive(Debug, Clone)]
pub struct BulkImporter {
    pool: ConnectionPool,
    batch_size: usize,
}

impl BulkImporter {
    #[must_use]
    pub fn new(pool: ConnectionPool, batch_size: usize) -> Self {
        Self {
            pool,
            batch_size: batch_size.max(1),
        }
    }

    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Parse, validate and persist an uploaded workbook.
    ///
    /// Row-level problems land in the report; only file-level problems are errors.
    ///
    /// # Errors
    /// `UnsupportedFormat`, `MissingColumns` or `EmptyInput` for an unusable file; pool
    /// errors when an all-or-nothing import cannot get a connection. A best-effort import
    /// that loses the pool part way reports the unwritten rows as failed instead.
    pub async fn import<T: BulkTarget>(
        &self,
        target: &T,
        filename: &str,
        content: Vec<u8>,
        mode: InsertMode,
    ) -> Result<ImportReport, CatalogError> {
        tracing::debug!(resource = T::RESOURCE, filename, ?mode, "bulk import");
        check_extension(filename)?;
        let name = filename.to_string();
        let rows = tokio::task::spawn_blocking(move || parse_rows(&name, content, T::REQUIRED))
            .await
            .map_err(|e| CatalogError::ExecutionError(format!("parse task failed: {e}")))??;

        let total_rows = rows.len();
        let mut valid = Vec::with_capacity(total_rows);
        let mut validation_errors = Vec::new();
        for raw in &rows {
            match target.validate(raw) {
                Ok(row) => valid.push((raw.row_number, row)),
                Err(err) => validation_errors.push(RowError {
                    row: raw.row_number,
                    error: row_reason(err),
                }),
            }
        }

        let mut report = ImportReport::new(mode, total_rows, validation_errors);
        if mode == InsertMode::AllOrNothing && !report.validation_errors.is_empty() {
            tracing::warn!(
                resource = T::RESOURCE,
                invalid = report.validation_errors.len(),
                "bulk import rejected, nothing persisted"
            );
            return Ok(report.settle());
        }

        let mut staged = Vec::with_capacity(valid.len());
        for (row, candidate) in valid {
            let key = T::key(&candidate);
            match target.prepare(candidate).await {
                Ok(prepared) => staged.push(Staged { row, key, prepared }),
                Err(err) => report.failed_items.push(FailedRow {
                    row,
                    key,
                    error: err.public_message(),
                }),
            }
        }
        if mode == InsertMode::AllOrNothing && !report.failed_items.is_empty() {
            return Ok(report.settle());
        }

        report.processed_count = staged.len();
        match mode {
            InsertMode::AllOrNothing => self.insert_all(target, &staged, &mut report).await?,
            InsertMode::BestEffort => self.insert_each(target, &staged, &mut report).await,
        }

        let report = report.settle();
        tracing::info!(
            resource = T::RESOURCE,
            status = ?report.status,
            total = report.total_rows,
            succeeded = report.success_count,
            failed = report.error_count,
            "bulk import finished"
        );
        Ok(report)
    }

    async fn insert_all<T: BulkTarget>(
        &self,
        target: &T,
        staged: &[Staged<T::Prepared>],
        report: &mut ImportReport,
    ) -> Result<(), CatalogError> {
        let uow = UnitOfWork::write(&self.pool).await?;
        let mut written = 0;
        let mut failure = None;
        for chunk in staged.chunks(self.batch_size) {
            let rows: Vec<&T::Prepared> = chunk.iter().map(|s| &s.prepared).collect();
            match target.insert_chunk(&uow, &rows).await {
                Ok(count) => written += count,
                Err(err) => {
                    failure = Some((chunk, err));
                    break;
                }
            }
        }

        let Some((chunk, err)) = failure else {
            uow.commit().await?;
            report.success_count = written;
            return Ok(());
        };
        uow.rollback().await;
        tracing::warn!(resource = T::RESOURCE, error = %err, "bulk insert failed, rolled back");
        let first = &chunk[0];
        report.failed_items.push(FailedRow {
            row: first.row,
            key: first.key.clone(),
            error: format!(
                "batch starting at row {} rejected, nothing imported: {}",
                first.row,
                err.public_message()
            ),
        });
        Ok(())
    }

    async fn insert_each<T: BulkTarget>(
        &self,
        target: &T,
        staged: &[Staged<T::Prepared>],
        report: &mut ImportReport,
    ) {
        let mut chunks = staged.chunks(self.batch_size);
        while let Some(chunk) = chunks.next() {
            let uow = match UnitOfWork::write(&self.pool).await {
                Ok(uow) => uow,
                Err(err) => {
                    // Earlier batches stay committed; everything from here on is reported.
                    tracing::error!(resource = T::RESOURCE, error = %err, "bulk import stopped, no connection");
                    let remaining = chunk.iter().chain(chunks.by_ref().flatten());
                    report.failed_items.extend(remaining.map(|item| FailedRow {
                        row: item.row,
                        key: item.key.clone(),
                        error: err.public_message(),
                    }));
                    return;
                }
            };
            let mut failed = Vec::new();
            let outcome = async {
                for item in chunk {
                    uow.savepoint(ROW_SAVEPOINT).await?;
                    match target.insert_one(&uow, &item.prepared).await {
                        Ok(()) => uow.release_savepoint(ROW_SAVEPOINT).await?,
                        Err(err) => {
                            uow.rollback_to(ROW_SAVEPOINT).await?;
                            tracing::debug!(row = item.row, error = %err, "row rejected");
                            failed.push(FailedRow {
                                row: item.row,
                                key: item.key.clone(),
                                error: err.public_message(),
                            });
                        }
                    }
                }
                Ok::<_, CatalogError>(())
            }
            .await;

            match uow.finish(outcome).await {
                Ok(()) => {
                    report.success_count += chunk.len() - failed.len();
                    report.failed_items.append(&mut failed);
                }
                Err(err) => {
                    // The whole batch is gone; earlier batches stay committed.
                    tracing::error!(resource = T::RESOURCE, error = %err, "bulk batch rolled back");
                    report.failed_items.extend(chunk.iter().map(|item| FailedRow {
                        row: item.row,
                        key: item.key.clone(),
                        error: err.public_message(),
                    }));
                }
            }
        }
    }
}

fn row_reason(err: CatalogError) -> String {
    match err {
        CatalogError::RowValidation { reason, .. } => reason,
        other => other.public_message(),
    }
}
