use rust_xlsxwriter::{Format, Workbook, XlsxError};

use crate::error::CatalogError;
use crate::model::Item;

/// Column order of the item export. Matches the import headers where they overlap.
pub const ITEM_EXPORT_COLUMNS: &[&str] = &["id", "name", "description", "price", "tax", "created_at"];

fn xlsx_error(err: XlsxError) -> CatalogError {
    CatalogError::ExecutionError(format!("workbook generation failed: {err}"))
}

/// Write items to an in-memory `.xlsx` workbook with one header row.
///
/// # Errors
/// `ExecutionError` when the workbook cannot be produced.
#[allow(clippy::cast_precision_loss)]
pub fn items_to_xlsx(items: &[Item]) -> Result<Vec<u8>, CatalogError> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet.set_name("items").map_err(xlsx_error)?;

    for (col, name) in (0u16..).zip(ITEM_EXPORT_COLUMNS) {
        sheet
            .write_string_with_format(0, col, *name, &header)
            .map_err(xlsx_error)?;
    }

    for (row, item) in (1u32..).zip(items) {
        sheet.write_number(row, 0, item.id as f64).map_err(xlsx_error)?;
        sheet.write_string(row, 1, &item.name).map_err(xlsx_error)?;
        if let Some(description) = &item.description {
            sheet.write_string(row, 2, description).map_err(xlsx_error)?;
        }
        sheet.write_number(row, 3, item.price).map_err(xlsx_error)?;
        if let Some(tax) = item.tax {
            sheet.write_number(row, 4, tax).map_err(xlsx_error)?;
        }
        sheet
            .write_string(row, 5, item.created_at.format("%Y-%m-%d %H:%M:%S").to_string())
            .map_err(xlsx_error)?;
    }

    workbook.save_to_buffer().map_err(xlsx_error)
}
