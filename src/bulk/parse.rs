use std::collections::HashMap;
use std::io::Cursor;

use calamine::{Data, Reader, open_workbook_auto_from_rs};

use crate::error::CatalogError;

/// Extensions accepted for upload, compared case-insensitively.
pub const ACCEPTED_EXTENSIONS: &[&str] = &["xlsx", "xls"];

/// One data row of the uploaded sheet, keyed by normalised header name.
#[derive(Debug, Clone)]
pub struct RawRow {
    /// Spreadsheet row number; the header is row 1.
    pub row_number: usize,
    cells: HashMap<String, Data>,
}

#[allow(clippy::cast_possible_truncation)]
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

impl RawRow {
    #[must_use]
    pub fn new(row_number: usize, cells: HashMap<String, Data>) -> Self {
        Self { row_number, cells }
    }

    /// Trimmed cell text; empty cells and blank strings are `None`.
    #[must_use]
    pub fn text(&self, column: &str) -> Option<String> {
        let text = match self.cells.get(column)? {
            Data::Empty | Data::Error(_) => return None,
            Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.trim().to_string(),
            Data::Int(i) => i.to_string(),
            Data::Float(f) => format_number(*f),
            Data::Bool(b) => b.to_string(),
            Data::DateTime(dt) => format_number(dt.as_f64()),
        };
        (!text.is_empty()).then_some(text)
    }

    /// Numeric cell value. Text cells are parsed.
    ///
    /// # Errors
    /// Returns a reason string when the cell holds something that is not a number.
    #[allow(clippy::cast_precision_loss)]
    pub fn number(&self, column: &str) -> Result<Option<f64>, String> {
        match self.cells.get(column) {
            None | Some(Data::Empty) => Ok(None),
            Some(Data::Float(f)) => Ok(Some(*f)),
            Some(Data::Int(i)) => Ok(Some(*i as f64)),
            Some(Data::String(s)) if s.trim().is_empty() => Ok(None),
            Some(Data::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(Some)
                .ok_or_else(|| format!("{column} must be a number")),
            Some(_) => Err(format!("{column} must be a number")),
        }
    }

    fn is_blank(&self) -> bool {
        self.cells
            .values()
            .all(|cell| match cell {
                Data::Empty => true,
                Data::String(s) => s.trim().is_empty(),
                _ => false,
            })
    }
}

/// Reject files whose extension is not an accepted spreadsheet format.
///
/// # Errors
/// `UnsupportedFormat` with the offending name.
pub fn check_extension(filename: &str) -> Result<(), CatalogError> {
    let accepted = std::path::Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            ACCEPTED_EXTENSIONS
                .iter()
                .any(|accepted| ext.eq_ignore_ascii_case(accepted))
        });
    if accepted {
        Ok(())
    } else {
        Err(CatalogError::UnsupportedFormat(format!(
            "'{filename}' is not an Excel file (.xlsx or .xls)"
        )))
    }
}

/// Read the first sheet: header row first, then every non-blank data row.
///
/// # Errors
/// `UnsupportedFormat` for a bad extension or unreadable workbook, `MissingColumns` when a
/// required header is absent, `EmptyInput` when no data rows remain.
pub fn parse_rows(
    filename: &str,
    content: Vec<u8>,
    required: &[&str],
) -> Result<Vec<RawRow>, CatalogError> {
    check_extension(filename)?;
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(content))
        .map_err(|e| CatalogError::UnsupportedFormat(format!("cannot read workbook: {e}")))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(CatalogError::EmptyInput)?
        .map_err(|e| CatalogError::UnsupportedFormat(format!("cannot read first sheet: {e}")))?;

    let first_row = range.start().map_or(0, |(row, _)| row as usize);
    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Err(CatalogError::EmptyInput);
    };
    let headers: Vec<String> = header
        .iter()
        .map(|cell| cell.to_string().trim().to_ascii_lowercase())
        .collect();

    let missing: Vec<String> = required
        .iter()
        .filter(|column| !headers.iter().any(|h| h == *column))
        .map(|column| (*column).to_string())
        .collect();
    if !missing.is_empty() {
        return Err(CatalogError::MissingColumns(missing));
    }

    let parsed: Vec<RawRow> = rows
        .enumerate()
        .map(|(idx, cells)| {
            let cells = headers
                .iter()
                .zip(cells.iter())
                .filter(|(name, _)| !name.is_empty())
                .map(|(name, cell)| (name.clone(), cell.clone()))
                .collect();
            // +1 for the header, +1 because sheet rows are 1-based
            RawRow::new(first_row + idx + 2, cells)
        })
        .filter(|row| !row.is_blank())
        .collect();
    if parsed.is_empty() {
        return Err(CatalogError::EmptyInput);
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[(&str, Data)]) -> RawRow {
        RawRow::new(
            2,
            cells
                .iter()
                .map(|(k, v)| ((*k).to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn extensions_are_checked_case_insensitively() {
        assert!(check_extension("items.XLSX").is_ok());
        assert!(check_extension("items.xls").is_ok());
        assert!(matches!(
            check_extension("items.csv"),
            Err(CatalogError::UnsupportedFormat(_))
        ));
        assert!(check_extension("no_extension").is_err());
    }

    #[test]
    fn numbers_accept_numeric_text() {
        let r = row(&[
            ("price", Data::String(" 12.5 ".into())),
            ("tax", Data::Int(3)),
            ("bad", Data::String("cheap".into())),
        ]);
        assert_eq!(r.number("price"), Ok(Some(12.5)));
        assert_eq!(r.number("tax"), Ok(Some(3.0)));
        assert_eq!(r.number("missing"), Ok(None));
        assert!(r.number("bad").is_err());
    }

    #[test]
    fn whole_floats_render_without_fraction() {
        let r = row(&[("name", Data::Float(42.0)), ("blank", Data::String("  ".into()))]);
        assert_eq!(r.text("name").as_deref(), Some("42"));
        assert_eq!(r.text("blank"), None);
    }
}
