use rusqlite::types::Value;
use rusqlite::{Statement, ToSql};

use crate::error::CatalogError;
use crate::results::ResultSet;
use crate::types::SqlValue;

use super::params::Params;

fn extract_value(row: &rusqlite::Row, idx: usize) -> Result<SqlValue, CatalogError> {
    let value: Value = row.get(idx).map_err(CatalogError::from_sqlite)?;
    Ok(match value {
        Value::Null => SqlValue::Null,
        Value::Integer(i) => SqlValue::Int(i),
        Value::Real(f) => SqlValue::Float(f),
        Value::Text(s) => SqlValue::Text(s),
        Value::Blob(b) => SqlValue::Blob(b),
    })
}

/// Step a prepared statement to completion, collecting every row it yields.
///
/// Works for plain SELECTs and for DML with a `RETURNING` clause.
///
/// # Errors
/// Returns `CatalogError` if execution or value extraction fails.
pub fn build_result_set(stmt: &mut Statement, params: &[Value]) -> Result<ResultSet, CatalogError> {
    let param_refs: Vec<&dyn ToSql> = params.iter().map(|v| v as &dyn ToSql).collect();
    let column_names: Vec<String> = stmt
        .column_names()
        .iter()
        .map(std::string::ToString::to_string)
        .collect();
    let col_count = column_names.len();

    let mut result_set = ResultSet::with_capacity(10);
    result_set.set_column_names(std::sync::Arc::new(column_names));

    let mut rows_iter = stmt
        .query(&param_refs[..])
        .map_err(CatalogError::from_sqlite)?;
    while let Some(row) = rows_iter.next().map_err(CatalogError::from_sqlite)? {
        let mut row_values = Vec::with_capacity(col_count);
        for i in 0..col_count {
            row_values.push(extract_value(row, i)?);
        }
        result_set.add_row_values(row_values);
    }

    Ok(result_set)
}

/// Execute a statement that yields no rows and return the affected row count.
///
/// # Errors
/// Returns `CatalogError` if preparation or execution fails.
pub fn execute_statement(
    conn: &rusqlite::Connection,
    sql: &str,
    params: &[Value],
) -> Result<usize, CatalogError> {
    let mut stmt = conn.prepare_cached(sql).map_err(CatalogError::from_sqlite)?;
    stmt.execute(rusqlite::params_from_iter(params.iter()))
        .map_err(CatalogError::from_sqlite)
}

/// Run a row-returning statement with caller arguments, logging the statement on failure.
///
/// # Errors
/// Returns the classified `CatalogError` from the driver.
pub fn query_with_args(
    conn: &rusqlite::Connection,
    sql: &str,
    args: &[SqlValue],
) -> Result<ResultSet, CatalogError> {
    let params = Params::convert(args);
    let outcome = conn
        .prepare_cached(sql)
        .map_err(CatalogError::from_sqlite)
        .and_then(|mut stmt| build_result_set(&mut stmt, params.as_values()));
    outcome.inspect_err(|err| log_failed_statement(sql, args, err))
}

/// Run a statement that yields no rows, logging the statement on failure.
///
/// # Errors
/// Returns the classified `CatalogError` from the driver.
pub fn execute_with_args(
    conn: &rusqlite::Connection,
    sql: &str,
    args: &[SqlValue],
) -> Result<usize, CatalogError> {
    let params = Params::convert(args);
    execute_statement(conn, sql, params.as_values())
        .inspect_err(|err| log_failed_statement(sql, args, err))
}

fn log_failed_statement(sql: &str, args: &[SqlValue], err: &CatalogError) {
    tracing::error!(%sql, args = ?args, error = %err, "statement failed");
}
