use crate::types::SqlValue;

use super::QueryPlan;

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// `INSERT INTO table (cols) VALUES (?, ...) RETURNING returning`
#[must_use]
pub fn insert_returning(
    table: &'static str,
    columns: &[&'static str],
    values: Vec<SqlValue>,
    returning: &'static str,
) -> QueryPlan {
    debug_assert_eq!(columns.len(), values.len());
    let sql = format!(
        "INSERT INTO {table} ({}) VALUES ({}) RETURNING {returning}",
        columns.join(", "),
        placeholders(columns.len())
    );
    QueryPlan { sql, args: values }
}

/// Multi-row insert; arguments are flattened row by row.
#[must_use]
pub fn insert_many(
    table: &'static str,
    columns: &[&'static str],
    rows: &[Vec<SqlValue>],
) -> QueryPlan {
    let tuple = format!("({})", placeholders(columns.len()));
    let sql = format!(
        "INSERT INTO {table} ({}) VALUES {}",
        columns.join(", "),
        vec![tuple.as_str(); rows.len()].join(", ")
    );
    let args = rows.iter().flat_map(|row| row.iter().cloned()).collect();
    QueryPlan { sql, args }
}

/// Partial update: each column becomes `COALESCE(?, column)`, so a `Null` argument keeps
/// the stored value.
#[must_use]
pub fn update_coalesce(
    table: &'static str,
    assignments: Vec<(&'static str, SqlValue)>,
    key_column: &'static str,
    key: SqlValue,
    returning: &'static str,
) -> QueryPlan {
    let set_list: Vec<String> = assignments
        .iter()
        .map(|(column, _)| format!("{column} = COALESCE(?, {column})"))
        .collect();
    let sql = format!(
        "UPDATE {table} SET {} WHERE {key_column} = ? RETURNING {returning}",
        set_list.join(", ")
    );
    let mut args: Vec<SqlValue> = assignments.into_iter().map(|(_, value)| value).collect();
    args.push(key);
    QueryPlan { sql, args }
}

#[must_use]
pub fn delete_by_key(table: &'static str, key_column: &'static str, key: SqlValue) -> QueryPlan {
    QueryPlan {
        sql: format!("DELETE FROM {table} WHERE {key_column} = ?"),
        args: vec![key],
    }
}

/// `column IN (?, ...)`; an empty list renders a condition that matches nothing.
#[must_use]
pub fn in_list(column: &'static str, values: Vec<SqlValue>) -> (String, Vec<SqlValue>) {
    if values.is_empty() {
        return ("1 = 0".to_string(), values);
    }
    (format!("{column} IN ({})", placeholders(values.len())), values)
}
