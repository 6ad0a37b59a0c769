use rusqlite::types::Value;

use crate::types::{SqlValue, TIMESTAMP_FORMAT};

/// Convert a single [`SqlValue`] into a rusqlite `Value`.
#[must_use]
pub fn sql_value_to_sqlite(value: &SqlValue) -> Value {
    match value {
        SqlValue::Int(i) => Value::Integer(*i),
        SqlValue::Float(f) => Value::Real(*f),
        SqlValue::Text(s) => Value::Text(s.clone()),
        SqlValue::Bool(b) => Value::Integer(i64::from(*b)),
        SqlValue::Timestamp(dt) => Value::Text(dt.format(TIMESTAMP_FORMAT).to_string()),
        SqlValue::Null => Value::Null,
        SqlValue::Blob(bytes) => Value::Blob(bytes.clone()),
    }
}

/// Converted positional arguments, in placeholder order.
#[derive(Debug, Clone)]
pub struct Params(pub Vec<Value>);

impl Params {
    #[must_use]
    pub fn convert(args: &[SqlValue]) -> Self {
        Params(args.iter().map(sql_value_to_sqlite).collect())
    }

    #[must_use]
    pub fn as_values(&self) -> &[Value] {
        &self.0
    }
}
