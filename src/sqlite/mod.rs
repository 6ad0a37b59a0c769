// SQLite glue shared by the pool, the unit of work and plain connections:
// - params: argument conversion into rusqlite values
// - query: statement execution and result extraction

pub mod params;
pub mod query;

pub use params::{Params, sql_value_to_sqlite};
pub use query::{build_result_set, execute_statement, execute_with_args, query_with_args};
