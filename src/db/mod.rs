mod backend;
pub mod decode;
mod postgres;
pub mod sanitize;
mod sqlite;

pub use backend::{
  DatabaseBackend, DepartmentStore, EmployeeStore, ReportStore, SqlDialect, StorageError,
  StorageResult,
};
pub use postgres::PostgresBackend;
pub use sanitize::{like_prefix_pattern, normalize_search_term, SqlSanitizeError};
pub use sqlite::SqliteBackend;
