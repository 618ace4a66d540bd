use async_trait::async_trait;
use thiserror::Error;

use super::sanitize::SqlSanitizeError;
use crate::types::{
  Department, Employee, HireYearCount, NewDepartment, NewEmployee, SalaryStats,
};

/// Failure of the relational store. Never produced by a cache; a cached lookup
/// that fails surfaces exactly this error.
#[derive(Debug, Error)]
pub enum StorageError {
  #[error("connection pool error: {0}")]
  Pool(#[from] deadpool_postgres::PoolError),
  #[error("postgres error: {0}")]
  Postgres(#[from] tokio_postgres::Error),
  #[error("sqlite error: {0}")]
  Sqlite(#[from] tokio_rusqlite::Error),
  #[error("invalid query input: {0}")]
  Input(#[from] SqlSanitizeError),
  #[error("cannot decode column {column}: {reason}")]
  Decode { column: &'static str, reason: String },
}

impl StorageError {
  pub fn decode(column: &'static str, reason: impl std::fmt::Display) -> Self {
    Self::Decode {
      column,
      reason: reason.to_string(),
    }
  }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// SQL dialect of a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
  Postgres,
  Sqlite,
}

/// Read queries over employees.
#[async_trait]
pub trait EmployeeStore: Send + Sync {
  async fn find_by_id(&self, id: i32) -> StorageResult<Option<Employee>>;

  /// Case-insensitive match against the start of the name (not a substring).
  async fn search_by_name(&self, term: &str) -> StorageResult<Vec<Employee>>;

  async fn find_by_department_id(&self, department_id: i32) -> StorageResult<Vec<Employee>>;

  async fn count_by_department_id(&self, department_id: i32) -> StorageResult<i64>;

  async fn total_count(&self) -> StorageResult<i64>;
}

/// Read queries over departments.
#[async_trait]
pub trait DepartmentStore: Send + Sync {
  /// All departments, ordered by id
  async fn find_all(&self) -> StorageResult<Vec<Department>>;

  async fn find_by_id(&self, id: i32) -> StorageResult<Option<Department>>;
}

/// Aggregates backing the reporting endpoints. Never cached.
#[async_trait]
pub trait ReportStore: Send + Sync {
  async fn salary_stats_by_department(&self, department_id: i32) -> StorageResult<SalaryStats>;

  /// Employee count per hire year, ascending by year
  async fn hire_years_by_department(&self, department_id: i32)
    -> StorageResult<Vec<HireYearCount>>;

  /// Company-wide average salary rounded half-up to two digits; zero when empty.
  async fn average_salary(&self) -> StorageResult<bigdecimal::BigDecimal>;

  /// Average salary within one department; zero when it has no employees.
  async fn average_salary_by_department(
    &self,
    department_id: i32,
  ) -> StorageResult<bigdecimal::BigDecimal>;
}

/// Abstract database backend: schema lifecycle, inserts, and every read query.
#[async_trait]
pub trait DatabaseBackend: EmployeeStore + DepartmentStore + ReportStore {
  fn dialect(&self) -> SqlDialect;

  async fn init_schema(&self) -> StorageResult<()>;
  async fn drop_schema(&self) -> StorageResult<()>;

  async fn insert_department(&self, department: NewDepartment) -> StorageResult<Department>;
  async fn insert_employee(&self, employee: NewEmployee) -> StorageResult<Employee>;
}
