use async_trait::async_trait;
use bigdecimal::BigDecimal;
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use tokio_postgres::{NoTls, Row};

use super::backend::{
  DatabaseBackend, DepartmentStore, EmployeeStore, ReportStore, SqlDialect, StorageResult,
};
use super::decode::{parse_money, parse_optional_money, round_money, zero_money};
use super::sanitize::like_prefix_pattern;
use crate::types::{
  Department, Employee, HireYearCount, NewDepartment, NewEmployee, SalaryStats,
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS departments (
    id SERIAL PRIMARY KEY,
    name VARCHAR(100) NOT NULL,
    location VARCHAR(100),
    manager_id INTEGER
);

CREATE TABLE IF NOT EXISTS employees (
    id SERIAL PRIMARY KEY,
    name VARCHAR(100) NOT NULL,
    name_lower VARCHAR(100) GENERATED ALWAYS AS (LOWER(name)) STORED,
    email VARCHAR(255) NOT NULL UNIQUE,
    department_id INTEGER,
    salary NUMERIC(12, 2) NOT NULL,
    hire_date DATE NOT NULL,
    phone VARCHAR(30),
    address VARCHAR(255)
);
CREATE INDEX IF NOT EXISTS idx_employees_department ON employees(department_id);
CREATE INDEX IF NOT EXISTS idx_employees_name_lower ON employees(name_lower text_pattern_ops);
"#;

const EMPLOYEE_COLUMNS: &str =
  "id, name, email, department_id, salary::TEXT, hire_date, phone, address";

const DEPARTMENT_COLUMNS: &str = "id, name, location, manager_id";

pub struct PostgresBackend {
  pool: Pool,
}

impl PostgresBackend {
  pub fn new(url: &str, max_connections: usize) -> Result<Self, anyhow::Error> {
    let mut cfg = Config::new();
    cfg.url = Some(url.into());
    cfg.manager = Some(ManagerConfig {
      recycling_method: RecyclingMethod::Fast,
    });
    cfg.pool = Some(PoolConfig::new(max_connections.max(1)));
    let pool = cfg.create_pool(Some(Runtime::Tokio1), NoTls)?;
    tracing::info!("PostgreSQL pool created (max {} connections)", max_connections);
    Ok(Self { pool })
  }
}

fn row_to_employee(r: &Row) -> StorageResult<Employee> {
  let salary: String = r.try_get(4)?;
  Ok(Employee {
    id: r.try_get(0)?,
    name: r.try_get(1)?,
    email: r.try_get(2)?,
    department_id: r.try_get(3)?,
    salary: parse_money("salary", &salary)?,
    hire_date: r.try_get(5)?,
    phone: r.try_get(6)?,
    address: r.try_get(7)?,
  })
}

fn row_to_department(r: &Row) -> StorageResult<Department> {
  Ok(Department {
    id: r.try_get(0)?,
    name: r.try_get(1)?,
    location: r.try_get(2)?,
    manager_id: r.try_get(3)?,
  })
}

#[async_trait]
impl EmployeeStore for PostgresBackend {
  async fn find_by_id(&self, id: i32) -> StorageResult<Option<Employee>> {
    let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = $1");
    let row = self.pool.get().await?.query_opt(&sql, &[&id]).await?;
    row.as_ref().map(row_to_employee).transpose()
  }

  async fn search_by_name(&self, term: &str) -> StorageResult<Vec<Employee>> {
    let pattern = like_prefix_pattern(term)?;
    let sql = format!(
      "SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE name_lower LIKE $1 ESCAPE '\\' ORDER BY id"
    );
    let rows = self.pool.get().await?.query(&sql, &[&pattern]).await?;
    rows.iter().map(row_to_employee).collect()
  }

  async fn find_by_department_id(&self, department_id: i32) -> StorageResult<Vec<Employee>> {
    let sql = format!(
      "SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE department_id = $1 ORDER BY id"
    );
    let rows = self.pool.get().await?.query(&sql, &[&department_id]).await?;
    rows.iter().map(row_to_employee).collect()
  }

  async fn count_by_department_id(&self, department_id: i32) -> StorageResult<i64> {
    let row = self
      .pool
      .get()
      .await?
      .query_one(
        "SELECT COUNT(*) FROM employees WHERE department_id = $1",
        &[&department_id],
      )
      .await?;
    Ok(row.try_get(0)?)
  }

  async fn total_count(&self) -> StorageResult<i64> {
    let row = self
      .pool
      .get()
      .await?
      .query_one("SELECT COUNT(*) FROM employees", &[])
      .await?;
    Ok(row.try_get(0)?)
  }
}

#[async_trait]
impl DepartmentStore for PostgresBackend {
  async fn find_all(&self) -> StorageResult<Vec<Department>> {
    let sql = format!("SELECT {DEPARTMENT_COLUMNS} FROM departments ORDER BY id");
    let rows = self.pool.get().await?.query(&sql, &[]).await?;
    rows.iter().map(row_to_department).collect()
  }

  async fn find_by_id(&self, id: i32) -> StorageResult<Option<Department>> {
    let sql = format!("SELECT {DEPARTMENT_COLUMNS} FROM departments WHERE id = $1");
    let row = self.pool.get().await?.query_opt(&sql, &[&id]).await?;
    row.as_ref().map(row_to_department).transpose()
  }
}

#[async_trait]
impl ReportStore for PostgresBackend {
  async fn salary_stats_by_department(&self, department_id: i32) -> StorageResult<SalaryStats> {
    let row = self
      .pool
      .get()
      .await?
      .query_one(
        "SELECT MIN(salary)::TEXT, MAX(salary)::TEXT, AVG(salary)::TEXT, COUNT(*)
         FROM employees WHERE department_id = $1",
        &[&department_id],
      )
      .await?;
    Ok(SalaryStats {
      min_salary: parse_optional_money("min_salary", row.try_get(0)?)?,
      max_salary: parse_optional_money("max_salary", row.try_get(1)?)?,
      average_salary: parse_optional_money("average_salary", row.try_get(2)?)?
        .unwrap_or_else(zero_money),
      employee_count: row.try_get(3)?,
    })
  }

  async fn hire_years_by_department(
    &self,
    department_id: i32,
  ) -> StorageResult<Vec<HireYearCount>> {
    let rows = self
      .pool
      .get()
      .await?
      .query(
        "SELECT EXTRACT(YEAR FROM hire_date)::INT AS hire_year, COUNT(*)
         FROM employees WHERE department_id = $1
         GROUP BY hire_year ORDER BY hire_year",
        &[&department_id],
      )
      .await?;
    rows
      .iter()
      .map(|r| -> StorageResult<HireYearCount> {
        Ok(HireYearCount {
          year: r.try_get(0)?,
          count: r.try_get(1)?,
        })
      })
      .collect()
  }

  async fn average_salary(&self) -> StorageResult<BigDecimal> {
    let row = self
      .pool
      .get()
      .await?
      .query_one("SELECT AVG(salary)::TEXT FROM employees", &[])
      .await?;
    let avg: Option<String> = row.try_get(0)?;
    Ok(parse_optional_money("average_salary", avg)?.unwrap_or_else(zero_money))
  }

  async fn average_salary_by_department(&self, department_id: i32) -> StorageResult<BigDecimal> {
    let row = self
      .pool
      .get()
      .await?
      .query_one(
        "SELECT AVG(salary)::TEXT FROM employees WHERE department_id = $1",
        &[&department_id],
      )
      .await?;
    let avg: Option<String> = row.try_get(0)?;
    Ok(parse_optional_money("average_salary", avg)?.unwrap_or_else(zero_money))
  }
}

#[async_trait]
impl DatabaseBackend for PostgresBackend {
  fn dialect(&self) -> SqlDialect {
    SqlDialect::Postgres
  }

  async fn init_schema(&self) -> StorageResult<()> {
    self.pool.get().await?.batch_execute(SCHEMA).await?;
    tracing::info!("PostgreSQL schema initialized");
    Ok(())
  }

  async fn drop_schema(&self) -> StorageResult<()> {
    self
      .pool
      .get()
      .await?
      .batch_execute("DROP TABLE IF EXISTS employees; DROP TABLE IF EXISTS departments;")
      .await?;
    Ok(())
  }

  async fn insert_department(&self, department: NewDepartment) -> StorageResult<Department> {
    let row = self
      .pool
      .get()
      .await?
      .query_one(
        "INSERT INTO departments (name, location, manager_id) VALUES ($1, $2, $3) RETURNING id",
        &[&department.name, &department.location, &department.manager_id],
      )
      .await?;
    Ok(department.into_department(row.try_get(0)?))
  }

  async fn insert_employee(&self, employee: NewEmployee) -> StorageResult<Employee> {
    let salary = round_money(employee.salary.clone()).to_string();
    let row = self
      .pool
      .get()
      .await?
      .query_one(
        "INSERT INTO employees (name, email, department_id, salary, hire_date, phone, address)
         VALUES ($1, $2, $3, CAST($4::TEXT AS NUMERIC), $5, $6, $7) RETURNING id",
        &[
          &employee.name,
          &employee.email,
          &employee.department_id,
          &salary,
          &employee.hire_date,
          &employee.phone,
          &employee.address,
        ],
      )
      .await?;
    Ok(employee.into_employee(row.try_get(0)?))
  }
}
