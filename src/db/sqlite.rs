use async_trait::async_trait;
use bigdecimal::{BigDecimal, ToPrimitive};
use rusqlite::{params, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use super::backend::{
  DatabaseBackend, DepartmentStore, EmployeeStore, ReportStore, SqlDialect, StorageError,
  StorageResult,
};
use super::decode::{parse_date, round_money, zero_money};
use super::sanitize::{like_prefix_pattern, normalize_search_term};
use crate::types::{
  Department, Employee, HireYearCount, NewDepartment, NewEmployee, SalaryStats,
};

const PRAGMAS: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA cache_size = -64000;
PRAGMA temp_store = MEMORY;
"#;

// Salaries are stored as integer cents so MIN/MAX/SUM stay exact.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS departments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    location TEXT,
    manager_id INTEGER
);

CREATE TABLE IF NOT EXISTS employees (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    name_lower TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    department_id INTEGER,
    salary_cents INTEGER NOT NULL,
    hire_date TEXT NOT NULL,
    phone TEXT,
    address TEXT
);
CREATE INDEX IF NOT EXISTS idx_employees_department ON employees(department_id);
CREATE INDEX IF NOT EXISTS idx_employees_name_lower ON employees(name_lower);
"#;

const EMPLOYEE_COLUMNS: &str =
  "id, name, email, department_id, salary_cents, hire_date, phone, address";

const DEPARTMENT_COLUMNS: &str = "id, name, location, manager_id";

/// Employee row as read inside the connection thread, decoded afterwards.
struct EmployeeRow {
  id: i32,
  name: String,
  email: String,
  department_id: Option<i32>,
  salary_cents: i64,
  hire_date: String,
  phone: Option<String>,
  address: Option<String>,
}

impl EmployeeRow {
  fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id: row.get(0)?,
      name: row.get(1)?,
      email: row.get(2)?,
      department_id: row.get(3)?,
      salary_cents: row.get(4)?,
      hire_date: row.get(5)?,
      phone: row.get(6)?,
      address: row.get(7)?,
    })
  }
}

impl TryFrom<EmployeeRow> for Employee {
  type Error = StorageError;

  fn try_from(row: EmployeeRow) -> StorageResult<Self> {
    Ok(Employee {
      id: row.id,
      name: row.name,
      email: row.email,
      department_id: row.department_id,
      salary: cents_to_money(row.salary_cents),
      hire_date: parse_date("hire_date", &row.hire_date)?,
      phone: row.phone,
      address: row.address,
    })
  }
}

fn row_to_department(row: &Row<'_>) -> rusqlite::Result<Department> {
  Ok(Department {
    id: row.get(0)?,
    name: row.get(1)?,
    location: row.get(2)?,
    manager_id: row.get(3)?,
  })
}

fn cents_to_money(cents: i64) -> BigDecimal {
  round_money(BigDecimal::from(cents) / BigDecimal::from(100))
}

fn money_to_cents(value: &BigDecimal) -> StorageResult<i64> {
  (round_money(value.clone()) * BigDecimal::from(100))
    .to_i64()
    .ok_or_else(|| StorageError::decode("salary", format!("{} out of range", value)))
}

fn decode_employees(rows: Vec<EmployeeRow>) -> StorageResult<Vec<Employee>> {
  rows.into_iter().map(Employee::try_from).collect()
}

pub struct SqliteBackend {
  conn: Connection,
}

impl SqliteBackend {
  pub async fn new(path: &str) -> Result<Self, anyhow::Error> {
    let conn = if path == ":memory:" {
      Connection::open_in_memory().await?
    } else {
      Connection::open(path).await?
    };

    conn
      .call(|conn| conn.execute_batch(PRAGMAS).map_err(|e| e.into()))
      .await?;

    Ok(Self { conn })
  }

  pub async fn in_memory() -> Result<Self, anyhow::Error> {
    Self::new(":memory:").await
  }

  async fn query_employees(
    &self,
    sql: String,
    param: rusqlite::types::Value,
  ) -> StorageResult<Vec<Employee>> {
    let rows = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt
          .query_map(params![param], EmployeeRow::read)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    decode_employees(rows)
  }

  async fn query_count(&self, sql: &'static str, department_id: Option<i32>) -> StorageResult<i64> {
    let count = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare_cached(sql)?;
        let count: i64 = match department_id {
          Some(id) => stmt.query_row(params![id], |r| r.get(0))?,
          None => stmt.query_row([], |r| r.get(0))?,
        };
        Ok(count)
      })
      .await?;
    Ok(count)
  }

  /// Average salary, computed exactly from the summed cents.
  async fn salary_average(&self, department_id: Option<i32>) -> StorageResult<BigDecimal> {
    let (sum, count): (Option<i64>, i64) = self
      .conn
      .call(move |conn| {
        let pair = match department_id {
          Some(id) => conn.query_row(
            "SELECT SUM(salary_cents), COUNT(*) FROM employees WHERE department_id = ?1",
            params![id],
            |r| Ok((r.get(0)?, r.get(1)?)),
          )?,
          None => conn.query_row(
            "SELECT SUM(salary_cents), COUNT(*) FROM employees",
            [],
            |r| Ok((r.get(0)?, r.get(1)?)),
          )?,
        };
        Ok(pair)
      })
      .await?;
    Ok(average_of_cents(sum, count))
  }
}

fn average_of_cents(sum: Option<i64>, count: i64) -> BigDecimal {
  match sum {
    Some(sum) if count > 0 => {
      round_money(BigDecimal::from(sum) / BigDecimal::from(100) / BigDecimal::from(count))
    }
    _ => zero_money(),
  }
}

#[async_trait]
impl EmployeeStore for SqliteBackend {
  async fn find_by_id(&self, id: i32) -> StorageResult<Option<Employee>> {
    let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = ?1");
    let row = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare_cached(&sql)?;
        let row = stmt.query_row(params![id], EmployeeRow::read).optional()?;
        Ok(row)
      })
      .await?;
    row.map(Employee::try_from).transpose()
  }

  async fn search_by_name(&self, term: &str) -> StorageResult<Vec<Employee>> {
    let pattern = like_prefix_pattern(term)?;
    let sql = format!(
      "SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE name_lower LIKE ?1 ESCAPE '\\' ORDER BY id"
    );
    self.query_employees(sql, pattern.into()).await
  }

  async fn find_by_department_id(&self, department_id: i32) -> StorageResult<Vec<Employee>> {
    let sql = format!(
      "SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE department_id = ?1 ORDER BY id"
    );
    self.query_employees(sql, department_id.into()).await
  }

  async fn count_by_department_id(&self, department_id: i32) -> StorageResult<i64> {
    self
      .query_count(
        "SELECT COUNT(*) FROM employees WHERE department_id = ?1",
        Some(department_id),
      )
      .await
  }

  async fn total_count(&self) -> StorageResult<i64> {
    self.query_count("SELECT COUNT(*) FROM employees", None).await
  }
}

#[async_trait]
impl DepartmentStore for SqliteBackend {
  async fn find_all(&self) -> StorageResult<Vec<Department>> {
    let sql = format!("SELECT {DEPARTMENT_COLUMNS} FROM departments ORDER BY id");
    let departments = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt
          .query_map([], row_to_department)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(departments)
  }

  async fn find_by_id(&self, id: i32) -> StorageResult<Option<Department>> {
    let sql = format!("SELECT {DEPARTMENT_COLUMNS} FROM departments WHERE id = ?1");
    let department = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare_cached(&sql)?;
        let row = stmt.query_row(params![id], row_to_department).optional()?;
        Ok(row)
      })
      .await?;
    Ok(department)
  }
}

#[async_trait]
impl ReportStore for SqliteBackend {
  async fn salary_stats_by_department(&self, department_id: i32) -> StorageResult<SalaryStats> {
    let (min, max, sum, count): (Option<i64>, Option<i64>, Option<i64>, i64) = self
      .conn
      .call(move |conn| {
        let stats = conn.query_row(
          "SELECT MIN(salary_cents), MAX(salary_cents), SUM(salary_cents), COUNT(*)
           FROM employees WHERE department_id = ?1",
          params![department_id],
          |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
        )?;
        Ok(stats)
      })
      .await?;
    Ok(SalaryStats {
      min_salary: min.map(cents_to_money),
      max_salary: max.map(cents_to_money),
      average_salary: average_of_cents(sum, count),
      employee_count: count,
    })
  }

  async fn hire_years_by_department(
    &self,
    department_id: i32,
  ) -> StorageResult<Vec<HireYearCount>> {
    let years = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare_cached(
          "SELECT CAST(strftime('%Y', hire_date) AS INTEGER) AS hire_year, COUNT(*)
           FROM employees WHERE department_id = ?1
           GROUP BY hire_year ORDER BY hire_year",
        )?;
        let rows = stmt
          .query_map(params![department_id], |r| {
            Ok(HireYearCount {
              year: r.get(0)?,
              count: r.get(1)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(years)
  }

  async fn average_salary(&self) -> StorageResult<BigDecimal> {
    self.salary_average(None).await
  }

  async fn average_salary_by_department(&self, department_id: i32) -> StorageResult<BigDecimal> {
    self.salary_average(Some(department_id)).await
  }
}

#[async_trait]
impl DatabaseBackend for SqliteBackend {
  fn dialect(&self) -> SqlDialect {
    SqlDialect::Sqlite
  }

  async fn init_schema(&self) -> StorageResult<()> {
    self
      .conn
      .call(|conn| conn.execute_batch(SCHEMA).map_err(|e| e.into()))
      .await?;
    tracing::info!("SQLite schema initialized");
    Ok(())
  }

  async fn drop_schema(&self) -> StorageResult<()> {
    self
      .conn
      .call(|conn| {
        conn
          .execute_batch(
            "DROP TABLE IF EXISTS employees;
         DROP TABLE IF EXISTS departments;",
          )
          .map_err(|e| e.into())
      })
      .await?;
    Ok(())
  }

  async fn insert_department(&self, department: NewDepartment) -> StorageResult<Department> {
    let name = department.name.clone();
    let location = department.location.clone();
    let manager_id = department.manager_id;
    let id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO departments (name, location, manager_id) VALUES (?1, ?2, ?3)",
          params![name, location, manager_id],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;
    let id = i32::try_from(id).map_err(|e| StorageError::decode("id", e))?;
    Ok(department.into_department(id))
  }

  async fn insert_employee(&self, employee: NewEmployee) -> StorageResult<Employee> {
    let salary_cents = money_to_cents(&employee.salary)?;
    let name = employee.name.clone();
    let name_lower = normalize_search_term(&employee.name);
    let email = employee.email.clone();
    let department_id = employee.department_id;
    let hire_date = employee.hire_date.format("%Y-%m-%d").to_string();
    let phone = employee.phone.clone();
    let address = employee.address.clone();

    let id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO employees
             (name, name_lower, email, department_id, salary_cents, hire_date, phone, address)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          params![
            name,
            name_lower,
            email,
            department_id,
            salary_cents,
            hire_date,
            phone,
            address
          ],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;
    let id = i32::try_from(id).map_err(|e| StorageError::decode("id", e))?;
    Ok(employee.into_employee(id))
  }
}
