use axum::{
  extract::{Path, Query, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  routing::get,
  Json, Router,
};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::cache::{CacheContext, CacheReport, CachedDepartmentStore, CachedEmployeeStore};
use crate::db::{DatabaseBackend, DepartmentStore, EmployeeStore, ReportStore, StorageError};
use crate::types::{Department, Employee, HireYearCount, SalaryStats};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
  pub employees: Arc<dyn EmployeeStore>,
  pub departments: Arc<dyn DepartmentStore>,
  /// Uncached access for the reporting aggregates
  pub backend: Arc<dyn DatabaseBackend>,
  pub caches: Arc<CacheContext>,
}

impl AppState {
  /// Route employee and department reads through the caches of `caches`
  pub fn new(backend: Arc<dyn DatabaseBackend>, caches: Arc<CacheContext>) -> Self {
    Self {
      employees: Arc::new(CachedEmployeeStore::from_context(backend.clone(), &caches)),
      departments: Arc::new(CachedDepartmentStore::from_context(backend.clone(), &caches)),
      backend,
      caches,
    }
  }
}

pub fn router(state: AppState, cors_origins: &[String]) -> Router {
  let cors = if cors_origins.is_empty() || cors_origins.iter().any(|o| o == "*") {
    CorsLayer::permissive()
  } else {
    let origins: Vec<_> = cors_origins.iter().filter_map(|o| o.parse().ok()).collect();
    CorsLayer::new()
      .allow_origin(origins)
      .allow_methods(Any)
      .allow_headers(Any)
  };

  Router::new()
    .route("/health", get(health_check))
    .route("/api/employees/search", get(api_search_employees))
    .route("/api/employees/{id}", get(api_get_employee))
    .route("/api/departments", get(api_list_departments))
    .route("/api/departments/{id}", get(api_get_department))
    .route(
      "/api/departments/{id}/employees",
      get(api_department_employees),
    )
    .route(
      "/api/reports/employee-profile/{id}",
      get(api_employee_profile),
    )
    .route(
      "/api/reports/department-analytics/{id}",
      get(api_department_analytics),
    )
    .route("/api/dashboard/company-overview", get(api_company_overview))
    .route("/api/cache/stats", get(api_cache_stats))
    .route("/api/cache", axum::routing::delete(api_clear_caches))
    .layer(cors)
    .with_state(state)
}

fn parse_id(raw: &str) -> Result<i32, AppError> {
  raw
    .parse()
    .map_err(|_| AppError::BadRequest(format!("Invalid id: {}", raw)))
}

async fn health_check() -> Json<serde_json::Value> {
  Json(serde_json::json!({ "status": "ok" }))
}

async fn api_get_employee(
  State(state): State<AppState>,
  Path(id): Path<String>,
) -> Result<Json<Employee>, AppError> {
  let id = parse_id(&id)?;
  match state.employees.find_by_id(id).await? {
    Some(employee) => Ok(Json(employee)),
    None => Err(AppError::NotFound("Employee not found".into())),
  }
}

#[derive(Deserialize)]
struct SearchParams {
  name: Option<String>,
}

async fn api_search_employees(
  State(state): State<AppState>,
  Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Employee>>, AppError> {
  let name = params
    .name
    .as_deref()
    .map(str::trim)
    .filter(|n| !n.is_empty())
    .ok_or_else(|| AppError::BadRequest("Missing 'name' query parameter".into()))?;
  Ok(Json(state.employees.search_by_name(name).await?))
}

async fn api_list_departments(
  State(state): State<AppState>,
) -> Result<Json<Vec<Department>>, AppError> {
  Ok(Json(state.departments.find_all().await?))
}

async fn api_get_department(
  State(state): State<AppState>,
  Path(id): Path<String>,
) -> Result<Json<Department>, AppError> {
  let id = parse_id(&id)?;
  match state.departments.find_by_id(id).await? {
    Some(department) => Ok(Json(department)),
    None => Err(AppError::NotFound("Department not found".into())),
  }
}

async fn api_department_employees(
  State(state): State<AppState>,
  Path(id): Path<String>,
) -> Result<Json<Vec<Employee>>, AppError> {
  let id = parse_id(&id)?;
  Ok(Json(state.employees.find_by_department_id(id).await?))
}

#[derive(Serialize)]
struct EmployeeProfile {
  employee: Employee,
  department: Option<Department>,
  department_average_salary: Option<BigDecimal>,
}

async fn api_employee_profile(
  State(state): State<AppState>,
  Path(id): Path<String>,
) -> Result<Json<EmployeeProfile>, AppError> {
  let id = parse_id(&id)?;
  let employee = state
    .employees
    .find_by_id(id)
    .await?
    .ok_or_else(|| AppError::NotFound("Employee not found".into()))?;

  let (department, department_average_salary) = match employee.department_id {
    Some(dept_id) => (
      state.departments.find_by_id(dept_id).await?,
      Some(state.backend.average_salary_by_department(dept_id).await?),
    ),
    None => (None, None),
  };

  Ok(Json(EmployeeProfile {
    employee,
    department,
    department_average_salary,
  }))
}

#[derive(Serialize)]
struct DepartmentAnalytics {
  department: Department,
  salary_statistics: SalaryStats,
  employees_by_hire_year: Vec<HireYearCount>,
}

async fn api_department_analytics(
  State(state): State<AppState>,
  Path(id): Path<String>,
) -> Result<Json<DepartmentAnalytics>, AppError> {
  let id = parse_id(&id)?;
  let department = state
    .departments
    .find_by_id(id)
    .await?
    .ok_or_else(|| AppError::NotFound("Department not found".into()))?;

  Ok(Json(DepartmentAnalytics {
    department,
    salary_statistics: state.backend.salary_stats_by_department(id).await?,
    employees_by_hire_year: state.backend.hire_years_by_department(id).await?,
  }))
}

#[derive(Serialize)]
struct CompanyOverview {
  total_employees: i64,
  total_departments: usize,
  average_salary: BigDecimal,
}

async fn api_company_overview(
  State(state): State<AppState>,
) -> Result<Json<CompanyOverview>, AppError> {
  Ok(Json(CompanyOverview {
    total_employees: state.employees.total_count().await?,
    total_departments: state.departments.find_all().await?.len(),
    average_salary: state.backend.average_salary().await?,
  }))
}

async fn api_cache_stats(State(state): State<AppState>) -> Json<CacheReport> {
  Json(state.caches.report())
}

async fn api_clear_caches(State(state): State<AppState>) -> StatusCode {
  state.caches.clear_all();
  StatusCode::NO_CONTENT
}

pub enum AppError {
  Storage(StorageError),
  NotFound(String),
  BadRequest(String),
}

impl From<StorageError> for AppError {
  fn from(e: StorageError) -> Self {
    match e {
      StorageError::Input(e) => Self::BadRequest(e.to_string()),
      e => Self::Storage(e),
    }
  }
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    let (status, msg) = match self {
      Self::Storage(e) => {
        tracing::error!("Storage error: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
      }
      Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
      Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
    };
    (status, Json(serde_json::json!({ "error": msg }))).into_response()
  }
}
