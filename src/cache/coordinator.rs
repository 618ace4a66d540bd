//! Cache-aside stores: check the cache, fall back to storage, populate on success.
//! Absence (`None` or an empty list) is never cached.

use async_trait::async_trait;
use std::sync::Arc;

use super::context::{CacheContext, DEPARTMENT_LIST_KEY};
use super::store::CacheStore;
use crate::db::{normalize_search_term, DepartmentStore, EmployeeStore, StorageResult};
use crate::types::{Department, Employee};

/// Employee lookups served through the by-id and search caches.
pub struct CachedEmployeeStore<S: ?Sized> {
  store: Arc<S>,
  by_id: Arc<dyn CacheStore<i32, Employee>>,
  search: Arc<dyn CacheStore<String, Vec<Employee>>>,
}

impl<S: ?Sized + EmployeeStore> CachedEmployeeStore<S> {
  pub fn new(
    store: Arc<S>,
    by_id: Arc<dyn CacheStore<i32, Employee>>,
    search: Arc<dyn CacheStore<String, Vec<Employee>>>,
  ) -> Self {
    Self {
      store,
      by_id,
      search,
    }
  }

  pub fn from_context(store: Arc<S>, ctx: &CacheContext) -> Self {
    Self::new(store, ctx.employees(), ctx.search())
  }
}

#[async_trait]
impl<S: ?Sized + EmployeeStore> EmployeeStore for CachedEmployeeStore<S> {
  async fn find_by_id(&self, id: i32) -> StorageResult<Option<Employee>> {
    if let Some(employee) = self.by_id.get(&id) {
      tracing::debug!(id, "employee cache hit");
      return Ok(Some(employee));
    }
    tracing::debug!(id, "employee cache miss");

    let found = self.store.find_by_id(id).await?;
    if let Some(employee) = &found {
      self.by_id.put(id, employee.clone());
    }
    Ok(found)
  }

  async fn search_by_name(&self, term: &str) -> StorageResult<Vec<Employee>> {
    let key = normalize_search_term(term);
    if let Some(results) = self.search.get(&key) {
      tracing::debug!(term = %key, "search cache hit");
      return Ok(results);
    }
    tracing::debug!(term = %key, "search cache miss");

    let results = self.store.search_by_name(&key).await?;
    if !results.is_empty() {
      self.search.put(key, results.clone());
    }
    Ok(results)
  }

  async fn find_by_department_id(&self, department_id: i32) -> StorageResult<Vec<Employee>> {
    self.store.find_by_department_id(department_id).await
  }

  async fn count_by_department_id(&self, department_id: i32) -> StorageResult<i64> {
    self.store.count_by_department_id(department_id).await
  }

  async fn total_count(&self) -> StorageResult<i64> {
    self.store.total_count().await
  }
}

/// Department lookups served through the by-id and list caches.
pub struct CachedDepartmentStore<S: ?Sized> {
  store: Arc<S>,
  by_id: Arc<dyn CacheStore<i32, Department>>,
  list: Arc<dyn CacheStore<&'static str, Vec<Department>>>,
}

impl<S: ?Sized + DepartmentStore> CachedDepartmentStore<S> {
  pub fn new(
    store: Arc<S>,
    by_id: Arc<dyn CacheStore<i32, Department>>,
    list: Arc<dyn CacheStore<&'static str, Vec<Department>>>,
  ) -> Self {
    Self { store, by_id, list }
  }

  pub fn from_context(store: Arc<S>, ctx: &CacheContext) -> Self {
    Self::new(store, ctx.departments(), ctx.department_list())
  }
}

#[async_trait]
impl<S: ?Sized + DepartmentStore> DepartmentStore for CachedDepartmentStore<S> {
  async fn find_all(&self) -> StorageResult<Vec<Department>> {
    if let Some(departments) = self.list.get(&DEPARTMENT_LIST_KEY) {
      tracing::debug!("department list cache hit");
      return Ok(departments);
    }
    tracing::debug!("department list cache miss");

    let departments = self.store.find_all().await?;
    if !departments.is_empty() {
      self.list.put(DEPARTMENT_LIST_KEY, departments.clone());
    }
    Ok(departments)
  }

  async fn find_by_id(&self, id: i32) -> StorageResult<Option<Department>> {
    if let Some(department) = self.by_id.get(&id) {
      tracing::debug!(id, "department cache hit");
      return Ok(Some(department));
    }
    tracing::debug!(id, "department cache miss");

    let found = self.store.find_by_id(id).await?;
    if let Some(department) = &found {
      self.by_id.put(id, department.clone());
    }
    Ok(found)
  }
}
