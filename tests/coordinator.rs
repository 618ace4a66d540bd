//! Cache-aside stores against call-counting storage doubles

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use parking_lot::Mutex;
use roster::cache::{
  CacheConfig, CacheContext, CachePolicySection, CacheStore, CachedDepartmentStore,
  CachedEmployeeStore, TtlLruCache,
};
use roster::db::{DepartmentStore, EmployeeStore, SqlSanitizeError, StorageError, StorageResult};
use roster::types::{Department, Employee};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const HOUR: Duration = Duration::from_secs(3600);

fn employee(id: i32, name: &str, department_id: Option<i32>) -> Employee {
  Employee {
    id,
    name: name.to_string(),
    email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
    department_id,
    salary: BigDecimal::from_str("55000.00").unwrap(),
    hire_date: NaiveDate::from_ymd_opt(2020, 1, 15).unwrap(),
    phone: None,
    address: None,
  }
}

fn department(id: i32, name: &str) -> Department {
  Department {
    id,
    name: name.to_string(),
    location: Some("Building A".to_string()),
    manager_id: None,
  }
}

/// In-memory storage that counts every call and can be switched to failing.
#[derive(Default)]
struct CountingStore {
  employees: Mutex<HashMap<i32, Employee>>,
  departments: Mutex<Vec<Department>>,
  find_by_id_calls: AtomicUsize,
  search_calls: AtomicUsize,
  search_terms: Mutex<Vec<String>>,
  by_department_calls: AtomicUsize,
  find_all_calls: AtomicUsize,
  department_calls: AtomicUsize,
  failing: std::sync::atomic::AtomicBool,
}

impl CountingStore {
  fn with_employees(employees: Vec<Employee>) -> Self {
    let store = Self::default();
    for e in employees {
      store.employees.lock().insert(e.id, e);
    }
    store
  }

  fn fail(&self) -> StorageResult<()> {
    if self.failing.load(Ordering::SeqCst) {
      // any storage error works; input errors need no live connection
      Err(StorageError::Input(SqlSanitizeError::NullByteInTerm))
    } else {
      Ok(())
    }
  }
}

#[async_trait]
impl EmployeeStore for CountingStore {
  async fn find_by_id(&self, id: i32) -> StorageResult<Option<Employee>> {
    self.find_by_id_calls.fetch_add(1, Ordering::SeqCst);
    self.fail()?;
    Ok(self.employees.lock().get(&id).cloned())
  }

  async fn search_by_name(&self, term: &str) -> StorageResult<Vec<Employee>> {
    self.search_calls.fetch_add(1, Ordering::SeqCst);
    self.search_terms.lock().push(term.to_string());
    self.fail()?;
    let term = term.to_lowercase();
    let mut found: Vec<Employee> = self
      .employees
      .lock()
      .values()
      .filter(|e| e.name.to_lowercase().starts_with(&term))
      .cloned()
      .collect();
    found.sort_by_key(|e| e.id);
    Ok(found)
  }

  async fn find_by_department_id(&self, department_id: i32) -> StorageResult<Vec<Employee>> {
    self.by_department_calls.fetch_add(1, Ordering::SeqCst);
    self.fail()?;
    let mut found: Vec<Employee> = self
      .employees
      .lock()
      .values()
      .filter(|e| e.department_id == Some(department_id))
      .cloned()
      .collect();
    found.sort_by_key(|e| e.id);
    Ok(found)
  }

  async fn count_by_department_id(&self, department_id: i32) -> StorageResult<i64> {
    Ok(self.find_by_department_id(department_id).await?.len() as i64)
  }

  async fn total_count(&self) -> StorageResult<i64> {
    self.fail()?;
    Ok(self.employees.lock().len() as i64)
  }
}

#[async_trait]
impl DepartmentStore for CountingStore {
  async fn find_all(&self) -> StorageResult<Vec<Department>> {
    self.find_all_calls.fetch_add(1, Ordering::SeqCst);
    self.fail()?;
    Ok(self.departments.lock().clone())
  }

  async fn find_by_id(&self, id: i32) -> StorageResult<Option<Department>> {
    self.department_calls.fetch_add(1, Ordering::SeqCst);
    self.fail()?;
    Ok(self.departments.lock().iter().find(|d| d.id == id).cloned())
  }
}

fn employee_store(
  store: Arc<CountingStore>,
) -> (
  CachedEmployeeStore<CountingStore>,
  Arc<TtlLruCache<i32, Employee>>,
  Arc<TtlLruCache<String, Vec<Employee>>>,
) {
  let by_id = Arc::new(TtlLruCache::new("employees", 100, HOUR));
  let search = Arc::new(TtlLruCache::new("search", 100, HOUR));
  let cached = CachedEmployeeStore::new(store, by_id.clone(), search.clone());
  (cached, by_id, search)
}

// =============================================================================
// Employee lookups
// =============================================================================

#[tokio::test]
async fn test_repeated_lookup_hits_storage_once() {
  let store = Arc::new(CountingStore::with_employees(vec![employee(
    42,
    "Jane Doe",
    Some(1),
  )]));
  let (cached, by_id, _) = employee_store(store.clone());

  let first = cached.find_by_id(42).await.unwrap().unwrap();
  let second = cached.find_by_id(42).await.unwrap().unwrap();

  assert_eq!(first, second);
  assert_eq!(first.name, "Jane Doe");
  assert_eq!(store.find_by_id_calls.load(Ordering::SeqCst), 1);

  let stats = by_id.stats();
  assert_eq!(stats.hits, 1);
  assert_eq!(stats.misses, 1);
}

#[tokio::test]
async fn test_missing_employee_is_not_cached() {
  let store = Arc::new(CountingStore::default());
  let (cached, by_id, _) = employee_store(store.clone());

  assert_eq!(cached.find_by_id(7).await.unwrap(), None);
  assert_eq!(cached.find_by_id(7).await.unwrap(), None);
  assert_eq!(store.find_by_id_calls.load(Ordering::SeqCst), 2);
  assert_eq!(by_id.stats().current_size, 0);

  // appears once storage has it
  store.employees.lock().insert(7, employee(7, "Late Arrival", None));
  assert!(cached.find_by_id(7).await.unwrap().is_some());
}

#[tokio::test]
async fn test_cached_employee_is_served_stale_within_ttl() {
  let store = Arc::new(CountingStore::with_employees(vec![employee(
    1,
    "Original Name",
    None,
  )]));
  let (cached, _, _) = employee_store(store.clone());

  cached.find_by_id(1).await.unwrap();
  store
    .employees
    .lock()
    .insert(1, employee(1, "Renamed", None));

  let served = cached.find_by_id(1).await.unwrap().unwrap();
  assert_eq!(served.name, "Original Name");
}

#[tokio::test]
async fn test_expired_employee_is_reloaded() {
  let store = Arc::new(CountingStore::with_employees(vec![employee(1, "Ann", None)]));
  let by_id = Arc::new(TtlLruCache::new("employees", 10, Duration::from_millis(30)));
  let search = Arc::new(TtlLruCache::new("search", 10, HOUR));
  let cached = CachedEmployeeStore::new(store.clone(), by_id, search);

  cached.find_by_id(1).await.unwrap();
  tokio::time::sleep(Duration::from_millis(50)).await;
  cached.find_by_id(1).await.unwrap();
  assert_eq!(store.find_by_id_calls.load(Ordering::SeqCst), 2);
}

// =============================================================================
// Search
// =============================================================================

#[tokio::test]
async fn test_search_terms_share_normalized_key() {
  let store = Arc::new(CountingStore::with_employees(vec![
    employee(1, "John Smith", None),
    employee(2, "Johanna Lee", None),
    employee(3, "Mary John", None),
  ]));
  let (cached, _, search) = employee_store(store.clone());

  let upper = cached.search_by_name("John").await.unwrap();
  let lower = cached.search_by_name("john").await.unwrap();
  let shout = cached.search_by_name("JOHN").await.unwrap();

  assert_eq!(upper, lower);
  assert_eq!(lower, shout);
  assert_eq!(upper.len(), 1);
  assert_eq!(upper[0].id, 1);
  assert_eq!(store.search_calls.load(Ordering::SeqCst), 1);
  assert_eq!(store.search_terms.lock().as_slice(), ["john".to_string()]);
  assert_eq!(search.stats().hits, 2);
}

#[tokio::test]
async fn test_empty_search_result_is_not_cached() {
  let store = Arc::new(CountingStore::default());
  let (cached, _, search) = employee_store(store.clone());

  assert!(cached.search_by_name("zed").await.unwrap().is_empty());
  assert!(cached.search_by_name("Zed").await.unwrap().is_empty());
  assert_eq!(store.search_calls.load(Ordering::SeqCst), 2);
  assert_eq!(search.stats().current_size, 0);
}

#[tokio::test]
async fn test_employee_added_after_empty_search_is_found() {
  let store = Arc::new(CountingStore::default());
  let (cached, _, _) = employee_store(store.clone());

  assert!(cached.search_by_name("zoe").await.unwrap().is_empty());
  store.employees.lock().insert(7, employee(7, "Zoe Zane", None));

  let found = cached.search_by_name("zoe").await.unwrap();
  assert_eq!(found.len(), 1);
  assert_eq!(found[0].name, "Zoe Zane");

  // now non-empty, so the next search is served from cache
  cached.search_by_name("ZOE").await.unwrap();
  assert_eq!(store.search_calls.load(Ordering::SeqCst), 2);
}

// =============================================================================
// Uncached operations and errors
// =============================================================================

#[tokio::test]
async fn test_department_listing_of_employees_is_uncached() {
  let store = Arc::new(CountingStore::with_employees(vec![
    employee(1, "A", Some(3)),
    employee(2, "B", Some(3)),
    employee(3, "C", Some(4)),
  ]));
  let (cached, _, _) = employee_store(store.clone());

  assert_eq!(cached.find_by_department_id(3).await.unwrap().len(), 2);
  assert_eq!(cached.find_by_department_id(3).await.unwrap().len(), 2);
  assert_eq!(store.by_department_calls.load(Ordering::SeqCst), 2);
  assert_eq!(cached.count_by_department_id(4).await.unwrap(), 1);
  assert_eq!(cached.total_count().await.unwrap(), 3);
}

#[tokio::test]
async fn test_storage_error_passes_through_and_caches_nothing() {
  let store = Arc::new(CountingStore::with_employees(vec![employee(5, "Eve", None)]));
  store.failing.store(true, Ordering::SeqCst);
  let (cached, by_id, search) = employee_store(store.clone());

  let err = cached.find_by_id(5).await.unwrap_err();
  assert!(matches!(
    err,
    StorageError::Input(SqlSanitizeError::NullByteInTerm)
  ));
  assert!(cached.search_by_name("eve").await.is_err());
  assert_eq!(by_id.stats().current_size, 0);
  assert_eq!(search.stats().current_size, 0);

  store.failing.store(false, Ordering::SeqCst);
  assert!(cached.find_by_id(5).await.unwrap().is_some());
}

// =============================================================================
// Departments
// =============================================================================

#[tokio::test]
async fn test_department_list_and_lookup_are_cached() {
  let store = Arc::new(CountingStore::default());
  *store.departments.lock() = vec![department(1, "Engineering"), department(2, "Sales")];
  let ctx = CacheContext::new(&CacheConfig::default());
  let cached = CachedDepartmentStore::from_context(store.clone(), &ctx);

  assert_eq!(cached.find_all().await.unwrap().len(), 2);
  assert_eq!(cached.find_all().await.unwrap().len(), 2);
  assert_eq!(store.find_all_calls.load(Ordering::SeqCst), 1);

  assert_eq!(
    DepartmentStore::find_by_id(&cached, 2).await.unwrap().unwrap().name,
    "Sales"
  );
  DepartmentStore::find_by_id(&cached, 2).await.unwrap();
  assert_eq!(store.department_calls.load(Ordering::SeqCst), 1);

  assert!(DepartmentStore::find_by_id(&cached, 99).await.unwrap().is_none());
  assert!(DepartmentStore::find_by_id(&cached, 99).await.unwrap().is_none());
  assert_eq!(store.department_calls.load(Ordering::SeqCst), 3);

  let report = ctx.report();
  assert_eq!(report.department_list.stats.hits, 1);
  assert_eq!(report.departments.stats.hits, 1);
  assert_eq!(report.departments.stats.misses, 3);
}

#[tokio::test]
async fn test_empty_department_list_is_not_cached() {
  let store = Arc::new(CountingStore::default());
  let ctx = CacheContext::new(&CacheConfig::default());
  let cached = CachedDepartmentStore::from_context(store.clone(), &ctx);

  assert!(cached.find_all().await.unwrap().is_empty());
  *store.departments.lock() = vec![department(1, "Engineering")];
  assert_eq!(cached.find_all().await.unwrap().len(), 1);
  assert_eq!(cached.find_all().await.unwrap().len(), 1);

  assert_eq!(store.find_all_calls.load(Ordering::SeqCst), 2);
  assert_eq!(ctx.report().department_list.stats.hits, 1);
}

// =============================================================================
// Cache context
// =============================================================================

#[tokio::test]
async fn test_clear_all_empties_caches_and_keeps_counters() {
  let store = Arc::new(CountingStore::with_employees(vec![employee(1, "Ada", None)]));
  *store.departments.lock() = vec![department(1, "Research")];
  let ctx = CacheContext::new(&CacheConfig::default());
  let employees = CachedEmployeeStore::from_context(store.clone(), &ctx);
  let departments = CachedDepartmentStore::from_context(store.clone(), &ctx);

  EmployeeStore::find_by_id(&employees, 1).await.unwrap();
  EmployeeStore::find_by_id(&employees, 1).await.unwrap();
  employees.search_by_name("ad").await.unwrap();
  departments.find_all().await.unwrap();
  DepartmentStore::find_by_id(&departments, 1).await.unwrap();

  ctx.clear_all();

  let report = ctx.report();
  assert_eq!(report.employees.stats.current_size, 0);
  assert_eq!(report.departments.stats.current_size, 0);
  assert_eq!(report.department_list.stats.current_size, 0);
  assert_eq!(report.search.stats.current_size, 0);
  assert_eq!(report.employees.stats.hits, 1);
  assert_eq!(report.employees.stats.misses, 1);
  assert_eq!(report.employees.hit_rate, 0.5);

  EmployeeStore::find_by_id(&employees, 1).await.unwrap();
  assert_eq!(store.find_by_id_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_context_honors_configured_policies() {
  let config = CacheConfig {
    employee: CachePolicySection {
      max_entries: Some(2),
      ttl_minutes: None,
    },
    ..Default::default()
  };
  let store = Arc::new(CountingStore::with_employees(vec![
    employee(1, "A", None),
    employee(2, "B", None),
    employee(3, "C", None),
  ]));
  let ctx = CacheContext::new(&config);
  let cached = CachedEmployeeStore::from_context(store, &ctx);

  for id in 1..=3 {
    EmployeeStore::find_by_id(&cached, id).await.unwrap();
  }

  let report = ctx.report();
  assert_eq!(report.employees.stats.max_entries, 2);
  assert_eq!(report.employees.stats.current_size, 2);
  assert_eq!(report.employees.stats.evictions, 1);
  assert_eq!(report.search.stats.max_entries, 5_000);
}

#[tokio::test]
async fn test_janitor_disabled_when_interval_is_zero() {
  let config = CacheConfig {
    janitor_interval_secs: 0,
    ..Default::default()
  };
  let ctx = Arc::new(CacheContext::new(&config));
  let (tx, _) = tokio::sync::broadcast::channel(1);
  assert!(ctx.spawn_janitor(tx.subscribe()).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_janitor_purges_expired_entries_and_stops_on_shutdown() {
  // zero TTL: every entry is expired as soon as it is stored
  let config = CacheConfig {
    employee: CachePolicySection {
      max_entries: None,
      ttl_minutes: Some(0),
    },
    janitor_interval_secs: 1,
    ..Default::default()
  };
  let ctx = Arc::new(CacheContext::new(&config));
  ctx.employees().put(1, employee(1, "Ada", None));
  ctx.employees().put(2, employee(2, "Bob", None));
  assert_eq!(ctx.report().employees.stats.current_size, 2);

  let (tx, _) = tokio::sync::broadcast::channel(1);
  let handle = ctx.spawn_janitor(tx.subscribe()).unwrap();

  tokio::time::sleep(Duration::from_secs(2)).await;

  let stats = ctx.report().employees.stats;
  assert_eq!(stats.current_size, 0);
  assert_eq!(stats.expired, 2);
  assert_eq!(stats.requests, 0);

  tx.send(()).unwrap();
  tokio::time::timeout(Duration::from_secs(5), handle)
    .await
    .unwrap()
    .unwrap();
}
