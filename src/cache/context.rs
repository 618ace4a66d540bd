use serde::{Deserialize, Serialize};
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::config::{CacheConfig, CachePolicy};
use super::store::{CacheStats, CacheStore, TtlLruCache};
use crate::types::{Department, Employee};

/// Key of the single entry held by the department-list cache
pub const DEPARTMENT_LIST_KEY: &str = "all";

pub type EmployeeCache = TtlLruCache<i32, Employee>;
pub type DepartmentCache = TtlLruCache<i32, Department>;
pub type DepartmentListCache = TtlLruCache<&'static str, Vec<Department>>;
pub type SearchCache = TtlLruCache<String, Vec<Employee>>;

/// Statistics of one named cache, with derived rates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSummary {
  #[serde(flatten)]
  pub stats: CacheStats,
  pub hit_rate: f64,
  pub miss_rate: f64,
}

impl From<CacheStats> for CacheSummary {
  fn from(stats: CacheStats) -> Self {
    Self {
      hit_rate: stats.hit_rate(),
      miss_rate: stats.miss_rate(),
      stats,
    }
  }
}

/// Snapshot of every cache owned by a [`CacheContext`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheReport {
  pub employees: CacheSummary,
  pub departments: CacheSummary,
  pub department_list: CacheSummary,
  pub search: CacheSummary,
}

impl CacheReport {
  fn entries(&self) -> [(&'static str, &CacheSummary); 4] {
    [
      ("employees", &self.employees),
      ("departments", &self.departments),
      ("department_list", &self.department_list),
      ("search", &self.search),
    ]
  }

  pub fn log(&self) {
    for (name, summary) in self.entries() {
      tracing::info!(
        "Cache {}: {} requests, {:.1}% hits, {} evictions, {} expired, {}/{} entries",
        name,
        summary.stats.requests,
        summary.hit_rate * 100.0,
        summary.stats.evictions,
        summary.stats.expired,
        summary.stats.current_size,
        summary.stats.max_entries
      );
    }
  }
}

/// Owns the four caches of the data-access layer.
///
/// Built once at startup and handed to the cached stores; `close` ends its life.
pub struct CacheContext {
  employees: Arc<EmployeeCache>,
  departments: Arc<DepartmentCache>,
  department_list: Arc<DepartmentListCache>,
  search: Arc<SearchCache>,
  janitor_interval: Option<Duration>,
}

fn build<K: Hash + Eq, V>(name: &'static str, policy: CachePolicy) -> Arc<TtlLruCache<K, V>> {
  tracing::info!(
    "Cache {} created: max {} entries, ttl {}s",
    name,
    policy.max_entries,
    policy.ttl.as_secs()
  );
  Arc::new(TtlLruCache::new(name, policy.max_entries, policy.ttl))
}

impl CacheContext {
  pub fn new(config: &CacheConfig) -> Self {
    Self {
      employees: build("employees", config.employee_policy()),
      departments: build("departments", config.department_policy()),
      department_list: build("department_list", config.department_list_policy()),
      search: build("search", config.search_policy()),
      janitor_interval: config.janitor_interval(),
    }
  }

  pub fn employees(&self) -> Arc<EmployeeCache> {
    self.employees.clone()
  }

  pub fn departments(&self) -> Arc<DepartmentCache> {
    self.departments.clone()
  }

  pub fn department_list(&self) -> Arc<DepartmentListCache> {
    self.department_list.clone()
  }

  pub fn search(&self) -> Arc<SearchCache> {
    self.search.clone()
  }

  pub fn report(&self) -> CacheReport {
    CacheReport {
      employees: self.employees.stats().into(),
      departments: self.departments.stats().into(),
      department_list: self.department_list.stats().into(),
      search: self.search.stats().into(),
    }
  }

  /// Empty every cache. Counters keep accumulating.
  pub fn clear_all(&self) {
    self.employees.invalidate_all();
    self.departments.invalidate_all();
    self.department_list.invalidate_all();
    self.search.invalidate_all();
    tracing::info!("All caches cleared");
  }

  /// Drop expired entries from every cache
  pub fn purge_expired(&self) -> usize {
    self.employees.purge_expired()
      + self.departments.purge_expired()
      + self.department_list.purge_expired()
      + self.search.purge_expired()
  }

  /// Periodically purge expired entries until `shutdown` fires.
  /// Returns `None` when the janitor is disabled by configuration.
  pub fn spawn_janitor(
    self: &Arc<Self>,
    mut shutdown: broadcast::Receiver<()>,
  ) -> Option<JoinHandle<()>> {
    let interval = self.janitor_interval?;
    let ctx = self.clone();
    Some(tokio::spawn(async move {
      let mut ticker = tokio::time::interval(interval);
      ticker.tick().await;
      loop {
        tokio::select! {
          _ = ticker.tick() => {
            let purged = ctx.purge_expired();
            if purged > 0 {
              tracing::debug!("Cache janitor purged {} expired entries", purged);
            }
          }
          _ = shutdown.recv() => {
            tracing::debug!("Cache janitor stopping");
            break;
          }
        }
      }
    }))
  }

  /// Log final statistics and release every entry
  pub fn close(&self) {
    self.report().log();
    self.clear_all();
  }
}
