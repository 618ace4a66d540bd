//! Per-cache sizing and freshness policy

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Capacity and TTL of one cache instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
  pub max_entries: usize,
  pub ttl: Duration,
}

impl CachePolicy {
  pub const fn new(max_entries: usize, ttl_minutes: u64) -> Self {
    Self {
      max_entries,
      ttl: Duration::from_secs(ttl_minutes.saturating_mul(60)),
    }
  }

  pub const EMPLOYEE: Self = Self::new(50_000, 5);
  pub const DEPARTMENT: Self = Self::new(10, 30);
  pub const DEPARTMENT_LIST: Self = Self::new(1, 30);
  pub const SEARCH: Self = Self::new(5_000, 2);
}

/// YAML shape of one cache policy. Omitted fields fall back to the cache's default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CachePolicySection {
  #[serde(default)]
  pub max_entries: Option<usize>,
  #[serde(default)]
  pub ttl_minutes: Option<u64>,
}

impl CachePolicySection {
  pub fn resolve(&self, default: CachePolicy) -> CachePolicy {
    CachePolicy {
      max_entries: self.max_entries.unwrap_or(default.max_entries),
      ttl: self
        .ttl_minutes
        .map(|m| Duration::from_secs(m.saturating_mul(60)))
        .unwrap_or(default.ttl),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
  #[serde(default)]
  pub employee: CachePolicySection,
  #[serde(default)]
  pub department: CachePolicySection,
  #[serde(default)]
  pub department_list: CachePolicySection,
  #[serde(default)]
  pub search: CachePolicySection,
  /// How often expired entries are purged (0 disables the janitor)
  #[serde(default = "default_janitor_interval")]
  pub janitor_interval_secs: u64,
}

fn default_janitor_interval() -> u64 {
  60
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      employee: CachePolicySection::default(),
      department: CachePolicySection::default(),
      department_list: CachePolicySection::default(),
      search: CachePolicySection::default(),
      janitor_interval_secs: default_janitor_interval(),
    }
  }
}

impl CacheConfig {
  pub fn employee_policy(&self) -> CachePolicy {
    self.employee.resolve(CachePolicy::EMPLOYEE)
  }

  pub fn department_policy(&self) -> CachePolicy {
    self.department.resolve(CachePolicy::DEPARTMENT)
  }

  pub fn department_list_policy(&self) -> CachePolicy {
    self.department_list.resolve(CachePolicy::DEPARTMENT_LIST)
  }

  pub fn search_policy(&self) -> CachePolicy {
    self.search.resolve(CachePolicy::SEARCH)
  }

  pub fn janitor_interval(&self) -> Option<Duration> {
    (self.janitor_interval_secs > 0).then(|| Duration::from_secs(self.janitor_interval_secs))
  }
}
