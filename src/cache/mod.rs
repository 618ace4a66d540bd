mod config;
mod context;
mod coordinator;
mod entry;
mod store;

pub use config::{CacheConfig, CachePolicy, CachePolicySection};
pub use context::{
  CacheContext, CacheReport, CacheSummary, DepartmentCache, DepartmentListCache, EmployeeCache,
  SearchCache, DEPARTMENT_LIST_KEY,
};
pub use coordinator::{CachedDepartmentStore, CachedEmployeeStore};
pub use entry::CacheEntry;
pub use store::{CacheStats, CacheStore, TtlLruCache};
