//! Cache entry types

use std::time::{Duration, Instant};

/// A cached value with its insertion time. Age is measured from the last `put`;
/// reads do not extend it.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
  pub value: V,
  pub inserted_at: Instant,
  pub ttl: Duration,
}

impl<V> CacheEntry<V> {
  pub fn new(value: V, ttl: Duration) -> Self {
    Self {
      value,
      inserted_at: Instant::now(),
      ttl,
    }
  }

  pub fn age(&self) -> Duration {
    self.inserted_at.elapsed()
  }

  pub fn is_expired(&self) -> bool {
    self.age() >= self.ttl
  }
}
