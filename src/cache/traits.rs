//! Result metadata for cached reads.

use chrono::{DateTime, Utc};

/// A read result tagged with its provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheResult<T> {
  /// The value returned to the caller
  pub data: T,
  /// Network, fresh cache hit, or stale fallback
  pub source: CacheSource,
  /// Insertion time of the cached entry; `None` for network data
  pub cached_at: Option<DateTime<Utc>>,
}

impl<T> CacheResult<T> {
  /// Fresh data straight from the network.
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      cached_at: None,
    }
  }

  /// A fresh cache hit.
  pub fn from_cache(data: T, cached_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Cache,
      cached_at: Some(cached_at),
    }
  }

  /// Stale data served because the refetch failed.
  pub fn offline(data: T, cached_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Offline,
      cached_at: Some(cached_at),
    }
  }

  /// True when the caller must warn that the data may be out of date.
  pub fn is_degraded(&self) -> bool {
    self.source == CacheSource::Offline
  }

  pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CacheResult<U> {
    CacheResult {
      data: f(self.data),
      source: self.source,
      cached_at: self.cached_at,
    }
  }
}

/// Provenance of a read result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fetched from the network just now
  Network,
  /// Served from cache within its TTL
  Cache,
  /// Network failed; serving an expired cache entry
  Offline,
}
