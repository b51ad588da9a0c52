//! Cache layer that orchestrates cache lookups with network fetching.

use chrono::Duration;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

use super::clock::Clock;
use super::store::{CacheEntry, CacheStore, Lookup};
use super::traits::CacheResult;
use crate::error::SyncResult;

/// A `CacheStore` shared between the sync layer's read paths.
///
/// Cloning is cheap and every clone sees the same entries. The lock is only held for
/// the duration of a lookup or insert, never across a fetch.
pub struct SharedCache<K, V> {
  name: &'static str,
  store: Arc<Mutex<CacheStore<K, V>>>,
}

impl<K, V> SharedCache<K, V>
where
  K: Eq + Hash + Clone + std::fmt::Debug,
  V: Clone,
{
  pub fn new(name: &'static str, ttl: Duration, capacity: usize, clock: Arc<dyn Clock>) -> Self {
    Self {
      name,
      store: Arc::new(Mutex::new(CacheStore::new(ttl, capacity, clock))),
    }
  }

  pub fn name(&self) -> &'static str {
    self.name
  }

  fn lock(&self) -> MutexGuard<'_, CacheStore<K, V>> {
    self.store.lock().unwrap_or_else(PoisonError::into_inner)
  }

  pub fn get(&self, key: &K) -> Lookup<V> {
    self.lock().get(key)
  }

  pub fn put(&self, key: K, value: V) {
    let evicted = self.lock().put(key, value);
    if !evicted.is_empty() {
      debug!(cache = self.name, ?evicted, "Evicted oldest cache entries");
    }
  }

  pub fn remove(&self, key: &K) -> Option<V> {
    self.lock().remove(key)
  }

  pub fn len(&self) -> usize {
    self.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.lock().is_empty()
  }

  pub fn invalidate_all(&self) {
    self.lock().invalidate_all();
  }

  pub fn snapshot(&self) -> Vec<(K, CacheEntry<V>)> {
    self.lock().snapshot()
  }

  pub fn restore(&self, snapshot: Vec<(K, CacheEntry<V>)>) {
    self.lock().restore(snapshot);
  }

  /// Read through the cache.
  ///
  /// 1. Fresh hit: return immediately, no network.
  /// 2. Stale or missing: fetch, store, return network data.
  /// 3. Fetch failed but a stale entry exists: return it marked `Offline`.
  /// 4. Fetch failed with nothing cached: propagate the error.
  pub async fn fetch<F, Fut>(&self, key: K, fetcher: F) -> SyncResult<CacheResult<V>>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = SyncResult<V>>,
  {
    let lookup = self.get(&key);

    if let Lookup::Fresh(value) = lookup {
      debug!(cache = self.name, ?key, "Cache hit");
      let cached_at = self.lock().inserted_at(&key).unwrap_or_default();
      return Ok(CacheResult::from_cache(value, cached_at));
    }

    debug!(cache = self.name, ?key, stale = lookup.is_stale(), "Cache miss, fetching");
    match fetcher().await {
      Ok(value) => {
        self.put(key, value.clone());
        Ok(CacheResult::from_network(value))
      }
      Err(err) => match lookup {
        Lookup::Stale { value, inserted_at } => {
          warn!(cache = self.name, ?key, error = %err, "Refetch failed, serving stale entry");
          Ok(CacheResult::offline(value, inserted_at))
        }
        _ => Err(err),
      },
    }
  }
}

impl<K, V> Clone for SharedCache<K, V> {
  fn clone(&self) -> Self {
    Self {
      name: self.name,
      store: Arc::clone(&self.store),
    }
  }
}
