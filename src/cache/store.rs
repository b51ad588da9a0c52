//! Bounded, TTL-aware in-memory cache with FIFO eviction.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::Arc;

use super::clock::Clock;

/// A cached value and the instant it was inserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<V> {
  pub value: V,
  pub inserted_at: DateTime<Utc>,
}

/// Outcome of a cache lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<V> {
  /// Present and younger than the TTL.
  Fresh(V),
  /// Present but expired. Usable only as a degraded fallback.
  Stale {
    value: V,
    inserted_at: DateTime<Utc>,
  },
  /// Never stored (or evicted/invalidated).
  Miss,
}

impl<V> Lookup<V> {
  pub fn is_fresh(&self) -> bool {
    matches!(self, Lookup::Fresh(_))
  }

  pub fn is_stale(&self) -> bool {
    matches!(self, Lookup::Stale { .. })
  }

  pub fn is_miss(&self) -> bool {
    matches!(self, Lookup::Miss)
  }

  /// The value regardless of freshness.
  pub fn into_value(self) -> Option<V> {
    match self {
      Lookup::Fresh(v) | Lookup::Stale { value: v, .. } => Some(v),
      Lookup::Miss => None,
    }
  }
}

/// Keyed store of `CacheEntry`s.
///
/// Eviction is by insertion order, not access order: once the store grows past its
/// capacity the earliest-inserted key is dropped. Overwriting a key counts as a fresh
/// insertion and moves it to the back of the queue.
pub struct CacheStore<K, V> {
  entries: HashMap<K, CacheEntry<V>>,
  order: VecDeque<K>,
  ttl: Duration,
  capacity: usize,
  clock: Arc<dyn Clock>,
}

impl<K, V> CacheStore<K, V>
where
  K: Eq + Hash + Clone,
  V: Clone,
{
  pub fn new(ttl: Duration, capacity: usize, clock: Arc<dyn Clock>) -> Self {
    Self {
      entries: HashMap::new(),
      order: VecDeque::new(),
      ttl,
      capacity: capacity.max(1),
      clock,
    }
  }

  pub fn ttl(&self) -> Duration {
    self.ttl
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  fn is_fresh(&self, inserted_at: DateTime<Utc>) -> bool {
    self.clock.now() - inserted_at < self.ttl
  }

  pub fn get(&self, key: &K) -> Lookup<V> {
    match self.entries.get(key) {
      Some(entry) if self.is_fresh(entry.inserted_at) => Lookup::Fresh(entry.value.clone()),
      Some(entry) => Lookup::Stale {
        value: entry.value.clone(),
        inserted_at: entry.inserted_at,
      },
      None => Lookup::Miss,
    }
  }

  pub fn inserted_at(&self, key: &K) -> Option<DateTime<Utc>> {
    self.entries.get(key).map(|e| e.inserted_at)
  }

  /// Insert or overwrite `key`, stamping it with the current time.
  ///
  /// Returns the keys evicted to get back under capacity.
  pub fn put(&mut self, key: K, value: V) -> Vec<K> {
    let inserted_at = self.clock.now();
    if self.entries.contains_key(&key) {
      self.order.retain(|k| k != &key);
    }
    self.entries.insert(key.clone(), CacheEntry { value, inserted_at });
    self.order.push_back(key);
    self.evict_overflow()
  }

  fn evict_overflow(&mut self) -> Vec<K> {
    let mut evicted = Vec::new();
    while self.entries.len() > self.capacity {
      match self.order.pop_front() {
        Some(oldest) => {
          self.entries.remove(&oldest);
          evicted.push(oldest);
        }
        None => break,
      }
    }
    evicted
  }

  pub fn remove(&mut self, key: &K) -> Option<V> {
    let entry = self.entries.remove(key)?;
    self.order.retain(|k| k != key);
    Some(entry.value)
  }

  pub fn invalidate_all(&mut self) {
    self.entries.clear();
    self.order.clear();
  }

  /// Entries in insertion order, oldest first.
  pub fn snapshot(&self) -> Vec<(K, CacheEntry<V>)> {
    self
      .order
      .iter()
      .filter_map(|k| self.entries.get(k).map(|e| (k.clone(), e.clone())))
      .collect()
  }

  /// Replace the contents with a previously taken snapshot.
  ///
  /// Original timestamps are kept, so restored entries age normally. Duplicate keys keep
  /// their last occurrence, and only the newest `capacity` entries survive.
  pub fn restore(&mut self, snapshot: Vec<(K, CacheEntry<V>)>) {
    self.invalidate_all();
    for (key, entry) in snapshot {
      if self.entries.contains_key(&key) {
        self.order.retain(|k| k != &key);
      }
      self.entries.insert(key.clone(), entry);
      self.order.push_back(key);
    }
    self.evict_overflow();
  }
}
