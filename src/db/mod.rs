//! Durable key/value storage for the session and cache snapshots.

mod sqlite;

pub use sqlite::SqliteStore;

use color_eyre::{eyre::eyre, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Storage keys. Everything under these is user-scoped and wiped on logout.
pub mod keys {
  pub const SESSION: &str = "session";
  pub const PAGE_CACHE: &str = "cache.pages";
  pub const DETAIL_CACHE: &str = "cache.details";
  pub const CATEGORY_CACHE: &str = "cache.categories";

  pub const ALL: [&str; 4] = [SESSION, PAGE_CACHE, DETAIL_CACHE, CATEGORY_CACHE];
}

/// Trait for persistence backends.
pub trait PersistentStore: Send + Sync {
  /// Raw bytes stored under `key`, if any.
  fn load(&self, key: &str) -> Result<Option<Vec<u8>>>;

  /// Insert or replace a single key.
  fn save(&self, key: &str, value: &[u8]) -> Result<()>;

  /// Remove every listed key in one atomic step.
  fn remove_all(&self, keys: &[&str]) -> Result<()>;
}

/// Deserialize the JSON document under `key`.
///
/// Returns `Ok(None)` for an absent key and an error for a present but malformed one,
/// leaving it to the caller to decide whether to discard it.
pub fn load_json<T: DeserializeOwned>(store: &dyn PersistentStore, key: &str) -> Result<Option<T>> {
  match store.load(key)? {
    Some(bytes) => serde_json::from_slice(&bytes)
      .map(Some)
      .map_err(|e| eyre!("Failed to parse stored {}: {}", key, e)),
    None => Ok(None),
  }
}

pub fn save_json<T: Serialize>(store: &dyn PersistentStore, key: &str, value: &T) -> Result<()> {
  let bytes = serde_json::to_vec(value).map_err(|e| eyre!("Failed to serialize {}: {}", key, e))?;
  store.save(key, &bytes)
}

/// Process-local store. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
  entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

impl PersistentStore for MemoryStore {
  fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
    let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
    Ok(entries.get(key).cloned())
  }

  fn save(&self, key: &str, value: &[u8]) -> Result<()> {
    let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
    entries.insert(key.to_string(), value.to_vec());
    Ok(())
  }

  fn remove_all(&self, keys: &[&str]) -> Result<()> {
    let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
    for key in keys {
      entries.remove(*key);
    }
    Ok(())
  }
}
