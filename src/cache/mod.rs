//! Generic caching layer for catalog reads.
//!
//! This module provides a storefront-agnostic caching mechanism that:
//! - Stores values with their insertion time and judges freshness against a TTL
//! - Bounds each cache by evicting the earliest-inserted key (FIFO, not LRU)
//! - Reads through to the network on a miss or stale entry
//! - Provides basic offline mode (serve stale cache when the network fails)

mod clock;
mod layer;
mod store;
mod traits;

pub use clock::{Clock, ManualClock, SystemClock};
pub use layer::SharedCache;
pub use store::{CacheEntry, CacheStore, Lookup};
pub use traits::{CacheResult, CacheSource};
