//! Client-side synchronization layer for a catalog storefront API.
//!
//! Caches catalog reads with TTL and FIFO eviction, keeps the signed-in session,
//! applies cart and wishlist changes optimistically with exact rollback, and
//! reconciles local state with the server after sign-in.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod notice;
pub mod session;
pub mod sync;

#[cfg(test)]
mod testing;

pub use error::{SyncError, SyncResult};
pub use sync::SyncLayer;
