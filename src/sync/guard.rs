//! Per-entity in-flight guard for mutations.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::api::types::ProductId;

/// Independent mutation families. Each has its own pending set, so a wishlist toggle
/// never blocks a cart change for the same product (and vice versa).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
  Cart,
  Wishlist,
}

#[derive(Debug, Default)]
struct PendingSets {
  cart: HashSet<ProductId>,
  wishlist: HashSet<ProductId>,
  /// Bumped by `clear`; tickets from an older epoch release nothing.
  epoch: u64,
}

impl PendingSets {
  fn set_mut(&mut self, kind: MutationKind) -> &mut HashSet<ProductId> {
    match kind {
      MutationKind::Cart => &mut self.cart,
      MutationKind::Wishlist => &mut self.wishlist,
    }
  }

  fn set(&self, kind: MutationKind) -> &HashSet<ProductId> {
    match kind {
      MutationKind::Cart => &self.cart,
      MutationKind::Wishlist => &self.wishlist,
    }
  }
}

/// Tracks which `(kind, product)` pairs have a mutation in flight.
///
/// Acquisition hands out a `PendingTicket`; dropping the ticket releases the entry, so
/// every exit path of a mutation (success, failure, early return) lets go of it.
#[derive(Debug, Clone, Default)]
pub struct PendingOperationGuard {
  inner: Arc<Mutex<PendingSets>>,
}

impl PendingOperationGuard {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> MutexGuard<'_, PendingSets> {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Mark `(kind, id)` as in flight. `None` if it already is; the caller must no-op.
  pub fn try_acquire(&self, kind: MutationKind, id: ProductId) -> Option<PendingTicket> {
    let mut sets = self.lock();
    if !sets.set_mut(kind).insert(id) {
      return None;
    }
    Some(PendingTicket {
      guard: self.clone(),
      kind,
      id,
      epoch: sets.epoch,
    })
  }

  pub fn is_pending(&self, kind: MutationKind, id: ProductId) -> bool {
    self.lock().set(kind).contains(&id)
  }

  pub fn pending_count(&self, kind: MutationKind) -> usize {
    self.lock().set(kind).len()
  }

  pub fn is_empty(&self) -> bool {
    let sets = self.lock();
    sets.cart.is_empty() && sets.wishlist.is_empty()
  }

  /// Forget every pending entry. Outstanding tickets become inert.
  pub fn clear(&self) {
    let mut sets = self.lock();
    sets.cart.clear();
    sets.wishlist.clear();
    sets.epoch += 1;
  }

  fn release(&self, kind: MutationKind, id: ProductId, epoch: u64) {
    let mut sets = self.lock();
    if sets.epoch == epoch {
      sets.set_mut(kind).remove(&id);
    }
  }
}

/// Proof of a held `(kind, product)` slot. Released on drop.
#[derive(Debug)]
pub struct PendingTicket {
  guard: PendingOperationGuard,
  kind: MutationKind,
  id: ProductId,
  epoch: u64,
}

impl PendingTicket {
  pub fn kind(&self) -> MutationKind {
    self.kind
  }

  pub fn product_id(&self) -> ProductId {
    self.id
  }

  /// Release explicitly. Equivalent to dropping the ticket.
  pub fn release(self) {}
}

impl Drop for PendingTicket {
  fn drop(&mut self) {
    self.guard.release(self.kind, self.id, self.epoch);
  }
}
