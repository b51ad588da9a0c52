//! Optimistic cart and wishlist mutations.
//!
//! Every entry point follows the same protocol: acquire the per-entity guard, snapshot
//! the affected product's entry, apply the change locally, send it, then either keep the
//! change or put that one entry back exactly as it was.

use tracing::{debug, warn};

use super::guard::MutationKind;
use super::state::LocalState;
use super::SyncLayer;
use crate::api::types::{LineUpsert, Product, ProductId};
use crate::api::StorefrontApi;
use crate::error::{SyncError, SyncResult};

/// A local change in intent form. Both variants travel over the same upsert endpoint
/// but are kept apart here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
  /// Quantity 0 removes the line.
  SetQuantity { product_id: ProductId, quantity: u32 },
  SetWishlisted { product_id: ProductId, wishlisted: bool },
}

/// The request a mutation turns into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireCall {
  Upsert(LineUpsert),
  Delete(ProductId),
}

impl Mutation {
  pub fn kind(&self) -> MutationKind {
    match self {
      Self::SetQuantity { .. } => MutationKind::Cart,
      Self::SetWishlisted { .. } => MutationKind::Wishlist,
    }
  }

  pub fn product_id(&self) -> ProductId {
    match self {
      Self::SetQuantity { product_id, .. } | Self::SetWishlisted { product_id, .. } => {
        *product_id
      }
    }
  }

  pub fn to_wire(&self) -> WireCall {
    match *self {
      Self::SetQuantity {
        product_id,
        quantity: 0,
      } => WireCall::Delete(product_id),
      Self::SetQuantity {
        product_id,
        quantity,
      } => WireCall::Upsert(LineUpsert {
        product_id,
        quantity,
        is_wishlisted: false,
      }),
      Self::SetWishlisted {
        product_id,
        wishlisted,
      } => WireCall::Upsert(LineUpsert {
        product_id,
        quantity: 1,
        is_wishlisted: wishlisted,
      }),
    }
  }
}

/// How an optimistic mutation ended.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome {
  /// The server accepted the change; local state keeps it.
  Committed(Mutation),
  /// A mutation of the same kind on the same product was already in flight.
  Skipped,
  /// Nothing to change locally, so nothing was sent.
  Unchanged,
  /// The change was applied, the server did not accept it, and it was undone.
  RolledBack(SyncError),
  /// The identity changed while the request was in flight; its result was ignored.
  Discarded,
  /// Refused before anything was applied.
  Rejected(SyncError),
}

impl MutationOutcome {
  pub fn is_committed(&self) -> bool {
    matches!(self, Self::Committed(_))
  }
}

impl<A: StorefrontApi> SyncLayer<A> {
  /// Add one unit of `product` to the cart.
  pub async fn add_to_cart(&self, product: &Product) -> MutationOutcome {
    let outcome = self
      .mutate(MutationKind::Cart, product.id, |state| {
        let quantity = state.add_one(product);
        Some(Mutation::SetQuantity {
          product_id: product.id,
          quantity,
        })
      })
      .await;

    if outcome.is_committed() {
      self.notifier.success(format!("{} added to cart!", product.name));
    }
    outcome
  }

  /// Set the quantity of an existing cart line. Anything below 1 removes it.
  pub async fn update_quantity(&self, product_id: ProductId, quantity: u32) -> MutationOutcome {
    if quantity < 1 {
      return self.remove_from_cart(product_id).await;
    }
    self
      .mutate(MutationKind::Cart, product_id, |state| {
        match state.cart_line(product_id) {
          Some(line) if line.quantity != quantity => {}
          _ => return None,
        }
        state.set_quantity(product_id, quantity);
        Some(Mutation::SetQuantity {
          product_id,
          quantity,
        })
      })
      .await
  }

  pub async fn remove_from_cart(&self, product_id: ProductId) -> MutationOutcome {
    let outcome = self
      .mutate(MutationKind::Cart, product_id, |state| {
        state.remove_line(product_id).map(|_| Mutation::SetQuantity {
          product_id,
          quantity: 0,
        })
      })
      .await;

    if outcome.is_committed() {
      self.notifier.info("Item removed from cart.");
    }
    outcome
  }

  /// Flip wishlist membership of `product`.
  ///
  /// The target state is decided under the guard, from the state before the flip, and
  /// that target is what gets sent.
  pub async fn toggle_wishlist(&self, product: &Product) -> MutationOutcome {
    let outcome = self
      .mutate(MutationKind::Wishlist, product.id, |state| {
        let wishlisted = !state.is_wishlisted(product.id);
        state.set_wishlisted(product, wishlisted);
        Some(Mutation::SetWishlisted {
          product_id: product.id,
          wishlisted,
        })
      })
      .await;

    match outcome {
      MutationOutcome::Committed(Mutation::SetWishlisted {
        wishlisted: true, ..
      }) => self
        .notifier
        .success(format!("{} added to wishlist!", product.name)),
      MutationOutcome::Committed(_) => self
        .notifier
        .info(format!("{} removed from wishlist.", product.name)),
      _ => {}
    }
    outcome
  }

  /// Run one optimistic mutation.
  ///
  /// `apply` changes local state and describes the change, or returns `None` without
  /// touching anything when there is nothing to do.
  async fn mutate<F>(&self, kind: MutationKind, product_id: ProductId, apply: F) -> MutationOutcome
  where
    F: FnOnce(&mut LocalState) -> Option<Mutation>,
  {
    let token = match self.require_token() {
      Ok(token) => token,
      Err(err) => return MutationOutcome::Rejected(err),
    };

    let Some(ticket) = self.guards.try_acquire(kind, product_id) else {
      debug!(?kind, %product_id, "Mutation already in flight, ignoring");
      return MutationOutcome::Skipped;
    };
    debug!(kind = ?ticket.kind(), product_id = %ticket.product_id(), "Acquired mutation slot");
    let generation = self.generation();

    let (snapshot, mutation) = {
      let mut state = self.state();
      let snapshot = state.snapshot(kind, product_id);
      match apply(&mut state) {
        Some(mutation) => (snapshot, mutation),
        None => return MutationOutcome::Unchanged,
      }
    };

    let token = token.as_str();
    let result = self
      .executor
      .execute(move || self.send(token, mutation))
      .await;

    if self.generation() != generation {
      debug!(?mutation, "Identity changed mid-flight, ignoring result");
      return MutationOutcome::Discarded;
    }

    let outcome = match result {
      Ok(()) => {
        debug!(?mutation, "Mutation committed");
        MutationOutcome::Committed(mutation)
      }
      Err(err) => {
        warn!(?mutation, error = %err, "Mutation failed, rolling back");
        self.state().restore(snapshot);
        if !self.handle_auth_failure(&err, generation) {
          let fallback = match kind {
            MutationKind::Cart => "Could not update your cart. Please try again.",
            MutationKind::Wishlist => "Could not update your wishlist. Please try again.",
          };
          self.notifier.error(err.user_message(fallback));
        }
        MutationOutcome::RolledBack(err)
      }
    };
    ticket.release();
    outcome
  }

  async fn send(&self, token: &str, mutation: Mutation) -> SyncResult<()> {
    match mutation.to_wire() {
      WireCall::Upsert(line) => self.api.upsert_line(token, &line).await,
      WireCall::Delete(product_id) => self.api.delete_line(token, product_id).await,
    }
  }
}
