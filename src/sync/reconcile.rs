//! Rebuild the local cart and wishlist from the server after sign-in.

use futures::future::join_all;
use rust_decimal::Decimal;
use std::collections::HashSet;
use tracing::{debug, info, warn};

use super::SyncLayer;
use crate::api::types::{CartLine, Product, RemoteLine, WishlistEntry};
use crate::api::StorefrontApi;
use crate::error::{SyncError, SyncResult};

/// What a reconcile pass did to each collection.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileReport {
  /// Number of cart lines installed, or why the cart fetch failed.
  pub cart: SyncResult<usize>,
  pub wishlist: SyncResult<usize>,
  /// False when the identity changed before the results arrived and nothing was installed.
  pub applied: bool,
}

impl ReconcileReport {
  pub fn is_complete(&self) -> bool {
    self.applied && self.cart.is_ok() && self.wishlist.is_ok()
  }
}

struct DisplayFields {
  name: String,
  price: Decimal,
  image_url: Option<String>,
}

impl From<&Product> for DisplayFields {
  fn from(product: &Product) -> Self {
    Self {
      name: product.name.clone(),
      price: product.price,
      image_url: product.image_url.clone(),
    }
  }
}

impl<A: StorefrontApi> SyncLayer<A> {
  /// Replace local cart and wishlist with the server's.
  ///
  /// Both collections are fetched concurrently and fail independently: a collection
  /// whose fetch failed is reset to empty, the other is still installed.
  pub async fn reconcile(&self) -> SyncResult<ReconcileReport> {
    let token = self.session.token()?;
    let token = token.as_str();
    let generation = self.generation();

    let (cart, wishlist) = futures::join!(
      self.executor.execute(move || self.api.fetch_cart(token)),
      self.executor.execute(move || self.api.fetch_wishlist(token)),
    );

    for err in [cart.as_ref().err(), wishlist.as_ref().err()].into_iter().flatten() {
      if self.handle_auth_failure(err, generation) {
        return Err(err.clone());
      }
    }

    let cart = match cart {
      Ok(lines) => Ok(self.resolve_cart(lines).await),
      Err(err) => Err(err),
    };
    let wishlist = match wishlist {
      Ok(lines) => Ok(self.resolve_wishlist(lines).await),
      Err(err) => Err(err),
    };

    let report = ReconcileReport {
      cart: cart.as_ref().map(Vec::len).map_err(SyncError::clone),
      wishlist: wishlist.as_ref().map(Vec::len).map_err(SyncError::clone),
      applied: self.generation() == generation,
    };
    if !report.applied {
      debug!("Identity changed during reconcile, ignoring results");
      return Ok(report);
    }

    {
      let mut state = self.state();
      state.cart = cart.unwrap_or_default();
      state.wishlist = wishlist.unwrap_or_default();
    }

    if let Err(err) = &report.cart {
      warn!(error = %err, "Cart fetch failed, local cart reset");
      self.notifier.warning("Could not load your cart.");
    }
    if let Err(err) = &report.wishlist {
      warn!(error = %err, "Wishlist fetch failed, local wishlist reset");
      self.notifier.warning("Could not load your wishlist.");
    }
    info!(cart = ?report.cart, wishlist = ?report.wishlist, "Reconciled with server");
    Ok(report)
  }

  async fn resolve_cart(&self, lines: Vec<RemoteLine>) -> Vec<CartLine> {
    let lines = dedupe(lines, "cart");
    let fields = join_all(lines.iter().map(|line| self.resolve_display(line))).await;
    lines
      .into_iter()
      .zip(fields)
      .map(|(line, fields)| CartLine {
        product_id: line.product_id,
        quantity: line.quantity.max(1),
        name: fields.name,
        price: fields.price,
        image_url: fields.image_url,
      })
      .collect()
  }

  async fn resolve_wishlist(&self, lines: Vec<RemoteLine>) -> Vec<WishlistEntry> {
    let lines = dedupe(lines, "wishlist");
    let fields = join_all(lines.iter().map(|line| self.resolve_display(line))).await;
    lines
      .into_iter()
      .zip(fields)
      .map(|(line, fields)| WishlistEntry {
        product_id: line.product_id,
        name: fields.name,
        price: fields.price,
        image_url: fields.image_url,
      })
      .collect()
  }

  /// Detail cache first (stale entries included), then a detail fetch that populates
  /// it, then whatever the line itself carried.
  async fn resolve_display(&self, line: &RemoteLine) -> DisplayFields {
    if let Some(product) = self.details.get(&line.product_id).into_value() {
      return DisplayFields::from(&product);
    }

    match self.product(line.product_id).await {
      Ok(result) => DisplayFields::from(&result.data),
      Err(err) => {
        warn!(product_id = %line.product_id, error = %err, "No details for line, using wire fields");
        DisplayFields {
          name: line
            .name
            .clone()
            .unwrap_or_else(|| format!("Product #{}", line.product_id)),
          price: line.price.unwrap_or(Decimal::ZERO),
          image_url: line.image_url.clone(),
        }
      }
    }
  }
}

/// Keep the first line per product.
fn dedupe(lines: Vec<RemoteLine>, collection: &'static str) -> Vec<RemoteLine> {
  let mut seen = HashSet::new();
  lines
    .into_iter()
    .filter(|line| {
      let first = seen.insert(line.product_id);
      if !first {
        warn!(collection, product_id = %line.product_id, "Duplicate line from server, keeping the first");
      }
      first
    })
    .collect()
}
