//! In-memory cart and wishlist, as the UI sees them.

use rust_decimal::Decimal;

use super::guard::MutationKind;
use crate::api::types::{CartLine, Product, ProductId, WishlistEntry};

/// Local collections. Both are keyed by product id with at most one entry per product.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalState {
  pub cart: Vec<CartLine>,
  pub wishlist: Vec<WishlistEntry>,
}

/// One product's entry as it was before an optimistic change, with its position.
///
/// `None` means the product had no entry. Restoring touches only that product.
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
  Cart {
    product_id: ProductId,
    index: usize,
    line: Option<CartLine>,
  },
  Wishlist {
    product_id: ProductId,
    index: usize,
    entry: Option<WishlistEntry>,
  },
}

impl LocalState {
  pub fn snapshot(&self, kind: MutationKind, product_id: ProductId) -> Snapshot {
    match kind {
      MutationKind::Cart => {
        let index = self.cart.iter().position(|line| line.product_id == product_id);
        Snapshot::Cart {
          product_id,
          index: index.unwrap_or(self.cart.len()),
          line: index.map(|i| self.cart[i].clone()),
        }
      }
      MutationKind::Wishlist => {
        let index = self
          .wishlist
          .iter()
          .position(|entry| entry.product_id == product_id);
        Snapshot::Wishlist {
          product_id,
          index: index.unwrap_or(self.wishlist.len()),
          entry: index.map(|i| self.wishlist[i].clone()),
        }
      }
    }
  }

  /// Put one product's entry back as it was captured. Other entries are left alone.
  pub fn restore(&mut self, snapshot: Snapshot) {
    match snapshot {
      Snapshot::Cart {
        product_id,
        index,
        line,
      } => restore_entry(&mut self.cart, index, line, |l| l.product_id == product_id),
      Snapshot::Wishlist {
        product_id,
        index,
        entry,
      } => restore_entry(&mut self.wishlist, index, entry, |e| e.product_id == product_id),
    }
  }

  pub fn cart_line(&self, id: ProductId) -> Option<&CartLine> {
    self.cart.iter().find(|line| line.product_id == id)
  }

  pub fn cart_quantity(&self, id: ProductId) -> u32 {
    self.cart_line(id).map_or(0, |line| line.quantity)
  }

  /// Add one unit, creating the line if needed. Returns the new quantity.
  pub fn add_one(&mut self, product: &Product) -> u32 {
    match self.cart.iter_mut().find(|line| line.product_id == product.id) {
      Some(line) => {
        line.quantity += 1;
        line.quantity
      }
      None => {
        self.cart.push(CartLine::from_product(product, 1));
        1
      }
    }
  }

  /// Change the quantity of an existing line. `false` if there is no such line.
  pub fn set_quantity(&mut self, id: ProductId, quantity: u32) -> bool {
    match self.cart.iter_mut().find(|line| line.product_id == id) {
      Some(line) => {
        line.quantity = quantity;
        true
      }
      None => false,
    }
  }

  pub fn remove_line(&mut self, id: ProductId) -> Option<CartLine> {
    let index = self.cart.iter().position(|line| line.product_id == id)?;
    Some(self.cart.remove(index))
  }

  pub fn is_wishlisted(&self, id: ProductId) -> bool {
    self.wishlist.iter().any(|entry| entry.product_id == id)
  }

  /// Add or remove a wishlist entry for `product`.
  pub fn set_wishlisted(&mut self, product: &Product, wishlisted: bool) {
    if wishlisted {
      if !self.is_wishlisted(product.id) {
        self.wishlist.push(WishlistEntry::from_product(product));
      }
    } else {
      self.wishlist.retain(|entry| entry.product_id != product.id);
    }
  }

  pub fn cart_total(&self) -> Decimal {
    self.cart.iter().map(CartLine::subtotal).sum()
  }

  /// Number of distinct lines, not units
  pub fn cart_count(&self) -> usize {
    self.cart.len()
  }

  pub fn wishlist_ids(&self) -> Vec<ProductId> {
    self.wishlist.iter().map(|entry| entry.product_id).collect()
  }
}

fn restore_entry<T>(
  items: &mut Vec<T>,
  index: usize,
  saved: Option<T>,
  is_entry: impl Fn(&T) -> bool,
) {
  items.retain(|item| !is_entry(item));
  if let Some(saved) = saved {
    let index = index.min(items.len());
    items.insert(index, saved);
  }
}
