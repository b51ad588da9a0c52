use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical product identity. Cart lines, wishlist entries and cache keys all use it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub u64);

impl fmt::Display for ProductId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Display::fmt(&self.0, f)
  }
}

/// Product category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
  pub id: u64,
  pub name: String,
  pub description: Option<String>,
  pub image_url: Option<String>,
}

/// Full product details
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
  pub id: ProductId,
  pub name: String,
  pub description: Option<String>,
  pub price: Decimal,
  pub original_price: Option<Decimal>,
  pub image_url: Option<String>,
  pub category_name: Option<String>,
  pub rating: Option<f64>,
  pub reviews: Option<u32>,
  pub in_stock: bool,
  pub is_new: bool,
  pub on_sale: bool,
}

/// One page of a product listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductPage {
  pub products: Vec<Product>,
  pub total_pages: u32,
  pub total_elements: u64,
}

/// A cart line. At most one per product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
  pub product_id: ProductId,
  pub quantity: u32,
  pub name: String,
  pub price: Decimal,
  pub image_url: Option<String>,
}

impl CartLine {
  pub fn from_product(product: &Product, quantity: u32) -> Self {
    Self {
      product_id: product.id,
      quantity,
      name: product.name.clone(),
      price: product.price,
      image_url: product.image_url.clone(),
    }
  }

  pub fn subtotal(&self) -> Decimal {
    self.price * Decimal::from(self.quantity)
  }
}

/// A wishlist entry. At most one per product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WishlistEntry {
  pub product_id: ProductId,
  pub name: String,
  pub price: Decimal,
  pub image_url: Option<String>,
}

impl WishlistEntry {
  pub fn from_product(product: &Product) -> Self {
    Self {
      product_id: product.id,
      name: product.name.clone(),
      price: product.price,
      image_url: product.image_url.clone(),
    }
  }
}

/// A cart or wishlist line as the server reports it, already keyed by product id.
///
/// Display fields are optional on the wire; the reconciler fills the gaps.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteLine {
  pub product_id: ProductId,
  pub quantity: u32,
  pub name: Option<String>,
  pub price: Option<Decimal>,
  pub image_url: Option<String>,
}

/// The signed-in user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
  pub id: u64,
  pub email: String,
  pub name: String,
  #[serde(default)]
  pub roles: Vec<String>,
}

impl Profile {
  pub fn is_admin(&self) -> bool {
    self.roles.iter().any(|r| r == "ROLE_ADMIN")
  }
}

/// What the auth endpoints hand back on success
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthGrant {
  pub token: String,
  pub id: u64,
  pub name: String,
  pub roles: Vec<String>,
}

/// Line item of a placed order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
  pub product_id: ProductId,
  pub product_name: String,
  pub image_url: Option<String>,
  pub price: Decimal,
  pub quantity: u32,
}

/// A placed order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
  pub id: u64,
  pub order_date: DateTime<Utc>,
  pub total_amount: Decimal,
  pub status: Option<String>,
  pub items: Vec<OrderItem>,
}

/// Body of the combined cart/wishlist upsert call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineUpsert {
  pub product_id: ProductId,
  pub quantity: u32,
  pub is_wishlisted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
  pub email: String,
  pub password: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
  pub name: String,
  pub email: String,
  pub password: String,
  pub confirm_password: String,
}

/// Filters and paging for the product listing
#[derive(Debug, Clone, PartialEq)]
pub struct ProductQuery {
  /// Zero-based page index
  pub page: u32,
  pub size: u32,
  pub sort: String,
  pub search_term: Option<String>,
  pub category_id: Option<u64>,
  pub min_price: Option<Decimal>,
  pub max_price: Option<Decimal>,
  pub is_new: bool,
  pub on_sale: bool,
}

impl Default for ProductQuery {
  fn default() -> Self {
    Self {
      page: 0,
      size: 9,
      sort: "rating-desc".to_string(),
      search_term: None,
      category_id: None,
      min_price: None,
      max_price: None,
      is_new: false,
      on_sale: false,
    }
  }
}

impl ProductQuery {
  /// Query-string pairs. Unset filters are omitted; boolean flags are only sent when on.
  pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
    let mut pairs = vec![
      ("page", self.page.to_string()),
      ("size", self.size.to_string()),
      ("sort", self.sort.clone()),
    ];
    if let Some(term) = self.search_term.as_deref().map(str::trim) {
      if !term.is_empty() {
        pairs.push(("searchTerm", term.to_string()));
      }
    }
    if let Some(id) = self.category_id {
      pairs.push(("categoryId", id.to_string()));
    }
    if let Some(min) = self.min_price {
      pairs.push(("minPrice", min.normalize().to_string()));
    }
    if let Some(max) = self.max_price {
      pairs.push(("maxPrice", max.normalize().to_string()));
    }
    if self.is_new {
      pairs.push(("isNew", "true".to_string()));
    }
    if self.on_sale {
      pairs.push(("onSale", "true".to_string()));
    }
    pairs
  }
}
