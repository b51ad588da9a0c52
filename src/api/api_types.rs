//! Serde-deserializable types matching the storefront API responses.
//!
//! These types are separate from domain types so every response goes through one
//! explicit decode step. A response that does not match fails with
//! `SyncError::Decode` instead of defaulting to an empty collection, and the
//! inconsistent `id`/`productId` fields are resolved here and nowhere else.

use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Deserialize};

use super::types::{
  AuthGrant, Category, Order, OrderItem, Product, ProductId, ProductPage, RemoteLine,
};
use crate::error::{SyncError, SyncResult};

/// Decode a response body into `T`, classifying failures as `Decode`.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> SyncResult<T> {
  serde_json::from_slice(bytes).map_err(|e| SyncError::Decode(e.to_string()))
}

/// Error body the backend sends alongside 4xx/5xx statuses.
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
  pub message: Option<String>,
}

/// Pull the server's message out of an error body, if it has one.
pub fn error_message(bytes: &[u8]) -> Option<String> {
  serde_json::from_slice::<ApiErrorBody>(bytes)
    .ok()
    .and_then(|b| b.message)
    .filter(|m| !m.trim().is_empty())
}

// ============================================================================
// Catalog
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiCategoryRef {
  pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiProduct {
  pub id: u64,
  pub name: String,
  pub description: Option<String>,
  pub price: Decimal,
  pub original_price: Option<Decimal>,
  pub image_url: Option<String>,
  pub category: Option<ApiCategoryRef>,
  pub category_name: Option<String>,
  pub rating: Option<f64>,
  pub reviews: Option<u32>,
  #[serde(default = "default_true")]
  pub in_stock: bool,
  #[serde(default)]
  pub is_new: bool,
  #[serde(default)]
  pub on_sale: bool,
}

fn default_true() -> bool {
  true
}

impl From<ApiProduct> for Product {
  fn from(p: ApiProduct) -> Self {
    Product {
      id: ProductId(p.id),
      name: p.name,
      description: p.description,
      price: p.price,
      original_price: p.original_price,
      image_url: p.image_url,
      category_name: p.category_name.or(p.category.map(|c| c.name)),
      rating: p.rating,
      reviews: p.reviews,
      in_stock: p.in_stock,
      is_new: p.is_new,
      on_sale: p.on_sale,
    }
  }
}

/// Paginated listing. All three fields are required.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiProductPage {
  pub content: Vec<ApiProduct>,
  pub total_pages: u32,
  pub total_elements: u64,
}

impl From<ApiProductPage> for ProductPage {
  fn from(page: ApiProductPage) -> Self {
    ProductPage {
      products: page.content.into_iter().map(Product::from).collect(),
      total_pages: page.total_pages,
      total_elements: page.total_elements,
    }
  }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCategory {
  pub id: u64,
  pub name: String,
  pub description: Option<String>,
  pub image_url: Option<String>,
}

impl From<ApiCategory> for Category {
  fn from(c: ApiCategory) -> Self {
    Category {
      id: c.id,
      name: c.name,
      description: c.description,
      image_url: c.image_url,
    }
  }
}

// ============================================================================
// Cart and wishlist
// ============================================================================

/// A cart or wishlist line.
///
/// `productId` is required. The line's own `id`, when present, is a server-side row id
/// and is deliberately not read.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCartItem {
  pub product_id: u64,
  #[serde(default = "default_quantity")]
  pub quantity: u32,
  pub name: Option<String>,
  pub price: Option<Decimal>,
  pub image_url: Option<String>,
}

fn default_quantity() -> u32 {
  1
}

impl From<ApiCartItem> for RemoteLine {
  fn from(item: ApiCartItem) -> Self {
    RemoteLine {
      product_id: ProductId(item.product_id),
      quantity: item.quantity,
      name: item.name,
      price: item.price,
      image_url: item.image_url,
    }
  }
}

// ============================================================================
// Auth
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiAuthResponse {
  pub token: String,
  pub id: u64,
  pub name: String,
  #[serde(default)]
  pub roles: Vec<String>,
}

impl From<ApiAuthResponse> for AuthGrant {
  fn from(r: ApiAuthResponse) -> Self {
    AuthGrant {
      token: r.token,
      id: r.id,
      name: r.name,
      roles: r.roles,
    }
  }
}

// ============================================================================
// Orders
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiOrderItem {
  pub product_id: u64,
  pub product_name: String,
  pub image_url: Option<String>,
  pub price: Decimal,
  pub quantity: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiOrder {
  pub id: u64,
  pub order_date: String,
  pub total_amount: Decimal,
  pub status: Option<String>,
  #[serde(default)]
  pub order_items: Vec<ApiOrderItem>,
}

impl TryFrom<ApiOrder> for Order {
  type Error = SyncError;

  fn try_from(o: ApiOrder) -> SyncResult<Self> {
    Ok(Order {
      id: o.id,
      order_date: parse_timestamp(&o.order_date)?,
      total_amount: o.total_amount,
      status: o.status,
      items: o
        .order_items
        .into_iter()
        .map(|i| OrderItem {
          product_id: ProductId(i.product_id),
          product_name: i.product_name,
          image_url: i.image_url,
          price: i.price,
          quantity: i.quantity,
        })
        .collect(),
    })
  }
}

/// Accept RFC 3339 timestamps as well as the zone-less `LocalDateTime` form the backend
/// emits, which is taken to be UTC.
pub fn parse_timestamp(s: &str) -> SyncResult<DateTime<Utc>> {
  if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
    return Ok(dt.with_timezone(&Utc));
  }
  NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
    .map(|dt| dt.and_utc())
    .map_err(|e| SyncError::Decode(format!("invalid timestamp '{}': {}", s, e)))
}
