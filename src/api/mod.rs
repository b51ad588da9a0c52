//! Remote storefront API: domain types, wire decoding, HTTP client and retry executor.

pub mod api_types;
mod cache;
pub mod client;
pub mod executor;
pub mod types;

use std::future::Future;

use crate::error::SyncResult;
use types::{
  AuthGrant, Category, LineUpsert, LoginRequest, Order, Product, ProductId, ProductPage,
  ProductQuery, RemoteLine, SignupRequest,
};

pub use client::HttpApi;
pub use executor::RequestExecutor;

/// The remote operations the sync layer depends on.
///
/// Every method is a single attempt with errors already classified. Authenticated
/// calls take the bearer token explicitly; the sync layer refuses to call them without
/// one.
pub trait StorefrontApi: Send + Sync {
  fn list_products(
    &self,
    query: &ProductQuery,
  ) -> impl Future<Output = SyncResult<ProductPage>> + Send;

  fn get_product(&self, id: ProductId) -> impl Future<Output = SyncResult<Product>> + Send;

  fn list_categories(&self) -> impl Future<Output = SyncResult<Vec<Category>>> + Send;

  fn login(
    &self,
    credentials: &LoginRequest,
  ) -> impl Future<Output = SyncResult<AuthGrant>> + Send;

  fn signup(&self, details: &SignupRequest)
    -> impl Future<Output = SyncResult<AuthGrant>> + Send;

  fn fetch_cart(&self, token: &str) -> impl Future<Output = SyncResult<Vec<RemoteLine>>> + Send;

  fn fetch_wishlist(
    &self,
    token: &str,
  ) -> impl Future<Output = SyncResult<Vec<RemoteLine>>> + Send;

  /// Combined cart/wishlist upsert. One wire shape serves both concerns.
  fn upsert_line(
    &self,
    token: &str,
    line: &LineUpsert,
  ) -> impl Future<Output = SyncResult<()>> + Send;

  fn delete_line(
    &self,
    token: &str,
    product_id: ProductId,
  ) -> impl Future<Output = SyncResult<()>> + Send;

  fn list_orders(&self, token: &str) -> impl Future<Output = SyncResult<Vec<Order>>> + Send;

  fn get_order(&self, token: &str, order_id: u64)
    -> impl Future<Output = SyncResult<Order>> + Send;

  fn checkout(&self, token: &str) -> impl Future<Output = SyncResult<Order>> + Send;

  fn confirm_payment(
    &self,
    token: &str,
    order_id: u64,
  ) -> impl Future<Output = SyncResult<()>> + Send;
}
