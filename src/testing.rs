//! Scripted in-memory `StorefrontApi` for sync layer tests.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::api::types::{
  AuthGrant, Category, LineUpsert, LoginRequest, Order, Product, ProductId, ProductPage,
  ProductQuery, RemoteLine, SignupRequest,
};
use crate::api::StorefrontApi;
use crate::config::{Config, RetryConfig};
use crate::error::{SyncError, SyncResult};

/// Config with millisecond backoff so retry paths run fast.
pub fn test_config() -> Config {
  Config {
    retry: RetryConfig {
      max_attempts: 3,
      base_delay_ms: 1,
      max_delay_ms: 4,
      jitter: false,
    },
    ..Config::default()
  }
}

pub fn product(id: u64, name: &str, cents: i64) -> Product {
  Product {
    id: ProductId(id),
    name: name.to_string(),
    description: None,
    price: Decimal::new(cents, 2),
    original_price: None,
    image_url: Some(format!("https://img.example.com/{}.png", id)),
    category_name: Some("Home".to_string()),
    rating: Some(4.5),
    reviews: Some(12),
    in_stock: true,
    is_new: false,
    on_sale: false,
  }
}

pub fn grant(token: &str, name: &str) -> AuthGrant {
  AuthGrant {
    token: token.to_string(),
    id: 42,
    name: name.to_string(),
    roles: vec!["ROLE_USER".to_string()],
  }
}

pub fn order(id: u64, placed_at: &str) -> Order {
  Order {
    id,
    order_date: placed_at.parse::<DateTime<Utc>>().expect("timestamp"),
    total_amount: Decimal::new(1999, 2),
    status: Some("PAID".to_string()),
    items: Vec::new(),
  }
}

fn bare_line(id: u64, quantity: u32) -> RemoteLine {
  RemoteLine {
    product_id: ProductId(id),
    quantity,
    name: None,
    price: None,
    image_url: None,
  }
}

struct Failure {
  error: SyncError,
  /// `None` fails forever
  remaining: Option<u32>,
}

#[derive(Default)]
struct FakeState {
  products: Vec<Product>,
  grant: Option<AuthGrant>,
  cart: Vec<RemoteLine>,
  wishlist: Vec<RemoteLine>,
  orders: Vec<Order>,
  upserts: Vec<LineUpsert>,
  calls: Vec<&'static str>,
  failures: HashMap<&'static str, Failure>,
  latency: Duration,
  in_flight: usize,
  peak_in_flight: usize,
}

/// In-memory storefront backend. Clones share state, so a test keeps one handle to
/// script and inspect while the sync layer owns another.
#[derive(Clone, Default)]
pub struct FakeApi {
  inner: Arc<Mutex<FakeState>>,
}

impl FakeApi {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> MutexGuard<'_, FakeState> {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }

  pub fn add_product(&self, product: Product) {
    self.lock().products.push(product);
  }

  pub fn set_grant(&self, grant: AuthGrant) {
    self.lock().grant = Some(grant);
  }

  /// Server cart as `(product id, quantity)` pairs without display fields.
  pub fn set_remote_cart(&self, lines: Vec<(u64, u32)>) {
    self.lock().cart = lines.into_iter().map(|(id, qty)| bare_line(id, qty)).collect();
  }

  pub fn set_remote_cart_lines(&self, lines: Vec<RemoteLine>) {
    self.lock().cart = lines;
  }

  pub fn set_remote_wishlist(&self, ids: Vec<u64>) {
    self.lock().wishlist = ids.into_iter().map(|id| bare_line(id, 1)).collect();
  }

  pub fn set_orders(&self, orders: Vec<Order>) {
    self.lock().orders = orders;
  }

  pub fn set_latency(&self, latency: Duration) {
    self.lock().latency = latency;
  }

  pub fn fail_always(&self, method: &'static str, error: SyncError) {
    self.lock().failures.insert(
      method,
      Failure {
        error,
        remaining: None,
      },
    );
  }

  pub fn fail_times(&self, method: &'static str, times: u32, error: SyncError) {
    self.lock().failures.insert(
      method,
      Failure {
        error,
        remaining: Some(times),
      },
    );
  }

  pub fn clear_failures(&self) {
    self.lock().failures.clear();
  }

  pub fn calls(&self, method: &str) -> usize {
    self.lock().calls.iter().filter(|c| **c == method).count()
  }

  pub fn remote_cart_quantity(&self, id: ProductId) -> Option<u32> {
    self
      .lock()
      .cart
      .iter()
      .find(|line| line.product_id == id)
      .map(|line| line.quantity)
  }

  pub fn remote_wishlisted(&self, id: ProductId) -> bool {
    self.lock().wishlist.iter().any(|line| line.product_id == id)
  }

  pub fn last_upsert(&self) -> Option<LineUpsert> {
    self.lock().upserts.last().cloned()
  }

  pub fn peak_in_flight(&self) -> usize {
    self.lock().peak_in_flight
  }

  pub fn reset_peak_in_flight(&self) {
    self.lock().peak_in_flight = 0;
  }

  /// Record the call, wait out the latency, then apply any scripted failure.
  async fn enter(&self, method: &'static str) -> SyncResult<()> {
    let latency = {
      let mut state = self.lock();
      state.calls.push(method);
      state.in_flight += 1;
      state.peak_in_flight = state.peak_in_flight.max(state.in_flight);
      state.latency
    };
    if !latency.is_zero() {
      tokio::time::sleep(latency).await;
    }

    let mut state = self.lock();
    state.in_flight -= 1;
    match state.failures.get_mut(method) {
      Some(Failure {
        remaining: Some(0), ..
      })
      | None => Ok(()),
      Some(failure) => {
        if let Some(remaining) = failure.remaining.as_mut() {
          *remaining -= 1;
        }
        Err(failure.error.clone())
      }
    }
  }

  fn check_token(&self, token: &str) -> SyncResult<()> {
    match &self.lock().grant {
      Some(grant) if grant.token == token => Ok(()),
      _ => Err(SyncError::from_status(401, Some("Invalid token".to_string()))),
    }
  }

  fn issue_grant(&self) -> SyncResult<AuthGrant> {
    self
      .lock()
      .grant
      .clone()
      .ok_or_else(|| SyncError::from_status(400, Some("Invalid credentials".to_string())))
  }
}

impl StorefrontApi for FakeApi {
  async fn list_products(&self, _query: &ProductQuery) -> SyncResult<ProductPage> {
    self.enter("list_products").await?;
    let products = self.lock().products.clone();
    Ok(ProductPage {
      total_pages: 1,
      total_elements: products.len() as u64,
      products,
    })
  }

  async fn get_product(&self, id: ProductId) -> SyncResult<Product> {
    self.enter("get_product").await?;
    self
      .lock()
      .products
      .iter()
      .find(|p| p.id == id)
      .cloned()
      .ok_or_else(|| SyncError::from_status(404, Some("Product not found".to_string())))
  }

  async fn list_categories(&self) -> SyncResult<Vec<Category>> {
    self.enter("list_categories").await?;
    Ok(vec![Category {
      id: 1,
      name: "Home".to_string(),
      description: None,
      image_url: None,
    }])
  }

  async fn login(&self, _credentials: &LoginRequest) -> SyncResult<AuthGrant> {
    self.enter("login").await?;
    self.issue_grant()
  }

  async fn signup(&self, _details: &SignupRequest) -> SyncResult<AuthGrant> {
    self.enter("signup").await?;
    self.issue_grant()
  }

  async fn fetch_cart(&self, token: &str) -> SyncResult<Vec<RemoteLine>> {
    self.enter("fetch_cart").await?;
    self.check_token(token)?;
    Ok(self.lock().cart.clone())
  }

  async fn fetch_wishlist(&self, token: &str) -> SyncResult<Vec<RemoteLine>> {
    self.enter("fetch_wishlist").await?;
    self.check_token(token)?;
    Ok(self.lock().wishlist.clone())
  }

  async fn upsert_line(&self, token: &str, line: &LineUpsert) -> SyncResult<()> {
    self.enter("upsert_line").await?;
    self.check_token(token)?;

    let mut state = self.lock();
    state.upserts.push(line.clone());
    // Un-wishlisting is an upsert with the flag cleared.
    if !line.is_wishlisted {
      let before = state.wishlist.len();
      state.wishlist.retain(|l| l.product_id != line.product_id);
      if state.wishlist.len() != before {
        return Ok(());
      }
    }
    let target = if line.is_wishlisted {
      &mut state.wishlist
    } else {
      &mut state.cart
    };
    match target.iter_mut().find(|l| l.product_id == line.product_id) {
      Some(existing) => existing.quantity = line.quantity,
      None => target.push(bare_line(line.product_id.0, line.quantity)),
    }
    Ok(())
  }

  async fn delete_line(&self, token: &str, product_id: ProductId) -> SyncResult<()> {
    self.enter("delete_line").await?;
    self.check_token(token)?;
    self.lock().cart.retain(|l| l.product_id != product_id);
    Ok(())
  }

  async fn list_orders(&self, token: &str) -> SyncResult<Vec<Order>> {
    self.enter("list_orders").await?;
    self.check_token(token)?;
    Ok(self.lock().orders.clone())
  }

  async fn get_order(&self, token: &str, order_id: u64) -> SyncResult<Order> {
    self.enter("get_order").await?;
    self.check_token(token)?;
    self
      .lock()
      .orders
      .iter()
      .find(|o| o.id == order_id)
      .cloned()
      .ok_or_else(|| SyncError::from_status(404, Some("Order not found".to_string())))
  }

  async fn checkout(&self, token: &str) -> SyncResult<Order> {
    self.enter("checkout").await?;
    self.check_token(token)?;
    let mut state = self.lock();
    let placed = Order {
      id: 100 + state.orders.len() as u64,
      order_date: Utc::now(),
      total_amount: Decimal::ZERO,
      status: Some("PENDING".to_string()),
      items: Vec::new(),
    };
    state.orders.push(placed.clone());
    Ok(placed)
  }

  async fn confirm_payment(&self, token: &str, _order_id: u64) -> SyncResult<()> {
    self.enter("confirm_payment").await?;
    self.check_token(token)?;
    self.lock().cart.clear();
    Ok(())
  }
}
