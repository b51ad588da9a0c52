use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::api_types::{
  decode, error_message, ApiAuthResponse, ApiCartItem, ApiCategory, ApiOrder, ApiProduct,
  ApiProductPage,
};
use super::types::{
  AuthGrant, Category, LineUpsert, LoginRequest, Order, Product, ProductId, ProductPage,
  ProductQuery, RemoteLine, SignupRequest,
};
use super::StorefrontApi;
use crate::config::ApiConfig;
use crate::error::{SyncError, SyncResult};

/// Storefront API client over HTTP.
///
/// Each call is a single attempt; retries and backoff belong to `RequestExecutor`.
#[derive(Clone)]
pub struct HttpApi {
  client: Client,
  base: Url,
}

impl HttpApi {
  pub fn new(config: &ApiConfig) -> SyncResult<Self> {
    Self::with_timeout(&config.base_url, config.timeout())
  }

  pub fn with_timeout(base_url: &str, timeout: Duration) -> SyncResult<Self> {
    // Url::join drops the last path segment unless the base ends with a slash.
    let normalized = format!("{}/", base_url.trim_end_matches('/'));
    let base = Url::parse(&normalized)
      .map_err(|e| SyncError::Connection(format!("invalid API URL '{}': {}", base_url, e)))?;

    let client = Client::builder()
      .user_agent(concat!("storefront-sync/", env!("CARGO_PKG_VERSION")))
      .timeout(timeout)
      .build()
      .map_err(classify)?;

    Ok(Self { client, base })
  }

  fn url(&self, path: &str) -> SyncResult<Url> {
    self
      .base
      .join(path)
      .map_err(|e| SyncError::Connection(format!("invalid path '{}': {}", path, e)))
  }

  fn request(&self, method: Method, path: &str) -> SyncResult<RequestBuilder> {
    Ok(self.client.request(method, self.url(path)?))
  }

  fn authed(&self, method: Method, path: &str, token: &str) -> SyncResult<RequestBuilder> {
    Ok(self.request(method, path)?.bearer_auth(token))
  }

  /// Send and return the raw body of a successful response.
  async fn dispatch(&self, request: RequestBuilder) -> SyncResult<Vec<u8>> {
    let response = request.send().await.map_err(classify)?;
    let status = response.status();
    let body = response.bytes().await.map_err(classify)?.to_vec();

    if !status.is_success() {
      debug!(status = status.as_u16(), "API call failed");
      return Err(SyncError::from_status(status.as_u16(), error_message(&body)));
    }
    Ok(body)
  }

  async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> SyncResult<T> {
    let body = self.dispatch(request).await?;
    decode(&body)
  }
}

/// Classify a transport-level failure.
fn classify(err: reqwest::Error) -> SyncError {
  if err.is_timeout() {
    SyncError::Timeout
  } else if err.is_decode() {
    SyncError::Decode(err.to_string())
  } else {
    SyncError::Connection(err.to_string())
  }
}

impl StorefrontApi for HttpApi {
  async fn list_products(&self, query: &ProductQuery) -> SyncResult<ProductPage> {
    let request = self.request(Method::GET, "products")?.query(&query.to_pairs());
    let page: ApiProductPage = self.fetch(request).await?;
    Ok(page.into())
  }

  async fn get_product(&self, id: ProductId) -> SyncResult<Product> {
    let request = self.request(Method::GET, &format!("products/{}", id))?;
    let product: ApiProduct = self.fetch(request).await?;
    Ok(product.into())
  }

  async fn list_categories(&self) -> SyncResult<Vec<Category>> {
    let request = self.request(Method::GET, "categories")?;
    let categories: Vec<ApiCategory> = self.fetch(request).await?;
    Ok(categories.into_iter().map(Category::from).collect())
  }

  async fn login(&self, credentials: &LoginRequest) -> SyncResult<AuthGrant> {
    let request = self.request(Method::POST, "auth/login")?.json(credentials);
    let grant: ApiAuthResponse = self.fetch(request).await?;
    Ok(grant.into())
  }

  async fn signup(&self, details: &SignupRequest) -> SyncResult<AuthGrant> {
    let request = self.request(Method::POST, "auth/signup")?.json(details);
    let grant: ApiAuthResponse = self.fetch(request).await?;
    Ok(grant.into())
  }

  async fn fetch_cart(&self, token: &str) -> SyncResult<Vec<RemoteLine>> {
    let request = self.authed(Method::GET, "cart", token)?;
    let items: Vec<ApiCartItem> = self.fetch(request).await?;
    Ok(items.into_iter().map(RemoteLine::from).collect())
  }

  async fn fetch_wishlist(&self, token: &str) -> SyncResult<Vec<RemoteLine>> {
    let request = self.authed(Method::GET, "cart/wishlist", token)?;
    let items: Vec<ApiCartItem> = self.fetch(request).await?;
    Ok(items.into_iter().map(RemoteLine::from).collect())
  }

  async fn upsert_line(&self, token: &str, line: &LineUpsert) -> SyncResult<()> {
    let request = self.authed(Method::POST, "cart", token)?.json(line);
    self.dispatch(request).await.map(|_| ())
  }

  async fn delete_line(&self, token: &str, product_id: ProductId) -> SyncResult<()> {
    let request = self.authed(Method::DELETE, &format!("cart/{}", product_id), token)?;
    self.dispatch(request).await.map(|_| ())
  }

  async fn list_orders(&self, token: &str) -> SyncResult<Vec<Order>> {
    let request = self.authed(Method::GET, "orders", token)?;
    let orders: Vec<ApiOrder> = self.fetch(request).await?;
    orders.into_iter().map(Order::try_from).collect()
  }

  async fn get_order(&self, token: &str, order_id: u64) -> SyncResult<Order> {
    let request = self.authed(Method::GET, &format!("orders/{}", order_id), token)?;
    let order: ApiOrder = self.fetch(request).await?;
    order.try_into()
  }

  async fn checkout(&self, token: &str) -> SyncResult<Order> {
    let request = self
      .authed(Method::POST, "checkout", token)?
      .json(&serde_json::json!({}));
    let order: ApiOrder = self.fetch(request).await?;
    order.try_into()
  }

  async fn confirm_payment(&self, token: &str, order_id: u64) -> SyncResult<()> {
    let request = self
      .authed(Method::POST, &format!("payment/confirm/{}", order_id), token)?
      .json(&serde_json::json!({}));
    self.dispatch(request).await.map(|_| ())
  }
}
