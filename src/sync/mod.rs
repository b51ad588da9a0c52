//! The synchronization layer.
//!
//! `SyncLayer` owns every piece of client-side state: the read caches, the session, the
//! local cart and wishlist, and the pending-operation guards. The UI only reads
//! snapshots from it and calls its entry points.

mod guard;
mod mutator;
mod reconcile;
mod state;

pub use guard::{MutationKind, PendingOperationGuard, PendingTicket};
pub use mutator::{Mutation, MutationOutcome, WireCall};
pub use reconcile::ReconcileReport;
pub use state::{LocalState, Snapshot};

use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use crate::api::types::{
  AuthGrant, CartLine, Category, LoginRequest, Order, Product, ProductId, ProductPage,
  ProductQuery, Profile, SignupRequest, WishlistEntry,
};
use crate::api::{RequestExecutor, StorefrontApi};
use crate::cache::{CacheEntry, CacheResult, CacheSource, Clock, SharedCache, SystemClock};
use crate::config::Config;
use crate::db::{keys, load_json, save_json, PersistentStore};
use crate::error::{SyncError, SyncResult};
use crate::notice::Notifier;
use crate::session::{Session, SessionStore};

/// The category list is cached as a single entry.
const CATEGORIES_KEY: &str = "all";

const OFFLINE_NOTICE: &str = "You appear to be offline. Showing saved data.";
const EXPIRED_NOTICE: &str = "Your session has expired. Please log in again.";

pub struct SyncLayer<A> {
  api: A,
  executor: RequestExecutor,
  storage: Arc<dyn PersistentStore>,
  session: SessionStore,
  pages: SharedCache<String, ProductPage>,
  details: SharedCache<ProductId, Product>,
  categories: SharedCache<String, Vec<Category>>,
  state: Mutex<LocalState>,
  guards: PendingOperationGuard,
  /// Bumped whenever the user identity changes. Async work started under an older
  /// generation must not touch local state when it completes.
  generation: AtomicU64,
  notifier: Notifier,
  persist_caches: bool,
}

impl<A: StorefrontApi> SyncLayer<A> {
  pub fn new(api: A, storage: Arc<dyn PersistentStore>, config: &Config, notifier: Notifier) -> Self {
    Self::with_clock(api, storage, config, notifier, Arc::new(SystemClock))
  }

  pub fn with_clock(
    api: A,
    storage: Arc<dyn PersistentStore>,
    config: &Config,
    notifier: Notifier,
    clock: Arc<dyn Clock>,
  ) -> Self {
    let cache = &config.cache;
    Self {
      api,
      executor: RequestExecutor::new(&config.retry, config.api.timeout()),
      session: SessionStore::new(storage.clone()),
      storage,
      pages: SharedCache::new("pages", cache.page_ttl(), cache.page_capacity, clock.clone()),
      details: SharedCache::new(
        "details",
        cache.detail_ttl(),
        cache.detail_capacity,
        clock.clone(),
      ),
      categories: SharedCache::new("categories", cache.detail_ttl(), 1, clock),
      state: Mutex::new(LocalState::default()),
      guards: PendingOperationGuard::new(),
      generation: AtomicU64::new(0),
      notifier,
      persist_caches: cache.persist,
    }
  }

  fn state(&self) -> MutexGuard<'_, LocalState> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn generation(&self) -> u64 {
    self.generation.load(Ordering::SeqCst)
  }

  // ---------------------------------------------------------------------------
  // Lifecycle
  // ---------------------------------------------------------------------------

  /// Restore persisted caches and session, then reconcile if someone is signed in.
  pub async fn init(&self) -> Option<Profile> {
    if self.persist_caches {
      self.restore_cache(keys::PAGE_CACHE, &self.pages);
      self.restore_cache(keys::DETAIL_CACHE, &self.details);
      self.restore_cache(keys::CATEGORY_CACHE, &self.categories);
    }

    self.session.restore()?;
    if let Err(err) = self.reconcile().await {
      debug!(error = %err, "Reconcile after restore did not run");
    }
    self.profile()
  }

  /// Stop honouring in-flight work before the process exits.
  ///
  /// Persisted session and cache snapshots are kept for the next start.
  pub fn teardown(&self) {
    self.generation.fetch_add(1, Ordering::SeqCst);
    self.guards.clear();
    debug!("Sync layer torn down");
  }

  /// Drop everything tied to the current identity. In-flight results become stale.
  fn reset_user_state(&self) {
    self.generation.fetch_add(1, Ordering::SeqCst);
    self.guards.clear();
    self.pages.invalidate_all();
    self.details.invalidate_all();
    self.categories.invalidate_all();
    *self.state() = LocalState::default();
  }

  // ---------------------------------------------------------------------------
  // Authentication
  // ---------------------------------------------------------------------------

  pub async fn login(&self, email: &str, password: &str) -> SyncResult<Profile> {
    let request = LoginRequest {
      email: email.trim().to_string(),
      password: password.to_string(),
    };
    let request = &request;

    let profile = self
      .executor
      .execute(move || self.api.login(request))
      .await
      .and_then(|grant| self.start_session(grant, &request.email))
      .inspect_err(|err| {
        warn!(error = %err, "Login failed");
        self.notifier.error(err.user_message("Login failed."));
      })?;

    self.notifier.success(format!("Welcome back, {}!", profile.name));
    self.reconcile_after_auth().await;
    Ok(profile)
  }

  /// Create an account and sign straight into it.
  pub async fn signup(
    &self,
    name: &str,
    email: &str,
    password: &str,
    confirm_password: &str,
  ) -> SyncResult<Profile> {
    if password != confirm_password {
      let err = SyncError::InvalidInput("Passwords do not match.".to_string());
      self.notifier.error(err.user_message("Signup failed."));
      return Err(err);
    }

    let request = SignupRequest {
      name: name.trim().to_string(),
      email: email.trim().to_string(),
      password: password.to_string(),
      confirm_password: confirm_password.to_string(),
    };
    let request = &request;

    // Creating an account is not idempotent.
    let profile = self
      .executor
      .single_attempt()
      .execute(move || self.api.signup(request))
      .await
      .and_then(|grant| self.start_session(grant, &request.email))
      .inspect_err(|err| {
        warn!(error = %err, "Signup failed");
        self.notifier.error(err.user_message("Signup failed."));
      })?;

    self.notifier.success("Account created successfully!");
    self.reconcile_after_auth().await;
    Ok(profile)
  }

  fn start_session(&self, grant: AuthGrant, email: &str) -> SyncResult<Profile> {
    if self.session.is_active() {
      // The previous user's persisted state goes with them.
      self.session.clear()?;
    }
    self.reset_user_state();

    let profile = Profile {
      id: grant.id,
      email: email.to_string(),
      name: grant.name,
      roles: grant.roles,
    };
    self.session.establish(Session {
      token: grant.token,
      profile: profile.clone(),
    })?;
    Ok(profile)
  }

  async fn reconcile_after_auth(&self) {
    if let Err(err) = self.reconcile().await {
      debug!(error = %err, "Reconcile after sign-in did not run");
    }
  }

  /// Sign out: forget the session, every cache and every pending operation.
  pub fn logout(&self) -> SyncResult<()> {
    self.reset_user_state();
    let cleared = self.session.clear();
    if let Err(err) = &cleared {
      warn!(error = %err, "Failed to wipe persisted session");
    }
    info!("Logged out");
    self.notifier.info("You have been logged out.");
    cleared
  }

  /// A 401 under the current generation ends the session.
  fn handle_auth_failure(&self, err: &SyncError, generation: u64) -> bool {
    if !err.is_auth_failure() || self.generation() != generation {
      return false;
    }
    warn!("Credential rejected, ending session");
    self.reset_user_state();
    if let Err(e) = self.session.clear() {
      warn!(error = %e, "Failed to wipe persisted session");
    }
    self.notifier.error(EXPIRED_NOTICE);
    true
  }

  fn require_token(&self) -> SyncResult<String> {
    self.session.token().inspect_err(|err| {
      self.notifier.error(err.user_message("Please log in to perform this action."));
    })
  }

  /// Surface a failed authenticated call, ending the session on a 401.
  fn settle<T>(&self, result: SyncResult<T>, generation: u64, fallback: &str) -> SyncResult<T> {
    if let Err(err) = &result {
      if !self.handle_auth_failure(err, generation) {
        self.notifier.error(err.user_message(fallback));
      }
    }
    result
  }

  // ---------------------------------------------------------------------------
  // Catalog reads
  // ---------------------------------------------------------------------------

  /// One page of the product listing, served from the page cache when fresh.
  pub async fn products(&self, query: &ProductQuery) -> SyncResult<CacheResult<ProductPage>> {
    let key = query.cache_key();
    self
      .read_through(&self.pages, keys::PAGE_CACHE, key, || {
        self.executor.execute(move || self.api.list_products(query))
      })
      .await
  }

  /// Full product details, served from the detail cache when fresh.
  pub async fn product(&self, id: ProductId) -> SyncResult<CacheResult<Product>> {
    self
      .read_through(&self.details, keys::DETAIL_CACHE, id, || {
        self.executor.execute(move || self.api.get_product(id))
      })
      .await
  }

  pub async fn categories(&self) -> SyncResult<CacheResult<Vec<Category>>> {
    self
      .read_through(
        &self.categories,
        keys::CATEGORY_CACHE,
        CATEGORIES_KEY.to_string(),
        || self.executor.execute(move || self.api.list_categories()),
      )
      .await
  }

  async fn read_through<K, V, F, Fut>(
    &self,
    cache: &SharedCache<K, V>,
    storage_key: &'static str,
    key: K,
    fetcher: F,
  ) -> SyncResult<CacheResult<V>>
  where
    K: Eq + Hash + Clone + Debug + Serialize,
    V: Clone + Serialize,
    F: FnOnce() -> Fut,
    Fut: Future<Output = SyncResult<V>>,
  {
    let generation = self.generation();
    let result = cache.fetch(key.clone(), fetcher).await?;

    match result.source {
      CacheSource::Network if self.generation() != generation => {
        debug!(cache = cache.name(), ?key, "Session changed during fetch, dropping entry");
        cache.remove(&key);
      }
      CacheSource::Network => self.persist_cache(storage_key, cache),
      CacheSource::Offline => self.notifier.warning(OFFLINE_NOTICE),
      CacheSource::Cache => {}
    }
    Ok(result)
  }

  fn persist_cache<K, V>(&self, storage_key: &str, cache: &SharedCache<K, V>)
  where
    K: Eq + Hash + Clone + Debug + Serialize,
    V: Clone + Serialize,
  {
    if !self.persist_caches {
      return;
    }
    if let Err(e) = save_json(self.storage.as_ref(), storage_key, &cache.snapshot()) {
      warn!(cache = cache.name(), error = %e, "Failed to persist cache snapshot");
    }
  }

  fn restore_cache<K, V>(&self, storage_key: &str, cache: &SharedCache<K, V>)
  where
    K: Eq + Hash + Clone + Debug + DeserializeOwned,
    V: Clone + DeserializeOwned,
  {
    match load_json::<Vec<(K, CacheEntry<V>)>>(self.storage.as_ref(), storage_key) {
      Ok(Some(snapshot)) => {
        debug!(cache = cache.name(), entries = snapshot.len(), "Restored cache snapshot");
        cache.restore(snapshot);
      }
      Ok(None) => {}
      Err(e) => {
        warn!(cache = cache.name(), error = %e, "Discarding unreadable cache snapshot");
        if let Err(e) = self.storage.remove_all(&[storage_key]) {
          warn!(error = %e, "Failed to remove cache snapshot");
        }
      }
    }
  }

  // ---------------------------------------------------------------------------
  // Snapshots
  // ---------------------------------------------------------------------------

  pub fn profile(&self) -> Option<Profile> {
    self.session.current().map(|s| s.profile)
  }

  pub fn is_signed_in(&self) -> bool {
    self.session.is_active()
  }

  pub fn cart(&self) -> Vec<CartLine> {
    self.state().cart.clone()
  }

  pub fn wishlist(&self) -> Vec<WishlistEntry> {
    self.state().wishlist.clone()
  }

  pub fn wishlist_ids(&self) -> Vec<ProductId> {
    self.state().wishlist_ids()
  }

  pub fn is_wishlisted(&self, id: ProductId) -> bool {
    self.state().is_wishlisted(id)
  }

  pub fn cart_total(&self) -> Decimal {
    self.state().cart_total()
  }

  pub fn cart_count(&self) -> usize {
    self.state().cart_count()
  }

  pub fn is_pending(&self, kind: MutationKind, id: ProductId) -> bool {
    self.guards.is_pending(kind, id)
  }

  // ---------------------------------------------------------------------------
  // Orders
  // ---------------------------------------------------------------------------

  /// The signed-in user's orders, newest first.
  pub async fn orders(&self) -> SyncResult<Vec<Order>> {
    let token = self.require_token()?;
    let token = token.as_str();
    let generation = self.generation();

    let result = self.executor.execute(move || self.api.list_orders(token)).await;
    let mut orders = self.settle(result, generation, "Failed to fetch orders.")?;
    orders.sort_by(|a, b| b.order_date.cmp(&a.order_date));
    Ok(orders)
  }

  pub async fn order(&self, order_id: u64) -> SyncResult<Order> {
    let token = self.require_token()?;
    let token = token.as_str();
    let generation = self.generation();

    let result = self
      .executor
      .execute(move || self.api.get_order(token, order_id))
      .await;
    self.settle(result, generation, "Failed to fetch the order.")
  }

  /// Turn the server-side cart into an order. Never retried.
  pub async fn checkout(&self) -> SyncResult<Order> {
    let token = self.require_token()?;
    let token = token.as_str();
    let generation = self.generation();

    let result = self
      .executor
      .single_attempt()
      .execute(move || self.api.checkout(token))
      .await;
    let order = self.settle(result, generation, "Checkout failed. Please try again.")?;
    info!(order_id = order.id, "Order placed");
    Ok(order)
  }

  /// Confirm payment for an order. On success the local cart is emptied. Never retried.
  pub async fn confirm_payment(&self, order_id: u64) -> SyncResult<()> {
    let token = self.require_token()?;
    let token = token.as_str();
    let generation = self.generation();

    let result = self
      .executor
      .single_attempt()
      .execute(move || self.api.confirm_payment(token, order_id))
      .await;
    self.settle(result, generation, "Payment failed. Please try again.")?;

    if self.generation() == generation {
      self.state().cart.clear();
    }
    info!(order_id, "Payment confirmed");
    self.notifier.success("Payment successful!");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::ManualClock;
  use crate::db::MemoryStore;
  use crate::notice::{self, Notice, NoticeLevel};
  use crate::testing::{grant, order, product, test_config, FakeApi};
  use tokio::sync::mpsc::UnboundedReceiver;

  struct Harness {
    layer: SyncLayer<FakeApi>,
    api: FakeApi,
    storage: Arc<dyn PersistentStore>,
    clock: ManualClock,
    rx: UnboundedReceiver<Notice>,
  }

  fn harness_with(api: FakeApi, storage: Arc<dyn PersistentStore>) -> Harness {
    let clock = ManualClock::default();
    let (notifier, rx) = notice::channel();
    let layer = SyncLayer::with_clock(
      api.clone(),
      storage.clone(),
      &test_config(),
      notifier,
      Arc::new(clock.clone()),
    );
    Harness {
      layer,
      api,
      storage,
      clock,
      rx,
    }
  }

  fn harness() -> Harness {
    harness_with(FakeApi::new(), Arc::new(MemoryStore::new()))
  }

  fn messages(rx: &mut UnboundedReceiver<Notice>) -> Vec<String> {
    notice::drain(rx).into_iter().map(|n| n.message).collect()
  }

  #[tokio::test]
  async fn test_fresh_page_is_served_without_network() {
    let h = harness();
    h.api.add_product(product(1, "Mug", 1200));

    let first = h.layer.products(&ProductQuery::default()).await.unwrap();
    let second = h.layer.products(&ProductQuery::default()).await.unwrap();

    assert_eq!(first.source, CacheSource::Network);
    assert_eq!(second.source, CacheSource::Cache);
    assert_eq!(second.data, first.data);
    assert_eq!(h.api.calls("list_products"), 1);
  }

  #[tokio::test]
  async fn test_page_refetched_after_ttl() {
    let h = harness();
    h.api.add_product(product(1, "Mug", 1200));

    h.layer.products(&ProductQuery::default()).await.unwrap();
    h.clock.advance(chrono::Duration::seconds(301));
    let again = h.layer.products(&ProductQuery::default()).await.unwrap();

    assert_eq!(again.source, CacheSource::Network);
    assert_eq!(h.api.calls("list_products"), 2);
  }

  #[tokio::test]
  async fn test_stale_detail_served_offline_with_warning() {
    let mut h = harness();
    h.api.add_product(product(3, "Lamp", 4000));
    h.layer.product(ProductId(3)).await.unwrap();

    h.clock.advance(chrono::Duration::seconds(601));
    h.api.fail_always("get_product", SyncError::Timeout);
    let result = h.layer.product(ProductId(3)).await.unwrap();

    assert!(result.is_degraded());
    assert_eq!(result.data.name, "Lamp");
    let notices = notice::drain(&mut h.rx);
    assert!(notices
      .iter()
      .any(|n| n.level == NoticeLevel::Warning && n.message == OFFLINE_NOTICE));
  }

  #[tokio::test]
  async fn test_detail_miss_with_failure_is_error() {
    let h = harness();
    h.api.fail_always("get_product", SyncError::Connection("refused".into()));
    let err = h.layer.product(ProductId(9)).await.unwrap_err();
    assert!(matches!(err, SyncError::Connection(_)));
    // Retried up to the attempt budget before giving up.
    assert_eq!(h.api.calls("get_product"), 3);
  }

  #[tokio::test]
  async fn test_distinct_queries_use_distinct_entries() {
    let h = harness();
    h.api.add_product(product(1, "Mug", 1200));

    let sale = ProductQuery {
      on_sale: true,
      ..Default::default()
    };
    h.layer.products(&ProductQuery::default()).await.unwrap();
    h.layer.products(&sale).await.unwrap();
    assert_eq!(h.api.calls("list_products"), 2);
  }

  #[tokio::test]
  async fn test_caches_survive_restart() {
    let storage: Arc<dyn PersistentStore> = Arc::new(MemoryStore::new());
    let api = FakeApi::new();
    api.add_product(product(2, "Chair", 9900));

    let first = harness_with(api.clone(), storage.clone());
    first.layer.product(ProductId(2)).await.unwrap();
    first.layer.categories().await.unwrap();

    let second = harness_with(api.clone(), storage);
    assert_eq!(second.layer.init().await, None);
    let cached = second.layer.product(ProductId(2)).await.unwrap();
    assert_eq!(cached.source, CacheSource::Cache);
    assert_eq!(api.calls("get_product"), 1);
  }

  #[tokio::test]
  async fn test_corrupt_cache_snapshot_is_discarded() {
    let h = harness();
    h.storage.save(keys::DETAIL_CACHE, b"not json").unwrap();

    h.layer.init().await;
    assert_eq!(h.storage.load(keys::DETAIL_CACHE).unwrap(), None);
  }

  #[tokio::test]
  async fn test_login_establishes_session_and_reconciles() {
    let mut h = harness();
    h.api.set_grant(grant("tok-1", "Ada"));
    h.api.add_product(product(1, "Mug", 1200));
    h.api.set_remote_cart(vec![(1, 2)]);

    let profile = h.layer.login(" ada@example.com ", "secret").await.unwrap();

    assert_eq!(profile.email, "ada@example.com");
    assert!(h.layer.is_signed_in());
    assert_eq!(h.layer.cart()[0].quantity, 2);
    assert!(messages(&mut h.rx).contains(&"Welcome back, Ada!".to_string()));
  }

  #[tokio::test]
  async fn test_failed_login_surfaces_server_message() {
    let mut h = harness();
    h.api.fail_always(
      "login",
      SyncError::from_status(400, Some("Invalid credentials".into())),
    );

    let err = h.layer.login("ada@example.com", "bad").await.unwrap_err();
    assert!(matches!(err, SyncError::Rejected { status: 400, .. }));
    assert!(!h.layer.is_signed_in());
    assert_eq!(messages(&mut h.rx), vec!["Invalid credentials".to_string()]);
  }

  #[tokio::test]
  async fn test_signup_rejects_mismatched_passwords_locally() {
    let h = harness();
    let err = h
      .layer
      .signup("Ada", "ada@example.com", "one", "two")
      .await
      .unwrap_err();
    assert!(matches!(err, SyncError::InvalidInput(_)));
    assert_eq!(h.api.calls("signup"), 0);
  }

  #[tokio::test]
  async fn test_signup_signs_in() {
    let h = harness();
    h.api.set_grant(grant("tok-9", "Grace"));
    let profile = h
      .layer
      .signup("Grace", "grace@example.com", "pw", "pw")
      .await
      .unwrap();
    assert_eq!(profile.name, "Grace");
    assert_eq!(h.layer.profile(), Some(profile));
  }

  #[tokio::test]
  async fn test_logout_clears_everything() {
    let mut h = harness();
    h.api.set_grant(grant("tok-1", "Ada"));
    h.api.add_product(product(1, "Mug", 1200));
    h.api.set_remote_cart(vec![(1, 1)]);
    h.api.set_remote_wishlist(vec![1]);
    h.layer.login("ada@example.com", "pw").await.unwrap();
    h.layer.products(&ProductQuery::default()).await.unwrap();

    h.layer.logout().unwrap();

    assert!(!h.layer.is_signed_in());
    assert!(h.layer.cart().is_empty());
    assert!(h.layer.wishlist().is_empty());
    assert!(h.layer.pages.is_empty());
    assert!(h.layer.details.is_empty());
    assert!(h.layer.guards.is_empty());
    for key in keys::ALL {
      assert_eq!(h.storage.load(key).unwrap(), None, "{key} survived logout");
    }
    assert!(messages(&mut h.rx).contains(&"You have been logged out.".to_string()));
  }

  #[tokio::test]
  async fn test_restored_session_reconciles_on_init() {
    let storage: Arc<dyn PersistentStore> = Arc::new(MemoryStore::new());
    let api = FakeApi::new();
    api.set_grant(grant("tok-1", "Ada"));
    api.add_product(product(4, "Desk", 25000));
    api.set_remote_wishlist(vec![4]);

    let first = harness_with(api.clone(), storage.clone());
    first.layer.login("ada@example.com", "pw").await.unwrap();
    first.layer.teardown();

    let second = harness_with(api, storage);
    let profile = second.layer.init().await.unwrap();
    assert_eq!(profile.name, "Ada");
    assert_eq!(second.layer.wishlist_ids(), vec![ProductId(4)]);
  }

  #[tokio::test]
  async fn test_orders_sorted_newest_first() {
    let h = harness();
    h.api.set_grant(grant("tok-1", "Ada"));
    h.api.set_orders(vec![
      order(1, "2024-01-01T10:00:00Z"),
      order(2, "2024-03-01T10:00:00Z"),
      order(3, "2024-02-01T10:00:00Z"),
    ]);
    h.layer.login("ada@example.com", "pw").await.unwrap();

    let ids: Vec<u64> = h.layer.orders().await.unwrap().iter().map(|o| o.id).collect();
    assert_eq!(ids, vec![2, 3, 1]);
  }

  #[tokio::test]
  async fn test_orders_require_session() {
    let mut h = harness();
    assert_eq!(h.layer.orders().await.unwrap_err(), SyncError::AuthRequired);
    assert_eq!(h.api.calls("list_orders"), 0);
    assert_eq!(
      messages(&mut h.rx),
      vec!["Please log in to perform this action.".to_string()]
    );
  }

  #[tokio::test]
  async fn test_unauthorized_ends_session() {
    let mut h = harness();
    h.api.set_grant(grant("tok-1", "Ada"));
    h.layer.login("ada@example.com", "pw").await.unwrap();
    notice::drain(&mut h.rx);

    h.api.fail_always("list_orders", SyncError::from_status(401, None));
    h.layer.orders().await.unwrap_err();

    assert!(!h.layer.is_signed_in());
    assert_eq!(h.storage.load(keys::SESSION).unwrap(), None);
    assert_eq!(messages(&mut h.rx), vec![EXPIRED_NOTICE.to_string()]);
  }

  #[tokio::test]
  async fn test_checkout_is_never_retried() {
    let h = harness();
    h.api.set_grant(grant("tok-1", "Ada"));
    h.layer.login("ada@example.com", "pw").await.unwrap();

    h.api.fail_always("checkout", SyncError::from_status(503, None));
    h.layer.checkout().await.unwrap_err();
    assert_eq!(h.api.calls("checkout"), 1);
  }

  #[tokio::test]
  async fn test_payment_clears_local_cart() {
    let h = harness();
    h.api.set_grant(grant("tok-1", "Ada"));
    h.api.add_product(product(1, "Mug", 1200));
    h.api.set_remote_cart(vec![(1, 2)]);
    h.layer.login("ada@example.com", "pw").await.unwrap();

    let order = h.layer.checkout().await.unwrap();
    h.layer.confirm_payment(order.id).await.unwrap();
    assert!(h.layer.cart().is_empty());
  }

  #[tokio::test]
  async fn test_failed_payment_keeps_cart() {
    let mut h = harness();
    h.api.set_grant(grant("tok-1", "Ada"));
    h.api.add_product(product(1, "Mug", 1200));
    h.api.set_remote_cart(vec![(1, 2)]);
    h.layer.login("ada@example.com", "pw").await.unwrap();
    notice::drain(&mut h.rx);

    h.api.fail_always("confirm_payment", SyncError::from_status(502, None));
    h.layer.confirm_payment(7).await.unwrap_err();
    assert_eq!(h.layer.cart_count(), 1);
    assert_eq!(
      messages(&mut h.rx),
      vec!["Payment failed. Please try again.".to_string()]
    );
  }
}
