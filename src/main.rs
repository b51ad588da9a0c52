use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use storefront_sync::api::types::{Product, ProductId, ProductQuery};
use storefront_sync::api::HttpApi;
use storefront_sync::config::Config;
use storefront_sync::db::{PersistentStore, SqliteStore};
use storefront_sync::notice::{self, Notice, NoticeLevel};
use storefront_sync::sync::MutationOutcome;
use storefront_sync::SyncLayer;

#[derive(Parser, Debug)]
#[command(name = "storefront-sync")]
#[command(about = "Browse a storefront and manage your cart from the terminal")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/storefront-sync/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List products
  Products {
    #[arg(long, default_value_t = 0)]
    page: u32,
    #[arg(long, default_value_t = 9)]
    size: u32,
    #[arg(long, default_value = "rating-desc")]
    sort: String,
    #[arg(long)]
    search: Option<String>,
    #[arg(long)]
    category: Option<u64>,
    #[arg(long)]
    min_price: Option<Decimal>,
    #[arg(long)]
    max_price: Option<Decimal>,
    /// Only new arrivals
    #[arg(long)]
    new: bool,
    /// Only discounted products
    #[arg(long)]
    sale: bool,
  },
  /// Show one product
  Product { id: u64 },
  Categories,
  /// Sign in (password from STOREFRONT_PASSWORD)
  Login { email: String },
  /// Create an account (password from STOREFRONT_PASSWORD)
  Signup { name: String, email: String },
  Logout,
  Whoami,
  Cart,
  /// Add one unit of a product to the cart
  Add { id: u64 },
  /// Set the quantity of a cart line; 0 removes it
  SetQty { id: u64, qty: u32 },
  Remove { id: u64 },
  Wishlist,
  ToggleWishlist { id: u64 },
  Orders,
  Order { id: u64 },
  Checkout,
  /// Confirm payment for an order
  Pay { order_id: u64 },
}

/// Log to a daily file so stdout stays clean for command output.
fn init_logging() -> Result<WorkerGuard> {
  let dir = dirs::data_dir()
    .ok_or_else(|| eyre!("Could not determine data directory"))?
    .join("storefront-sync")
    .join("logs");
  std::fs::create_dir_all(&dir).map_err(|e| eyre!("Failed to create log directory: {}", e))?;

  let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(
    dir,
    "storefront-sync.log",
  ));
  let filter = EnvFilter::try_from_default_env()
    .unwrap_or_else(|_| EnvFilter::new("storefront_sync=info"));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(false)
    .try_init()
    .map_err(|e| eyre!("Failed to install tracing subscriber: {}", e))?;
  Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;
  let _log_guard = init_logging()?;

  let args = Args::parse();
  let config = Config::load(args.config.as_deref())?;

  let storage: Arc<dyn PersistentStore> = match &config.storage.path {
    Some(path) => Arc::new(SqliteStore::open(path)?),
    None => Arc::new(SqliteStore::open_default()?),
  };
  let api = HttpApi::new(&config.api)?;
  let (notifier, mut notices) = notice::channel();
  let layer = SyncLayer::new(api, storage, &config, notifier);

  layer.init().await;
  let result = run(&layer, args.command).await;
  layer.teardown();

  for notice in notice::drain(&mut notices) {
    print_notice(&notice);
  }
  result
}

async fn run(layer: &SyncLayer<HttpApi>, command: Command) -> Result<()> {
  match command {
    Command::Products {
      page,
      size,
      sort,
      search,
      category,
      min_price,
      max_price,
      new,
      sale,
    } => {
      let query = ProductQuery {
        page,
        size,
        sort,
        search_term: search,
        category_id: category,
        min_price,
        max_price,
        is_new: new,
        on_sale: sale,
      };
      let result = layer.products(&query).await?;
      for product in &result.data.products {
        print_product_row(product, layer.is_wishlisted(product.id));
      }
      println!(
        "page {} of {} ({} products)",
        page + 1,
        result.data.total_pages.max(1),
        result.data.total_elements
      );
    }
    Command::Product { id } => {
      let product = layer.product(ProductId(id)).await?.data;
      print_product_row(&product, layer.is_wishlisted(product.id));
      if let Some(description) = &product.description {
        println!("  {}", description);
      }
      if let Some(category) = &product.category_name {
        println!("  category: {}", category);
      }
      if let Some(rating) = product.rating {
        println!("  rating: {:.1} ({} reviews)", rating, product.reviews.unwrap_or(0));
      }
      println!("  {}", if product.in_stock { "in stock" } else { "out of stock" });
    }
    Command::Categories => {
      for category in layer.categories().await?.data {
        println!("{:>4}  {}", category.id, category.name);
      }
    }
    Command::Login { email } => {
      let password = Config::get_password()?;
      let profile = layer.login(&email, &password).await?;
      println!("Signed in as {} <{}>", profile.name, profile.email);
    }
    Command::Signup { name, email } => {
      let password = Config::get_password()?;
      let profile = layer.signup(&name, &email, &password, &password).await?;
      println!("Signed in as {} <{}>", profile.name, profile.email);
    }
    Command::Logout => layer.logout()?,
    Command::Whoami => match layer.profile() {
      Some(profile) => {
        let role = if profile.is_admin() { " (admin)" } else { "" };
        println!("{} <{}>{}", profile.name, profile.email, role);
      }
      None => println!("Not signed in"),
    },
    Command::Cart => {
      for line in layer.cart() {
        println!(
          "{:>6}  {:<40} {:>3} x {:>10}  {:>10}",
          line.product_id,
          line.name,
          line.quantity,
          line.price,
          line.subtotal()
        );
      }
      println!("{} lines, total {}", layer.cart_count(), layer.cart_total());
    }
    Command::Add { id } => {
      let product = layer.product(ProductId(id)).await?.data;
      outcome(layer.add_to_cart(&product).await)?;
    }
    Command::SetQty { id, qty } => outcome(layer.update_quantity(ProductId(id), qty).await)?,
    Command::Remove { id } => outcome(layer.remove_from_cart(ProductId(id)).await)?,
    Command::Wishlist => {
      for entry in layer.wishlist() {
        println!("{:>6}  {:<40} {:>10}", entry.product_id, entry.name, entry.price);
      }
    }
    Command::ToggleWishlist { id } => {
      let product = layer.product(ProductId(id)).await?.data;
      outcome(layer.toggle_wishlist(&product).await)?;
    }
    Command::Orders => {
      for order in layer.orders().await? {
        println!(
          "#{:<6} {}  {:>10}  {}",
          order.id,
          order.order_date.format("%Y-%m-%d %H:%M"),
          order.total_amount,
          order.status.as_deref().unwrap_or("-")
        );
      }
    }
    Command::Order { id } => {
      let order = layer.order(id).await?;
      println!(
        "Order #{} placed {}  status {}",
        order.id,
        order.order_date.format("%Y-%m-%d %H:%M"),
        order.status.as_deref().unwrap_or("-")
      );
      for item in &order.items {
        println!(
          "  {:<40} {:>3} x {:>10}",
          item.product_name, item.quantity, item.price
        );
      }
      println!("Total {}", order.total_amount);
    }
    Command::Checkout => {
      let order = layer.checkout().await?;
      println!("Order #{} created, total {}", order.id, order.total_amount);
    }
    Command::Pay { order_id } => layer.confirm_payment(order_id).await?,
  }
  Ok(())
}

fn outcome(outcome: MutationOutcome) -> Result<()> {
  match outcome {
    MutationOutcome::RolledBack(err) | MutationOutcome::Rejected(err) => Err(err.into()),
    MutationOutcome::Skipped => Err(eyre!("Another change to this item is still in progress")),
    _ => Ok(()),
  }
}

fn print_product_row(product: &Product, wishlisted: bool) {
  let mut tags = Vec::new();
  if product.is_new {
    tags.push("new");
  }
  if product.on_sale {
    tags.push("sale");
  }
  if wishlisted {
    tags.push("♥");
  }
  println!(
    "{:>6}  {:<40} {:>10}  {}",
    product.id,
    product.name,
    product.price,
    tags.join(" ")
  );
}

fn print_notice(notice: &Notice) {
  let prefix = match notice.level {
    NoticeLevel::Info => "info",
    NoticeLevel::Success => "ok",
    NoticeLevel::Warning => "warning",
    NoticeLevel::Error => "error",
  };
  eprintln!("[{}] {}", prefix, notice.message);
}
