use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub retry: RetryConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
  /// Base URL of the storefront API, e.g. `https://shop.example.com/api`
  pub base_url: String,
  /// Per-attempt timeout. The backend is slow; keep this generous.
  pub timeout_secs: u64,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url: "http://localhost:8080/api".to_string(),
      timeout_secs: 30,
    }
  }
}

impl ApiConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs)
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
  /// Total attempts per request, including the first
  pub max_attempts: u32,
  pub base_delay_ms: u64,
  pub max_delay_ms: u64,
  /// Scale each backoff delay by a random factor in [0.5, 1.0]
  pub jitter: bool,
}

impl Default for RetryConfig {
  fn default() -> Self {
    Self {
      max_attempts: 3,
      base_delay_ms: 500,
      max_delay_ms: 8_000,
      jitter: false,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  pub page_ttl_secs: i64,
  pub page_capacity: usize,
  /// Product detail changes less often than a filtered listing
  pub detail_ttl_secs: i64,
  pub detail_capacity: usize,
  /// Snapshot caches to storage so they survive a restart
  pub persist: bool,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      page_ttl_secs: 300,
      page_capacity: 20,
      detail_ttl_secs: 600,
      detail_capacity: 50,
      persist: true,
    }
  }
}

impl CacheConfig {
  pub fn page_ttl(&self) -> chrono::Duration {
    chrono::Duration::seconds(self.page_ttl_secs)
  }

  pub fn detail_ttl(&self) -> chrono::Duration {
    chrono::Duration::seconds(self.detail_ttl_secs)
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
  /// SQLite file for the session and cache snapshots (default: data dir)
  pub path: Option<PathBuf>,
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./storefront.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/storefront-sync/config.yaml
  ///
  /// Without an explicit path, a missing file means defaults.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Config::default(),
    };

    Ok(config.with_env_overrides())
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("storefront.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("storefront-sync").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    Ok(config)
  }

  /// Apply `STOREFRONT_API_URL`, if set.
  fn with_env_overrides(mut self) -> Self {
    if let Ok(url) = std::env::var("STOREFRONT_API_URL") {
      if !url.trim().is_empty() {
        self.api.base_url = url;
      }
    }
    self
  }

  /// Get the account password from the environment.
  ///
  /// Checks STOREFRONT_PASSWORD.
  pub fn get_password() -> Result<String> {
    std::env::var("STOREFRONT_PASSWORD")
      .map_err(|_| eyre!("Password not found. Set the STOREFRONT_PASSWORD environment variable."))
  }
}
