//! Cache keys for storefront reads.

use sha2::{Digest, Sha256};

use super::types::ProductQuery;

impl ProductQuery {
  /// Stable page-cache key for this query.
  ///
  /// SHA-256 over the normalized query string, so equivalent queries (differing only in
  /// search-term case or surrounding whitespace) share one entry.
  pub fn cache_key(&self) -> String {
    let input = self
      .to_pairs()
      .into_iter()
      .map(|(k, v)| {
        if k == "searchTerm" {
          format!("{}={}", k, normalize_search(&v))
        } else {
          format!("{}={}", k, v)
        }
      })
      .collect::<Vec<_>>()
      .join("&");

    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
  }
}

/// Trims whitespace and lowercases for case-insensitive matching.
fn normalize_search(term: &str) -> String {
  term.trim().to_lowercase()
}
