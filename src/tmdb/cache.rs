//! Caching implementations for TMDb types.

use std::fmt;

use crate::cache::Cacheable;

use super::types::{Category, Movie, MovieDetail};

// ============================================================================
// Cacheable implementations
// ============================================================================

impl Cacheable for Movie {
  fn cache_key(&self) -> String {
    self.id.to_string()
  }

  fn entity_type() -> &'static str {
    "movie"
  }
}

impl Cacheable for MovieDetail {
  fn cache_key(&self) -> String {
    self.id.to_string()
  }

  fn entity_type() -> &'static str {
    "movie_detail"
  }
}

// ============================================================================
// Query key types
// ============================================================================

/// Cache key for one page of a curated list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListKey {
  pub category: Category,
  pub page: u32,
}

impl ListKey {
  pub fn new(category: Category, page: u32) -> Self {
    Self { category, page }
  }
}

impl fmt::Display for ListKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.category, self.page)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_list_key_format() {
    assert_eq!(ListKey::new(Category::Popular, 1).to_string(), "popular:1");
    assert_eq!(ListKey::new(Category::TopRated, 3).to_string(), "top_rated:3");
    assert_eq!(ListKey::new(Category::Upcoming, 2).to_string(), "upcoming:2");
  }
}
