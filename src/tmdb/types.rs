use serde::{Deserialize, Serialize};
use std::fmt;

/// Curated movie lists offered by the catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
  Popular,
  TopRated,
  Upcoming,
}

impl Category {
  pub const ALL: [Category; 3] = [Category::Popular, Category::TopRated, Category::Upcoming];

  /// Stable name used in API paths and cache keys.
  pub fn as_str(&self) -> &'static str {
    match self {
      Category::Popular => "popular",
      Category::TopRated => "top_rated",
      Category::Upcoming => "upcoming",
    }
  }
}

impl fmt::Display for Category {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.pad(self.as_str())
  }
}

/// Movie summary for list views
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
  pub id: u64,
  pub title: String,
  pub overview: String,
  pub poster_url: String,
  pub backdrop_url: String,
  pub release_date: String,
  pub vote_average: f64,
  pub vote_count: u32,
}

/// Full movie details
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieDetail {
  pub id: u64,
  pub title: String,
  pub overview: String,
  pub poster_url: String,
  pub backdrop_url: String,
  pub release_date: String,
  pub vote_average: f64,
  pub vote_count: u32,
  pub genres: Vec<String>,
  pub runtime: Option<u32>, // minutes
  pub tagline: Option<String>,
}
