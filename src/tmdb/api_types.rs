//! Serde-deserializable types matching TMDb API responses.
//!
//! These types are separate from domain types to allow clean deserialization
//! while keeping domain types focused on application needs.

use serde::Deserialize;

use crate::config::ImagesConfig;
use crate::tmdb::types::{Movie, MovieDetail};

// ============================================================================
// List endpoints (movie/{category}, search/movie)
// ============================================================================

/// Paging metadata (`page`, `total_pages`, ...) is ignored; callers ask for pages explicitly.
#[derive(Debug, Deserialize)]
pub struct ApiMoviePage {
  pub results: Vec<ApiMovie>,
}

#[derive(Debug, Deserialize)]
pub struct ApiMovie {
  pub id: u64,
  #[serde(default)]
  pub title: String,
  #[serde(default)]
  pub overview: String,
  pub poster_path: Option<String>,
  pub backdrop_path: Option<String>,
  #[serde(default)]
  pub release_date: String,
  #[serde(default)]
  pub vote_average: f64,
  #[serde(default)]
  pub vote_count: u32,
}

impl ApiMovie {
  pub fn into_movie(self, images: &ImagesConfig) -> Movie {
    Movie {
      id: self.id,
      poster_url: images.poster_url(self.poster_path.as_deref()),
      backdrop_url: images.backdrop_url(self.backdrop_path.as_deref()),
      title: self.title,
      overview: self.overview,
      release_date: self.release_date,
      vote_average: self.vote_average,
      vote_count: self.vote_count,
    }
  }
}

// ============================================================================
// Error body returned alongside non-2xx statuses
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiStatus {
  pub status_message: String,
}

// ============================================================================
// Detail endpoint (movie/{id})
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiGenre {
  pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiMovieDetail {
  pub id: u64,
  #[serde(default)]
  pub title: String,
  #[serde(default)]
  pub overview: String,
  pub poster_path: Option<String>,
  pub backdrop_path: Option<String>,
  #[serde(default)]
  pub release_date: String,
  #[serde(default)]
  pub vote_average: f64,
  #[serde(default)]
  pub vote_count: u32,
  #[serde(default)]
  pub genres: Vec<ApiGenre>,
  pub runtime: Option<u32>,
  pub tagline: Option<String>,
}

impl ApiMovieDetail {
  pub fn into_detail(self, images: &ImagesConfig) -> MovieDetail {
    MovieDetail {
      id: self.id,
      poster_url: images.poster_url(self.poster_path.as_deref()),
      backdrop_url: images.backdrop_url(self.backdrop_path.as_deref()),
      title: self.title,
      overview: self.overview,
      release_date: self.release_date,
      vote_average: self.vote_average,
      vote_count: self.vote_count,
      genres: self.genres.into_iter().map(|g| g.name).collect(),
      runtime: self.runtime,
      // TMDb sends "" rather than null for movies without a tagline
      tagline: self.tagline.filter(|t| !t.is_empty()),
    }
  }
}
