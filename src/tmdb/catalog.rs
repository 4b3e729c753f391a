//! Query-handle front end over the movie repository.
//!
//! Each operation returns a started [`Query`], already in `Loading`, that
//! resolves to exactly one terminal state.

use std::sync::Arc;

use crate::cache::{CacheResult, CacheStorage};
use crate::query::Query;

use super::client::MovieSource;
use super::repository::Repository;
use super::types::{Category, Movie, MovieDetail};

pub type MoviesQuery = Query<CacheResult<Vec<Movie>>>;
pub type DetailQuery = Query<CacheResult<MovieDetail>>;

/// Shared entry point for UI-facing code.
pub struct Catalog<S: CacheStorage, M: MovieSource> {
  repo: Arc<Repository<S, M>>,
}

impl<S, M> Catalog<S, M>
where
  S: CacheStorage + 'static,
  M: MovieSource + 'static,
{
  pub fn new(repo: Repository<S, M>) -> Self {
    Self {
      repo: Arc::new(repo),
    }
  }

  pub fn query_popular(&self, page: u32) -> MoviesQuery {
    self.query_list(Category::Popular, page)
  }

  pub fn query_top_rated(&self, page: u32) -> MoviesQuery {
    self.query_list(Category::TopRated, page)
  }

  pub fn query_upcoming(&self, page: u32) -> MoviesQuery {
    self.query_list(Category::Upcoming, page)
  }

  pub fn query_list(&self, category: Category, page: u32) -> MoviesQuery {
    let repo = Arc::clone(&self.repo);
    started(Query::new(move || {
      let repo = Arc::clone(&repo);
      async move { repo.list(category, page).await }
    }))
  }

  pub fn query_search(&self, text: &str, page: u32) -> MoviesQuery {
    let repo = Arc::clone(&self.repo);
    let text = text.to_string();
    started(Query::new(move || {
      let repo = Arc::clone(&repo);
      let text = text.clone();
      async move { repo.search(&text, page).await }
    }))
  }

  pub fn query_detail(&self, id: u64) -> DetailQuery {
    let repo = Arc::clone(&self.repo);
    started(Query::new(move || {
      let repo = Arc::clone(&repo);
      async move { repo.detail(id).await }
    }))
  }
}

impl<S: CacheStorage, M: MovieSource> Clone for Catalog<S, M> {
  fn clone(&self) -> Self {
    Self {
      repo: Arc::clone(&self.repo),
    }
  }
}

fn started<T: Send + 'static>(mut query: Query<T>) -> Query<T> {
  query.fetch();
  query
}
