//! Movie repository that wraps a [`MovieSource`] with transparent caching.

use std::sync::Arc;

use crate::cache::{CacheLayer, CacheResult, CacheStorage};
use crate::retry::RetryPolicy;

use super::cache::ListKey;
use super::client::MovieSource;
use super::error::FetchError;
use super::types::{Category, Movie, MovieDetail};

/// Movie catalogue with caching and offline support.
///
/// Curated lists and details are read through the cache; every upstream call
/// goes through the retry policy. Search results are never cached.
pub struct Repository<S: CacheStorage, M: MovieSource> {
  source: Arc<M>,
  cache: CacheLayer<S>,
  retry: RetryPolicy,
}

impl<S: CacheStorage, M: MovieSource> Repository<S, M> {
  pub fn new(source: Arc<M>, cache: CacheLayer<S>, retry: RetryPolicy) -> Self {
    Self {
      source,
      cache,
      retry,
    }
  }

  pub fn cache(&self) -> &CacheLayer<S> {
    &self.cache
  }

  pub async fn popular(&self, page: u32) -> Result<CacheResult<Vec<Movie>>, FetchError> {
    self.list(Category::Popular, page).await
  }

  pub async fn top_rated(&self, page: u32) -> Result<CacheResult<Vec<Movie>>, FetchError> {
    self.list(Category::TopRated, page).await
  }

  pub async fn upcoming(&self, page: u32) -> Result<CacheResult<Vec<Movie>>, FetchError> {
    self.list(Category::Upcoming, page).await
  }

  /// Get one page of a curated list with caching.
  pub async fn list(
    &self,
    category: Category,
    page: u32,
  ) -> Result<CacheResult<Vec<Movie>>, FetchError> {
    let key = ListKey::new(category, page).to_string();

    self
      .cache
      .fetch_list(&key, || {
        self
          .retry
          .run(|| self.source.fetch_list(category, page))
      })
      .await
  }

  /// Search by title (not cached - results are specific to the query text).
  ///
  /// Blank text yields an empty result without a request.
  pub async fn search(&self, query: &str, page: u32) -> Result<CacheResult<Vec<Movie>>, FetchError> {
    let query = query.trim();
    if query.is_empty() {
      return Ok(CacheResult::from_network(Vec::new()));
    }

    let movies = self
      .retry
      .run(|| self.source.search(query, page))
      .await?;

    Ok(CacheResult::from_network(movies))
  }

  /// Get a single movie's details with caching.
  pub async fn detail(&self, id: u64) -> Result<CacheResult<MovieDetail>, FetchError> {
    self
      .cache
      .fetch_one(&id.to_string(), || {
        self.retry.run(|| self.source.fetch_detail(id))
      })
      .await
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use crate::cache::{CacheSource, Clock, ManualClock, SqliteStorage};
  use crate::tmdb::client::tests::{mock_client, POPULAR_PAGE};
  use crate::tmdb::error::ErrorKind;
  use async_trait::async_trait;
  use chrono::Duration;
  use mockito::{Matcher, Server};
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Mutex;
  use tokio::time::Instant;

  pub(crate) fn movie(id: u64) -> Movie {
    Movie {
      id,
      title: format!("Movie {}", id),
      overview: String::new(),
      poster_url: String::new(),
      backdrop_url: String::new(),
      release_date: "2024-01-01".to_string(),
      vote_average: 7.0,
      vote_count: 100,
    }
  }

  pub(crate) fn detail(id: u64) -> MovieDetail {
    MovieDetail {
      id,
      title: format!("Movie {}", id),
      overview: String::new(),
      poster_url: String::new(),
      backdrop_url: String::new(),
      release_date: "2024-01-01".to_string(),
      vote_average: 7.0,
      vote_count: 100,
      genres: vec!["Drama".to_string()],
      runtime: Some(120),
      tagline: None,
    }
  }

  /// Source that answers every call with the same configured result.
  pub(crate) struct FakeSource {
    list: Result<Vec<Movie>, FetchError>,
    detail: Result<MovieDetail, FetchError>,
    calls: AtomicUsize,
    call_times: Mutex<Vec<Instant>>,
  }

  impl FakeSource {
    pub fn returning(movies: Vec<Movie>) -> Self {
      Self {
        list: Ok(movies),
        detail: Err(FetchError::from_status(404, "not configured")),
        calls: AtomicUsize::new(0),
        call_times: Mutex::new(Vec::new()),
      }
    }

    pub fn failing(err: FetchError) -> Self {
      Self {
        list: Err(err.clone()),
        detail: Err(err),
        calls: AtomicUsize::new(0),
        call_times: Mutex::new(Vec::new()),
      }
    }

    pub fn with_detail(mut self, detail: MovieDetail) -> Self {
      self.detail = Ok(detail);
      self
    }

    pub fn calls(&self) -> usize {
      self.calls.load(Ordering::SeqCst)
    }

    fn record(&self) {
      self.calls.fetch_add(1, Ordering::SeqCst);
      self.call_times.lock().unwrap().push(Instant::now());
    }
  }

  #[async_trait]
  impl MovieSource for FakeSource {
    async fn fetch_list(&self, _category: Category, _page: u32) -> Result<Vec<Movie>, FetchError> {
      self.record();
      self.list.clone()
    }

    async fn search(&self, _query: &str, _page: u32) -> Result<Vec<Movie>, FetchError> {
      self.record();
      self.list.clone()
    }

    async fn fetch_detail(&self, _id: u64) -> Result<MovieDetail, FetchError> {
      self.record();
      self.detail.clone()
    }
  }

  pub(crate) struct Fixture {
    pub repo: Repository<SqliteStorage, FakeSource>,
    pub source: Arc<FakeSource>,
    pub clock: Arc<ManualClock>,
  }

  pub(crate) fn fixture(source: FakeSource) -> Fixture {
    let clock = Arc::new(ManualClock::default());
    let storage = SqliteStorage::open_in_memory()
      .unwrap()
      .with_clock(clock.clone());
    let cache = CacheLayer::new(storage);
    let source = Arc::new(source);
    let repo = Repository::new(Arc::clone(&source), cache, RetryPolicy::default());

    Fixture {
      repo,
      source,
      clock,
    }
  }

  fn cached_ids(fx: &Fixture, key: &str) -> Vec<u64> {
    fx.repo
      .cache()
      .storage()
      .get_list::<Movie>(key)
      .unwrap()
      .into_iter()
      .map(|e| e.payload.id)
      .collect()
  }

  #[tokio::test(start_paused = true)]
  async fn test_empty_cache_fetch_success_populates_cache() {
    let fx = fixture(FakeSource::returning(vec![movie(1), movie(2)]));

    let result = fx.repo.popular(1).await.unwrap();

    assert_eq!(result.source, CacheSource::Network);
    assert_eq!(result.data, vec![movie(1), movie(2)]);
    let entries = fx.repo.cache().storage().get_list::<Movie>("popular:1").unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.stored_at == fx.clock.now()));
  }

  #[tokio::test(start_paused = true)]
  async fn test_fresh_cache_is_served_without_fetching() {
    let fx = fixture(FakeSource::returning(vec![movie(9)]));
    fx.repo
      .cache()
      .storage()
      .put_list("top_rated:1", &[movie(1), movie(2), movie(3)])
      .unwrap();
    fx.clock.advance(Duration::hours(23) + Duration::minutes(59));

    let result = fx.repo.top_rated(1).await.unwrap();

    assert_eq!(fx.source.calls(), 0);
    assert_eq!(result.source, CacheSource::CacheFresh);
    assert_eq!(result.data.len(), 3);
  }

  #[tokio::test(start_paused = true)]
  async fn test_expired_cache_triggers_fetch() {
    let fx = fixture(FakeSource::returning(vec![movie(9)]));
    fx.repo
      .cache()
      .storage()
      .put_list("upcoming:1", &[movie(1)])
      .unwrap();
    fx.clock.advance(Duration::hours(24) + Duration::seconds(1));

    let result = fx.repo.upcoming(1).await.unwrap();

    assert_eq!(fx.source.calls(), 1);
    assert_eq!(result.source, CacheSource::Network);
    assert_eq!(cached_ids(&fx, "upcoming:1"), vec![9]);
  }

  #[tokio::test(start_paused = true)]
  async fn test_stale_cache_served_when_all_attempts_time_out() {
    let fx = fixture(FakeSource::failing(FetchError::NoConnection(
      "operation timed out".to_string(),
    )));
    fx.repo
      .cache()
      .storage()
      .put_list("popular:1", &[movie(1)])
      .unwrap();
    fx.clock.advance(Duration::hours(25));

    let result = fx.repo.popular(1).await.unwrap();

    assert_eq!(fx.source.calls(), 3);
    assert_eq!(result.source, CacheSource::Offline);
    assert_eq!(result.data, vec![movie(1)]);
  }

  #[tokio::test(start_paused = true)]
  async fn test_fallback_applies_to_every_error_kind() {
    for err in [
      FetchError::from_status(401, "Invalid API key"),
      FetchError::from_status(500, ""),
      FetchError::NoConnection("refused".to_string()),
      FetchError::Unknown("Empty response body".to_string()),
    ] {
      let fx = fixture(FakeSource::failing(err));
      fx.repo
        .cache()
        .storage()
        .put_list("popular:1", &[movie(1)])
        .unwrap();
      fx.clock.advance(Duration::days(3));

      let result = fx.repo.popular(1).await.unwrap();
      assert!(result.is_offline());
    }
  }

  #[tokio::test(start_paused = true)]
  async fn test_server_errors_retry_with_backoff_then_surface() {
    let fx = fixture(FakeSource::failing(FetchError::from_status(503, "")));

    let err = fx.repo.popular(1).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Server);
    let times = fx.source.call_times.lock().unwrap().clone();
    assert_eq!(times.len(), 3);
    assert_eq!(times[1] - times[0], std::time::Duration::from_millis(1000));
    assert_eq!(times[2] - times[1], std::time::Duration::from_millis(2000));
    assert!(cached_ids(&fx, "popular:1").is_empty());
  }

  #[tokio::test(start_paused = true)]
  async fn test_not_found_is_not_retried() {
    let fx = fixture(FakeSource::failing(FetchError::from_status(404, "")));

    let err = fx.repo.detail(42).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Network);
    assert_eq!(fx.source.calls(), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_pages_are_cached_independently() {
    let fx = fixture(FakeSource::returning(vec![movie(1)]));

    fx.repo.popular(1).await.unwrap();
    fx.repo.popular(2).await.unwrap();
    let again = fx.repo.popular(1).await.unwrap();

    assert_eq!(fx.source.calls(), 2);
    assert_eq!(again.source, CacheSource::CacheFresh);
  }

  #[tokio::test(start_paused = true)]
  async fn test_search_bypasses_cache() {
    let fx = fixture(FakeSource::returning(vec![movie(1)]));

    fx.repo.search("matrix", 1).await.unwrap();
    let second = fx.repo.search("matrix", 1).await.unwrap();

    assert_eq!(fx.source.calls(), 2);
    assert_eq!(second.source, CacheSource::Network);
  }

  #[tokio::test(start_paused = true)]
  async fn test_search_failure_is_not_masked() {
    let fx = fixture(FakeSource::failing(FetchError::NoConnection("down".to_string())));

    let err = fx.repo.search("matrix", 1).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NoConnection);
    assert_eq!(fx.source.calls(), 3);
  }

  #[tokio::test(start_paused = true)]
  async fn test_blank_search_makes_no_request() {
    let fx = fixture(FakeSource::returning(vec![movie(1)]));

    let result = fx.repo.search("   ", 1).await.unwrap();

    assert!(result.data.is_empty());
    assert_eq!(fx.source.calls(), 0);
  }

  #[tokio::test(start_paused = true)]
  async fn test_detail_is_cached_by_id() {
    let fx = fixture(FakeSource::returning(Vec::new()).with_detail(detail(7)));

    let first = fx.repo.detail(7).await.unwrap();
    let second = fx.repo.detail(7).await.unwrap();

    assert_eq!(first.source, CacheSource::Network);
    assert_eq!(second.source, CacheSource::CacheFresh);
    assert_eq!(second.data, detail(7));
    assert_eq!(fx.source.calls(), 1);
  }

  #[tokio::test]
  async fn test_real_client_retries_server_errors() {
    let mut server = Server::new_async().await;
    let mock = server
      .mock("GET", "/3/movie/popular")
      .match_query(Matcher::Any)
      .with_status(503)
      .with_body(r#"{"status_message":"Service unavailable"}"#)
      .expect(3)
      .create_async()
      .await;
    let policy = RetryPolicy {
      initial_delay: std::time::Duration::from_millis(5),
      max_delay: std::time::Duration::from_millis(20),
      ..RetryPolicy::default()
    };
    let repo = Repository::new(
      Arc::new(mock_client(&server)),
      CacheLayer::new(SqliteStorage::open_in_memory().unwrap()),
      policy,
    );

    let err = repo.popular(1).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Server);
    mock.assert_async().await;
  }

  #[tokio::test]
  async fn test_real_client_does_not_retry_not_found() {
    let mut server = Server::new_async().await;
    let mock = server
      .mock("GET", "/3/movie/1")
      .match_query(Matcher::Any)
      .with_status(404)
      .with_body(r#"{"status_message":"Not found"}"#)
      .expect(1)
      .create_async()
      .await;
    let repo = Repository::new(
      Arc::new(mock_client(&server)),
      CacheLayer::new(SqliteStorage::open_in_memory().unwrap()),
      RetryPolicy::default(),
    );

    let err = repo.detail(1).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Network);
    mock.assert_async().await;
  }

  #[tokio::test]
  async fn test_real_client_populates_cache() {
    let mut server = Server::new_async().await;
    let mock = server
      .mock("GET", "/3/movie/popular")
      .match_query(Matcher::UrlEncoded("page".into(), "1".into()))
      .with_status(200)
      .with_body(POPULAR_PAGE)
      .expect(1)
      .create_async()
      .await;
    let repo = Repository::new(
      Arc::new(mock_client(&server)),
      CacheLayer::new(SqliteStorage::open_in_memory().unwrap()),
      RetryPolicy::default(),
    );

    let first = repo.popular(1).await.unwrap();
    let second = repo.popular(1).await.unwrap();

    assert_eq!(first.data.len(), 2);
    assert_eq!(second.source, CacheSource::CacheFresh);
    mock.assert_async().await;
  }
}
