//! Cache layer that orchestrates caching logic with network fetching.

use chrono::{DateTime, Duration, Utc};
use color_eyre::Result;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::storage::CacheStorage;
use super::traits::{CacheResult, Cacheable};

/// Cache layer that manages caching logic and network fetching.
///
/// This layer sits between the repository and the network client,
/// providing transparent caching with offline support.
pub struct CacheLayer<S: CacheStorage> {
  storage: Arc<S>,
  /// How long cached data is served without refetching
  ttl: Duration,
  /// Entries older than this are purged after successful refreshes
  retention: Duration,
}

impl<S: CacheStorage> CacheLayer<S> {
  /// Create a new cache layer with the given storage backend.
  pub fn new(storage: S) -> Self {
    Self {
      storage: Arc::new(storage),
      ttl: Duration::hours(24),
      retention: Duration::days(7),
    }
  }

  /// Set how long cached data stays fresh.
  pub fn with_ttl(mut self, ttl: Duration) -> Self {
    self.ttl = ttl;
    self
  }

  /// Set how long cached data is kept at all.
  pub fn with_retention(mut self, retention: Duration) -> Self {
    self.retention = retention;
    self
  }

  pub fn storage(&self) -> &S {
    &self.storage
  }

  /// Check if data stored at `stored_at` is still within the TTL.
  ///
  /// Measured on the storage's clock, the same one that stamped the entry.
  fn is_fresh(&self, stored_at: DateTime<Utc>) -> bool {
    match self.storage.now().checked_sub_signed(self.ttl) {
      Some(cutoff) => stored_at >= cutoff,
      // A window reaching past the earliest representable time covers everything
      None => true,
    }
  }

  /// Fetch a list with cache-first strategy.
  ///
  /// 1. Check cache - if the freshest entry is within the TTL, return it
  /// 2. Otherwise fetch from network and replace the cached list
  /// 3. On network failure, return the cached list regardless of age
  /// 4. Only when nothing is cached does the fetch error reach the caller
  ///
  /// The `key` parameter is used as the cache lookup key (e.g., "popular:1").
  pub async fn fetch_list<T, E, F, Fut>(&self, key: &str, fetcher: F) -> Result<CacheResult<Vec<T>>, E>
  where
    T: Cacheable,
    E: Display,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Vec<T>, E>>,
  {
    let cached = self.cached_list::<T>(key);

    self
      .read_through(key, cached, fetcher, |storage, data| {
        storage.put_list(key, data)
      })
      .await
  }

  /// Fetch a single entity with caching.
  pub async fn fetch_one<T, E, F, Fut>(&self, entity_key: &str, fetcher: F) -> Result<CacheResult<T>, E>
  where
    T: Cacheable,
    E: Display,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
  {
    let cached = match self.storage.get_entry::<T>(entity_key) {
      Ok(entry) => entry.map(|e| (e.payload, e.stored_at)),
      Err(e) => {
        warn!(key = entity_key, error = %e, "cache read failed, treating as miss");
        None
      }
    };

    self
      .read_through(entity_key, cached, fetcher, |storage, data| {
        storage.put_entry(data)
      })
      .await
  }

  /// Delete everything older than the retention window.
  pub fn purge_expired(&self) -> Result<usize> {
    let removed = self.storage.purge_older_than(self.retention)?;
    if removed > 0 {
      info!(removed, "purged expired cache entries");
    }
    Ok(removed)
  }

  /// Delete all cached data.
  pub fn clear(&self) -> Result<()> {
    self.storage.clear()
  }

  /// Cached list payloads and the freshest timestamp among them.
  fn cached_list<T: Cacheable>(&self, key: &str) -> Option<(Vec<T>, DateTime<Utc>)> {
    let entries = match self.storage.get_list::<T>(key) {
      Ok(entries) => entries,
      Err(e) => {
        warn!(key, error = %e, "cache read failed, treating as miss");
        return None;
      }
    };

    let freshest = entries.iter().map(|e| e.stored_at).max()?;
    Some((entries.into_iter().map(|e| e.payload).collect(), freshest))
  }

  /// Shared read-through protocol for lists and single entities.
  async fn read_through<V, E, F, Fut, W>(
    &self,
    key: &str,
    cached: Option<(V, DateTime<Utc>)>,
    fetcher: F,
    store: W,
  ) -> Result<CacheResult<V>, E>
  where
    E: Display,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<V, E>>,
    W: FnOnce(&S, &V) -> Result<()>,
  {
    let cached = match cached {
      Some((data, stored_at)) if self.is_fresh(stored_at) => {
        debug!(key, %stored_at, "cache hit");
        return Ok(CacheResult::from_cache(data, stored_at));
      }
      other => other,
    };

    debug!(key, stale = cached.is_some(), "cache miss, fetching");

    match fetcher().await {
      Ok(data) => {
        if let Err(e) = store(&self.storage, &data) {
          warn!(key, error = %e, "failed to update cache");
        }
        if let Err(e) = self.purge_expired() {
          warn!(error = %e, "cache purge failed");
        }
        Ok(CacheResult::from_network(data))
      }
      Err(err) => match cached {
        Some((data, stored_at)) => {
          warn!(key, error = %err, %stored_at, "refresh failed, serving cached data");
          Ok(CacheResult::offline(data, stored_at))
        }
        None => Err(err),
      },
    }
  }
}

impl<S: CacheStorage> Clone for CacheLayer<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      ttl: self.ttl,
      retention: self.retention,
    }
  }
}
