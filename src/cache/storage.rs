//! Cache storage trait and SQLite implementation.

use chrono::{DateTime, Duration, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use super::clock::{Clock, SystemClock};
use super::traits::{CacheEntry, Cacheable};

/// Trait for cache storage backends.
pub trait CacheStorage: Send + Sync {
  /// Get the cached entries stored under a list key, in stored order.
  fn get_list<T: Cacheable>(&self, key: &str) -> Result<Vec<CacheEntry<T>>>;

  /// Replace every entry under a list key with `items`.
  ///
  /// Readers observe either the previous set or the new one, never a mix.
  fn put_list<T: Cacheable>(&self, key: &str, items: &[T]) -> Result<()>;

  /// Get a single entity by key.
  fn get_entry<T: Cacheable>(&self, entity_key: &str) -> Result<Option<CacheEntry<T>>>;

  /// Store a single entity, replacing any previous version.
  fn put_entry<T: Cacheable>(&self, item: &T) -> Result<()>;

  /// Delete everything written more than `max_age` ago. Returns rows removed.
  fn purge_older_than(&self, max_age: Duration) -> Result<usize>;

  /// Delete all cached data.
  fn clear(&self) -> Result<()>;

  /// Current time on the clock that stamps `stored_at`.
  fn now(&self) -> DateTime<Utc>;
}

/// SQLite-based cache storage implementation.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
  clock: Arc<dyn Clock>,
}

impl SqliteStorage {
  /// Open (or create) the cache database at `path`.
  pub fn open(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::from_connection(conn)
  }

  /// Open a private in-memory database. Nothing survives the process.
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory cache database: {}", e))?;

    Self::from_connection(conn)
  }

  /// Use `clock` for the timestamps written alongside payloads, and for
  /// every freshness check a [`CacheLayer`](super::CacheLayer) makes over this store.
  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }

  fn from_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
      clock: Arc::new(SystemClock),
    };
    storage.run_migrations()?;

    Ok(storage)
  }

  /// Run database migrations for cache tables.
  fn run_migrations(&self) -> Result<()> {
    self
      .lock()?
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }

  fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
    self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
-- Ordered list results (one row per item per list key)
CREATE TABLE IF NOT EXISTS list_cache (
    entity_type TEXT NOT NULL,
    list_key TEXT NOT NULL,
    position INTEGER NOT NULL,
    entity_key TEXT NOT NULL,
    data BLOB NOT NULL,
    stored_at INTEGER NOT NULL,
    PRIMARY KEY (entity_type, list_key, position)
);

CREATE INDEX IF NOT EXISTS idx_list_cache_stored ON list_cache(stored_at);

-- Single entities keyed by primary key
CREATE TABLE IF NOT EXISTS entity_cache (
    entity_type TEXT NOT NULL,
    entity_key TEXT NOT NULL,
    data BLOB NOT NULL,
    stored_at INTEGER NOT NULL,
    PRIMARY KEY (entity_type, entity_key)
);

CREATE INDEX IF NOT EXISTS idx_entity_cache_stored ON entity_cache(stored_at);
"#;

impl CacheStorage for SqliteStorage {
  fn get_list<T: Cacheable>(&self, key: &str) -> Result<Vec<CacheEntry<T>>> {
    let conn = self.lock()?;

    let mut stmt = conn
      .prepare(
        "SELECT entity_key, data, stored_at FROM list_cache
         WHERE entity_type = ? AND list_key = ?
         ORDER BY position",
      )
      .map_err(|e| eyre!("Failed to prepare list query: {}", e))?;

    let rows = stmt
      .query_map(params![T::entity_type(), key], |row| {
        Ok((
          row.get::<_, String>(0)?,
          row.get::<_, Vec<u8>>(1)?,
          row.get::<_, i64>(2)?,
        ))
      })
      .map_err(|e| eyre!("Failed to query list {}: {}", key, e))?;

    let mut entries = Vec::new();
    for row in rows {
      let (entity_key, data, stored_at) = row.map_err(|e| eyre!("Failed to read row: {}", e))?;
      entries.push(CacheEntry {
        payload: serde_json::from_slice(&data)
          .map_err(|e| eyre!("Failed to deserialize entity {}: {}", entity_key, e))?,
        key: entity_key,
        stored_at: from_millis(stored_at)?,
      });
    }

    Ok(entries)
  }

  fn put_list<T: Cacheable>(&self, key: &str, items: &[T]) -> Result<()> {
    let mut conn = self.lock()?;
    let entity_type = T::entity_type();
    let stored_at = self.clock.now().timestamp_millis();

    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    tx.execute(
      "DELETE FROM list_cache WHERE entity_type = ? AND list_key = ?",
      params![entity_type, key],
    )
    .map_err(|e| eyre!("Failed to delete old list entries: {}", e))?;

    {
      let mut insert = tx
        .prepare(
          "INSERT INTO list_cache (entity_type, list_key, position, entity_key, data, stored_at)
           VALUES (?, ?, ?, ?, ?, ?)",
        )
        .map_err(|e| eyre!("Failed to prepare insert: {}", e))?;

      for (position, item) in items.iter().enumerate() {
        let data =
          serde_json::to_vec(item).map_err(|e| eyre!("Failed to serialize entity: {}", e))?;
        insert
          .execute(params![
            entity_type,
            key,
            position as i64,
            item.cache_key(),
            data,
            stored_at
          ])
          .map_err(|e| eyre!("Failed to store list entry: {}", e))?;
      }
    }

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    debug!(list_key = key, count = items.len(), "replaced cached list");
    Ok(())
  }

  fn get_entry<T: Cacheable>(&self, entity_key: &str) -> Result<Option<CacheEntry<T>>> {
    let conn = self.lock()?;

    let row: Option<(Vec<u8>, i64)> = conn
      .query_row(
        "SELECT data, stored_at FROM entity_cache
         WHERE entity_type = ? AND entity_key = ?",
        params![T::entity_type(), entity_key],
        |row| Ok((row.get(0)?, row.get(1)?)),
      )
      .optional()
      .map_err(|e| eyre!("Failed to query entity {}: {}", entity_key, e))?;

    match row {
      Some((data, stored_at)) => Ok(Some(CacheEntry {
        key: entity_key.to_string(),
        payload: serde_json::from_slice(&data)
          .map_err(|e| eyre!("Failed to deserialize entity {}: {}", entity_key, e))?,
        stored_at: from_millis(stored_at)?,
      })),
      None => Ok(None),
    }
  }

  fn put_entry<T: Cacheable>(&self, item: &T) -> Result<()> {
    let conn = self.lock()?;
    let data = serde_json::to_vec(item).map_err(|e| eyre!("Failed to serialize entity: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO entity_cache (entity_type, entity_key, data, stored_at)
         VALUES (?, ?, ?, ?)",
        params![
          T::entity_type(),
          item.cache_key(),
          data,
          self.clock.now().timestamp_millis()
        ],
      )
      .map_err(|e| eyre!("Failed to store entity: {}", e))?;

    Ok(())
  }

  fn purge_older_than(&self, max_age: Duration) -> Result<usize> {
    let cutoff = match self.clock.now().checked_sub_signed(max_age) {
      Some(cutoff) => cutoff.timestamp_millis(),
      None => return Ok(0),
    };
    let mut conn = self.lock()?;

    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    let lists = tx
      .execute("DELETE FROM list_cache WHERE stored_at < ?", params![cutoff])
      .map_err(|e| eyre!("Failed to purge list cache: {}", e))?;
    let entities = tx
      .execute("DELETE FROM entity_cache WHERE stored_at < ?", params![cutoff])
      .map_err(|e| eyre!("Failed to purge entity cache: {}", e))?;

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(lists + entities)
  }

  fn clear(&self) -> Result<()> {
    self
      .lock()?
      .execute_batch("DELETE FROM list_cache; DELETE FROM entity_cache;")
      .map_err(|e| eyre!("Failed to clear cache: {}", e))
  }

  fn now(&self) -> DateTime<Utc> {
    self.clock.now()
  }
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
  DateTime::from_timestamp_millis(ms).ok_or_else(|| eyre!("Invalid cache timestamp: {}", ms))
}
