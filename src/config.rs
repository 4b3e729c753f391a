use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::retry::RetryPolicy;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
  pub tmdb: TmdbConfig,
  pub images: ImagesConfig,
  pub cache: CacheConfig,
  pub retry: RetryConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TmdbConfig {
  /// API root, must end with a slash
  pub base_url: String,
  /// Value of the `language` query parameter
  pub language: String,
  pub timeout_secs: u64,
}

impl Default for TmdbConfig {
  fn default() -> Self {
    Self {
      base_url: "https://api.themoviedb.org/3/".to_string(),
      language: "ja-JP".to_string(),
      timeout_secs: 30,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImagesConfig {
  pub base_url: String,
  pub poster_size: String,
  pub backdrop_size: String,
}

impl Default for ImagesConfig {
  fn default() -> Self {
    Self {
      base_url: "https://image.tmdb.org/t/p/".to_string(),
      poster_size: "w500".to_string(),
      backdrop_size: "w780".to_string(),
    }
  }
}

impl ImagesConfig {
  pub fn poster_url(&self, path: Option<&str>) -> String {
    self.resolve(&self.poster_size, path)
  }

  pub fn backdrop_url(&self, path: Option<&str>) -> String {
    self.resolve(&self.backdrop_size, path)
  }

  /// `base + size + path`, or an empty string when there is no image.
  fn resolve(&self, size: &str, path: Option<&str>) -> String {
    match path {
      Some(path) if !path.is_empty() => format!("{}{}{}", self.base_url, size, path),
      _ => String::new(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// How long cached data is served without refetching
  pub ttl_hours: u64,
  /// How long cached data is kept for offline use
  pub retention_hours: u64,
  /// Database location (default: $XDG_DATA_HOME/reel/cache.db)
  pub path: Option<PathBuf>,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      ttl_hours: 24,
      retention_hours: 24 * 7,
      path: None,
    }
  }
}

impl CacheConfig {
  /// Freshness window. Out-of-range values saturate; `validate` rejects them.
  pub fn ttl(&self) -> chrono::Duration {
    hours(self.ttl_hours).unwrap_or(chrono::Duration::MAX)
  }

  pub fn retention(&self) -> chrono::Duration {
    hours(self.retention_hours).unwrap_or(chrono::Duration::MAX)
  }

  /// Configured database path, or the default under the data directory.
  pub fn db_path(&self) -> Result<PathBuf> {
    match &self.path {
      Some(path) => Ok(path.clone()),
      None => Ok(data_dir()?.join("cache.db")),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
  pub max_attempts: u32,
  pub initial_delay_ms: u64,
  pub max_delay_ms: u64,
  pub factor: f64,
}

/// `value` hours, if it can be subtracted from the current time.
fn hours(value: u64) -> Option<chrono::Duration> {
  let duration = chrono::Duration::try_hours(i64::try_from(value).ok()?)?;
  chrono::Utc::now().checked_sub_signed(duration)?;
  Some(duration)
}

impl Default for RetryConfig {
  fn default() -> Self {
    let policy = RetryPolicy::default();
    Self {
      max_attempts: policy.max_attempts,
      initial_delay_ms: policy.initial_delay.as_millis() as u64,
      max_delay_ms: policy.max_delay.as_millis() as u64,
      factor: policy.factor,
    }
  }
}

impl RetryConfig {
  pub fn policy(&self) -> RetryPolicy {
    RetryPolicy {
      max_attempts: self.max_attempts,
      initial_delay: Duration::from_millis(self.initial_delay_ms),
      max_delay: Duration::from_millis(self.max_delay_ms),
      factor: self.factor,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./reel.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/reel/config.yaml
  ///
  /// Without a file every setting takes its default.
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
      None => Self::default(),
    };
    config.validate()?;

    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("reel.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("reel").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn from_yaml(contents: &str) -> Result<Self> {
    Ok(serde_yaml::from_str(contents)?)
  }

  /// Reject settings the retry loop and URL builder cannot work with.
  pub fn validate(&self) -> Result<()> {
    let retry = &self.retry;
    if retry.max_attempts == 0 {
      return Err(eyre!("retry.max_attempts must be at least 1"));
    }
    if retry.factor < 1.0 {
      return Err(eyre!("retry.factor must be at least 1.0, got {}", retry.factor));
    }
    if retry.initial_delay_ms > retry.max_delay_ms {
      return Err(eyre!(
        "retry.initial_delay_ms ({}) exceeds retry.max_delay_ms ({})",
        retry.initial_delay_ms,
        retry.max_delay_ms
      ));
    }
    if hours(self.cache.ttl_hours).is_none() {
      return Err(eyre!("cache.ttl_hours is out of range: {}", self.cache.ttl_hours));
    }
    if hours(self.cache.retention_hours).is_none() {
      return Err(eyre!(
        "cache.retention_hours is out of range: {}",
        self.cache.retention_hours
      ));
    }
    if !self.tmdb.base_url.ends_with('/') {
      return Err(eyre!("tmdb.base_url must end with '/': {}", self.tmdb.base_url));
    }
    Ok(())
  }

  /// Get the TMDb API key from environment variables.
  ///
  /// Checks REEL_TMDB_API_KEY first, then TMDB_API_KEY as fallback.
  pub fn get_api_key() -> Result<String> {
    std::env::var("REEL_TMDB_API_KEY")
      .or_else(|_| std::env::var("TMDB_API_KEY"))
      .map_err(|_| {
        eyre!("TMDb API key not found. Set REEL_TMDB_API_KEY or TMDB_API_KEY environment variable.")
      })
  }
}

/// Per-user data directory holding the cache database and logs.
pub fn data_dir() -> Result<PathBuf> {
  let data_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .ok_or_else(|| eyre!("Could not determine data directory"))?;

  Ok(data_dir.join("reel"))
}
