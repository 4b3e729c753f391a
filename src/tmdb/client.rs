use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::{Config, ImagesConfig};
use crate::tmdb::api_types::{ApiMovieDetail, ApiMoviePage, ApiStatus};
use crate::tmdb::error::FetchError;
use crate::tmdb::types::{Category, Movie, MovieDetail};

/// Upstream source of catalogue data.
#[async_trait]
pub trait MovieSource: Send + Sync {
  /// One page of a curated list
  async fn fetch_list(&self, category: Category, page: u32) -> Result<Vec<Movie>, FetchError>;

  /// One page of free-text search results
  async fn search(&self, query: &str, page: u32) -> Result<Vec<Movie>, FetchError>;

  /// Full details for a single movie
  async fn fetch_detail(&self, id: u64) -> Result<MovieDetail, FetchError>;
}

/// TMDb v3 API client
#[derive(Clone)]
pub struct TmdbClient {
  http: reqwest::Client,
  base_url: Url,
  api_key: String,
  language: String,
  images: ImagesConfig,
}

impl TmdbClient {
  /// Create a client using the API key from the environment.
  pub fn new(config: &Config) -> Result<Self> {
    let api_key = Config::get_api_key()?;
    Self::with_api_key(config, api_key)
  }

  pub fn with_api_key(config: &Config, api_key: String) -> Result<Self> {
    let base_url = Url::parse(&config.tmdb.base_url)
      .map_err(|e| eyre!("Invalid TMDb base URL {}: {}", config.tmdb.base_url, e))?;

    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.tmdb.timeout_secs))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      base_url,
      api_key,
      language: config.tmdb.language.clone(),
      images: config.images.clone(),
    })
  }

  /// Build an endpoint URL with the common query parameters.
  fn endpoint(&self, path: &str, params: &[(&str, String)]) -> Result<Url, FetchError> {
    let mut url = self
      .base_url
      .join(path)
      .map_err(|e| FetchError::Unknown(format!("Invalid endpoint {}: {}", path, e)))?;

    {
      let mut query = url.query_pairs_mut();
      query.append_pair("api_key", &self.api_key);
      query.append_pair("language", &self.language);
      for (name, value) in params {
        query.append_pair(name, value);
      }
    }

    Ok(url)
  }

  /// GET an endpoint and decode its JSON body, classifying every failure.
  async fn get<T: DeserializeOwned>(
    &self,
    path: &str,
    params: &[(&str, String)],
  ) -> Result<T, FetchError> {
    let url = self.endpoint(path, params)?;
    debug!(path, "GET");

    let response = self
      .http
      .get(url)
      .send()
      .await
      .map_err(FetchError::from_transport)?;

    let status = response.status();
    if !status.is_success() {
      let error_text = response.text().await.unwrap_or_default();
      let message = match serde_json::from_str::<ApiStatus>(&error_text) {
        Ok(api_status) => api_status.status_message,
        Err(_) => error_text,
      };
      return Err(FetchError::from_status(status.as_u16(), message));
    }

    // The status line arrived, so a failure here means the transfer broke off
    let body = response
      .bytes()
      .await
      .map_err(|e| FetchError::NoConnection(format!("Failed to read response body: {}", e)))?;

    decode_body(&body)
  }
}

#[async_trait]
impl MovieSource for TmdbClient {
  async fn fetch_list(&self, category: Category, page: u32) -> Result<Vec<Movie>, FetchError> {
    let path = format!("movie/{}", category.as_str());
    let response: ApiMoviePage = self.get(&path, &[("page", page.to_string())]).await?;

    Ok(
      response
        .results
        .into_iter()
        .map(|movie| movie.into_movie(&self.images))
        .collect(),
    )
  }

  async fn search(&self, query: &str, page: u32) -> Result<Vec<Movie>, FetchError> {
    let response: ApiMoviePage = self
      .get(
        "search/movie",
        &[("query", query.to_string()), ("page", page.to_string())],
      )
      .await?;

    Ok(
      response
        .results
        .into_iter()
        .map(|movie| movie.into_movie(&self.images))
        .collect(),
    )
  }

  async fn fetch_detail(&self, id: u64) -> Result<MovieDetail, FetchError> {
    let path = format!("movie/{}", id);
    let response: ApiMovieDetail = self.get(&path, &[]).await?;

    Ok(response.into_detail(&self.images))
  }
}

impl std::fmt::Debug for TmdbClient {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("TmdbClient")
      .field("base_url", &self.base_url.as_str())
      .field("language", &self.language)
      .field("api_key", &"[REDACTED]")
      .finish()
  }
}

/// Decode a successful response body. An empty body is not a valid answer.
fn decode_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, FetchError> {
  if body.iter().all(u8::is_ascii_whitespace) {
    return Err(FetchError::Unknown("Empty response body".to_string()));
  }

  serde_json::from_slice(body)
    .map_err(|e| FetchError::Unknown(format!("Failed to parse response: {}", e)))
}
