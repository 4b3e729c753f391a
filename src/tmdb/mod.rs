//! TMDb movie catalogue: wire types, HTTP client and the cached repository.

mod api_types;
mod cache;
mod catalog;
mod client;
mod error;
mod repository;
mod types;

pub use cache::ListKey;
pub use catalog::{Catalog, DetailQuery, MoviesQuery};
pub use client::{MovieSource, TmdbClient};
pub use error::{ErrorKind, FetchError};
pub use repository::Repository;
pub use types::{Category, Movie, MovieDetail};
