//! Offline-first movie catalogue client.
//!
//! Reads from TMDb go through a SQLite read-through cache with a freshness
//! window, fall back to stale data when the network is unavailable, and
//! retry transient failures with exponential backoff.

pub mod cache;
pub mod config;
pub mod logging;
pub mod query;
pub mod retry;
pub mod tmdb;
