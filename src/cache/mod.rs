//! Generic caching layer for data persistence and offline support.
//!
//! This module provides a domain-agnostic caching mechanism that:
//! - Stores ordered lists under a list key and single entities by primary key
//! - Serves cached data while it is younger than a TTL
//! - Falls back to cached data of any age when a refresh fails (offline mode)
//! - Purges data past a retention window after successful refreshes

mod clock;
mod layer;
mod storage;
mod traits;

pub use clock::{Clock, SystemClock};
#[cfg(test)]
pub(crate) use clock::ManualClock;
pub use layer::CacheLayer;
pub use storage::{CacheStorage, SqliteStorage};
pub use traits::{CacheEntry, CacheResult, CacheSource, Cacheable};
