//! Bounded read-through LRU cache in front of a slow backing store.
//!
//! [`KeyStoreCache`] answers `get(key)` from memory when it can and otherwise
//! fills the entry from a [`Loader`], keeping at most `capacity` entries and
//! evicting the least recently used one when full. Concurrent callers that
//! miss on the same key trigger a single load.
//!
//! # Safety and Quality
//!
//! The crate forbids `unsafe` code. The recency list is an index-based arena,
//! so entries are linked by slot numbers rather than pointers.
//!
//! # Modules
//!
//! - [`config`]: capacity, coordination mode and metrics switches, loadable
//!   from TOML, JSON or the environment
//! - [`error`]: [`CacheError`] and its classification
//! - [`loader`]: the sync and async backing-store contracts
//! - [`recency`]: the MRU-to-LRU ordering structure
//! - [`stats`]: counter snapshots
//! - `testing` (feature `test-utils`): an in-memory mock backing store
//!
//! # Example
//!
//! ```
//! use keystore_cache::{CacheConfig, KeyStoreCache, LoadCoordination};
//!
//! let config = CacheConfig::builder()
//!     .name("users")
//!     .capacity(2)
//!     .coordination(LoadCoordination::PerKey)
//!     .build();
//! let cache = KeyStoreCache::with_config(config, |id: &u32| -> Result<String, std::io::Error> {
//!     Ok(format!("user-{id}"))
//! })
//! .unwrap();
//!
//! assert_eq!(cache.get(&1).unwrap(), "user-1");
//! assert_eq!(cache.get(&2).unwrap(), "user-2");
//! assert_eq!(cache.get(&1).unwrap(), "user-1");
//! assert_eq!(cache.get(&3).unwrap(), "user-3");
//! assert_eq!(cache.keys(), vec![3, 1]);
//! ```

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod config;
pub mod error;
pub mod loader;
pub mod recency;
pub mod stats;

mod async_engine;
mod engine;
mod inflight;
mod store;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(any(feature = "test-utils", test))]
pub mod testing;

pub use async_engine::AsyncKeyStoreCache;
pub use config::{CacheConfig, CacheConfigBuilder, LoadCoordination};
pub use engine::KeyStoreCache;
pub use error::{BoxedError, CacheError, CacheResult, ErrorClassification, ErrorSeverity};
pub use loader::{AsyncLoader, Loader};
pub use recency::{Handle, RecencyList};
pub use stats::CacheStats;
