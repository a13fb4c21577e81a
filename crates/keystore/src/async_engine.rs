//! Async read-through LRU cache.
//!
//! [`AsyncKeyStoreCache`] is the async counterpart of
//! [`KeyStoreCache`](crate::KeyStoreCache). It uses `tokio::sync::RwLock` so
//! callers suspend instead of blocking a runtime thread, and it fills misses
//! from an [`AsyncLoader`].
//!
//! Misses are always resolved with exclusive coordination: the write guard is
//! held across the loader's `.await`, so at most one load runs per instance
//! and callers missing on the same key find the entry on their re-check.

use std::fmt;
use std::hash::Hash;

use tokio::sync::RwLock;
use tracing::{debug, trace, warn};

use crate::config::{CacheConfig, LoadCoordination};
use crate::error::{CacheError, CacheResult};
use crate::loader::AsyncLoader;
use crate::stats::{CacheStats, MetricsCollector};
use crate::store::Store;

/// Async bounded read-through LRU cache
///
/// All access methods are async and must be awaited.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use keystore_cache::{AsyncKeyStoreCache, AsyncLoader};
///
/// struct Squares;
///
/// #[async_trait]
/// impl AsyncLoader<u64, u64> for Squares {
///     type Error = std::io::Error;
///
///     async fn load(&self, key: &u64) -> Result<u64, Self::Error> {
///         Ok(key * key)
///     }
/// }
///
/// #[tokio::main]
/// async fn main() {
///     let cache = AsyncKeyStoreCache::new(8, Squares).unwrap();
///     assert_eq!(cache.get(&7).await.unwrap(), 49);
///     assert_eq!(cache.len().await, 1);
/// }
/// ```
pub struct AsyncKeyStoreCache<K, V, L>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync,
    V: Clone + Send + Sync,
    L: AsyncLoader<K, V>,
{
    store: RwLock<Store<K, V>>,
    loader: L,
    config: CacheConfig,
    metrics: MetricsCollector,
}

impl<K, V, L> AsyncKeyStoreCache<K, V, L>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync,
    V: Clone + Send + Sync,
    L: AsyncLoader<K, V>,
{
    /// Create a cache holding at most `capacity` entries
    ///
    /// # Errors
    /// Returns `CacheError::InvalidCapacity` when `capacity` is zero.
    pub fn new(capacity: usize, loader: L) -> CacheResult<Self> {
        Self::with_config(CacheConfig::lru(capacity), loader)
    }

    /// Create a cache from a full configuration
    ///
    /// The coordination setting is ignored; async misses always resolve
    /// under the exclusive lock.
    ///
    /// # Errors
    /// Returns `CacheError::InvalidCapacity` when `config.capacity` is zero.
    pub fn with_config(config: CacheConfig, loader: L) -> CacheResult<Self> {
        config.validate()?;
        if config.coordination != LoadCoordination::Exclusive {
            debug!(
                cache = %config.name,
                coordination = ?config.coordination,
                "Async cache resolves misses exclusively; ignoring coordination setting"
            );
        }
        debug!(cache = %config.name, capacity = config.capacity, "Creating async key store cache");
        Ok(Self {
            store: RwLock::new(Store::with_capacity(config.capacity)),
            metrics: MetricsCollector::new(config.track_metrics),
            loader,
            config,
        })
    }

    /// Get the value for `key`, loading it on a miss
    ///
    /// # Errors
    /// Returns `CacheError::Load` when the key is absent and the loader
    /// fails. The cache is left unchanged.
    pub async fn get(&self, key: &K) -> CacheResult<V> {
        let present = self.store.read().await.contains(key);
        if present {
            if let Some(value) = self.store.write().await.promote(key).cloned() {
                self.metrics.record_hit();
                trace!(cache = %self.config.name, key = ?key, "Cache hit");
                return Ok(value);
            }
            trace!(cache = %self.config.name, key = ?key, "Entry evicted before promotion");
        }
        self.metrics.record_miss();

        let mut store = self.store.write().await;
        if let Some(value) = store.promote(key).cloned() {
            self.metrics.record_hit();
            self.metrics.record_coalesced();
            return Ok(value);
        }

        debug!(cache = %self.config.name, key = ?key, "Loading value from backing store");
        let value = match self.loader.load(key).await {
            Ok(value) => {
                self.metrics.record_load();
                value
            }
            Err(source) => {
                self.metrics.record_load_failure();
                let err = CacheError::load(key, source);
                warn!(
                    cache = %self.config.name,
                    error_type = err.error_type_name(),
                    error = %err,
                    "Load failed; cache left unchanged"
                );
                return Err(err);
            }
        };

        if let Some(evicted) = store.insert(key.clone(), value.clone(), self.config.capacity) {
            self.metrics.record_eviction();
            debug!(
                cache = %self.config.name,
                evicted = ?evicted,
                inserted = ?key,
                "Evicted least recently used entry"
            );
        }
        Ok(value)
    }

    /// Read the cached value for `key` without promoting it or loading
    pub async fn peek(&self, key: &K) -> Option<V> {
        self.store.read().await.peek(key).cloned()
    }

    /// Check whether `key` is cached
    pub async fn contains(&self, key: &K) -> bool {
        self.store.read().await.contains(key)
    }

    /// Get the current number of entries
    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    /// Check if the cache is empty
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Maximum number of entries
    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    /// Name recorded on log events
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Cached keys from most to least recently used
    pub async fn keys(&self) -> Vec<K> {
        self.store.read().await.keys()
    }

    /// Remove every entry
    pub async fn clear(&self) {
        self.store.write().await.clear();
        debug!(cache = %self.config.name, "Cache cleared");
    }

    /// Get cache statistics
    pub async fn stats(&self) -> CacheStats {
        let size = self.len().await;
        self.metrics.snapshot(size, self.config.capacity)
    }

    /// Verify the structural invariants of the cache
    ///
    /// # Errors
    /// Returns `CacheError::Internal` describing the first violation found.
    pub async fn check_invariants(&self) -> CacheResult<()> {
        self.store.read().await.check_invariants(self.config.capacity)
    }
}

impl<K, V, L> fmt::Debug for AsyncKeyStoreCache<K, V, L>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync,
    V: Clone + Send + Sync,
    L: AsyncLoader<K, V>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncKeyStoreCache")
            .field("name", &self.config.name)
            .field("capacity", &self.config.capacity)
            .finish_non_exhaustive()
    }
}
