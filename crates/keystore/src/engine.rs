//! Thread-safe read-through LRU cache engine.
//!
//! [`KeyStoreCache`] keeps at most `capacity` entries, ordered from most to
//! least recently used, and fills misses from a [`Loader`]. A single
//! `parking_lot::RwLock` guards the key index and the recency order.
//!
//! # Lookup
//!
//! 1. Under the shared lock, check whether the key is present.
//! 2. On a hit, drop the shared lock and take the exclusive lock to promote
//!    the entry. The entry may have been evicted in between, so presence is
//!    checked again; a vanished entry is handled as a fresh miss.
//! 3. On a miss, resolve according to [`LoadCoordination`]:
//!    - `Exclusive`: take the exclusive lock, re-check, and if the key is
//!      still absent call the loader once while holding the lock. Callers
//!      missing on the same key queue on the lock and find the entry on
//!      their own re-check.
//!    - `PerKey`: register as the key's load leader (or wait for the current
//!      leader), load without holding the structure lock, then insert under
//!      the exclusive lock.
//!
//! A successful load evicts the LRU entry when the cache is full and inserts
//! the new entry as MRU. A failed load changes nothing and is not remembered.
//!
//! # Liveness
//!
//! There is no timeout in the engine. Under `Exclusive` coordination a loader
//! that never returns blocks every caller of the instance.

use std::fmt;
use std::hash::Hash;

use parking_lot::RwLock;
use tracing::{debug, trace, warn};

use crate::config::{CacheConfig, LoadCoordination};
use crate::error::{CacheError, CacheResult};
use crate::inflight::{InflightRegistry, InflightRole};
use crate::loader::Loader;
use crate::stats::{CacheStats, MetricsCollector};
use crate::store::Store;

/// Bounded, concurrency-safe read-through LRU cache
///
/// # Type Parameters
/// - `K`: Key type (must be `Eq + Hash + Clone + Debug`)
/// - `V`: Value type (must be `Clone`); values are returned by clone
/// - `L`: Backing-store [`Loader`]
///
/// # Example
/// ```
/// use keystore_cache::KeyStoreCache;
///
/// let cache = KeyStoreCache::new(2, |key: &String| -> Result<String, std::io::Error> {
///     Ok(key.chars().rev().collect())
/// })
/// .unwrap();
///
/// assert_eq!(cache.get(&"abc".to_string()).unwrap(), "cba");
/// assert_eq!(cache.len(), 1);
/// ```
pub struct KeyStoreCache<K, V, L>
where
    K: Eq + Hash + Clone + fmt::Debug,
    V: Clone,
    L: Loader<K, V>,
{
    store: RwLock<Store<K, V>>,
    inflight: InflightRegistry<K>,
    loader: L,
    config: CacheConfig,
    metrics: MetricsCollector,
}

impl<K, V, L> KeyStoreCache<K, V, L>
where
    K: Eq + Hash + Clone + fmt::Debug,
    V: Clone,
    L: Loader<K, V>,
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
    /// # Errors
    /// Returns `CacheError::InvalidCapacity` when `config.capacity` is zero.
    pub fn with_config(config: CacheConfig, loader: L) -> CacheResult<Self> {
        config.validate()?;
        debug!(
            cache = %config.name,
            capacity = config.capacity,
            coordination = ?config.coordination,
            "Creating key store cache"
        );
        Ok(Self {
            store: RwLock::new(Store::with_capacity(config.capacity)),
            inflight: InflightRegistry::default(),
            metrics: MetricsCollector::new(config.track_metrics),
            loader,
            config,
        })
    }

    /// Get the value for `key`, loading it from the backing store on a miss
    ///
    /// # Errors
    /// Returns `CacheError::Load` when the key is absent and the loader
    /// fails. The cache is left exactly as it was.
    pub fn get(&self, key: &K) -> CacheResult<V> {
        if let Some(value) = self.lookup(key) {
            return Ok(value);
        }
        self.metrics.record_miss();

        match self.config.coordination {
            LoadCoordination::Exclusive => self.resolve_exclusive(key),
            LoadCoordination::PerKey => self.resolve_per_key(key),
        }
    }

    /// Read the cached value for `key` without promoting it or loading
    pub fn peek(&self, key: &K) -> Option<V> {
        self.store.read().peek(key).cloned()
    }

    /// Check whether `key` is cached, without promoting it
    pub fn contains(&self, key: &K) -> bool {
        self.store.read().contains(key)
    }

    /// Get the current number of entries
    pub fn len(&self) -> usize {
        self.store.read().len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of entries
    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    /// Name recorded on log events
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Configuration this cache was built with
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// The backing-store loader
    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// Cached keys from most to least recently used
    pub fn keys(&self) -> Vec<K> {
        self.store.read().keys()
    }

    /// Remove every entry
    pub fn clear(&self) {
        self.store.write().clear();
        debug!(cache = %self.config.name, "Cache cleared");
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        self.metrics.snapshot(self.len(), self.config.capacity)
    }

    /// Reset all counters to zero
    pub fn reset_stats(&self) {
        self.metrics.reset();
    }

    /// Verify the structural invariants of the cache
    ///
    /// # Errors
    /// Returns `CacheError::Internal` describing the first violation found.
    pub fn check_invariants(&self) -> CacheResult<()> {
        self.store.read().check_invariants(self.config.capacity)
    }

    /// Fast path: shared-lock presence check, then exclusive-lock promotion.
    fn lookup(&self, key: &K) -> Option<V> {
        if !self.store.read().contains(key) {
            return None;
        }

        let value = self.store.write().promote(key).cloned();
        match &value {
            Some(_) => {
                self.metrics.record_hit();
                trace!(cache = %self.config.name, key = ?key, "Cache hit");
            }
            None => {
                trace!(cache = %self.config.name, key = ?key, "Entry evicted before promotion");
            }
        }
        value
    }

    fn resolve_exclusive(&self, key: &K) -> CacheResult<V> {
        let mut store = self.store.write();
        if let Some(value) = store.promote(key).cloned() {
            self.metrics.record_hit();
            self.metrics.record_coalesced();
            trace!(cache = %self.config.name, key = ?key, "Entry loaded while waiting for lock");
            return Ok(value);
        }

        let value = self.load(key)?;
        self.insert(&mut store, key, value.clone());
        Ok(value)
    }

    fn resolve_per_key(&self, key: &K) -> CacheResult<V> {
        loop {
            match self.inflight.begin(key) {
                InflightRole::Leader(guard) => {
                    // A previous leader may have finished between our lookup and
                    // registering as leader.
                    if let Some(value) = self.store.write().promote(key).cloned() {
                        self.metrics.record_hit();
                        self.metrics.record_coalesced();
                        trace!(cache = %self.config.name, key = ?key, "Entry loaded before leading");
                        return Ok(value);
                    }

                    let value = self.load(key)?;
                    let mut store = self.store.write();
                    self.insert(&mut store, key, value.clone());
                    drop(store);
                    drop(guard);
                    return Ok(value);
                }
                InflightRole::Waiter(load) => {
                    self.metrics.record_coalesced();
                    trace!(cache = %self.config.name, key = ?key, "Waiting for in-flight load");
                    load.wait();
                    if let Some(value) = self.lookup(key) {
                        return Ok(value);
                    }
                }
            }
        }
    }

    fn load(&self, key: &K) -> CacheResult<V> {
        debug!(cache = %self.config.name, key = ?key, "Loading value from backing store");
        match self.loader.load(key) {
            Ok(value) => {
                self.metrics.record_load();
                Ok(value)
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
                Err(err)
            }
        }
    }

    fn insert(&self, store: &mut Store<K, V>, key: &K, value: V) {
        if let Some(evicted) = store.insert(key.clone(), value, self.config.capacity) {
            self.metrics.record_eviction();
            debug!(
                cache = %self.config.name,
                evicted = ?evicted,
                inserted = ?key,
                "Evicted least recently used entry"
            );
        }
    }
}

impl<K, V, L> fmt::Debug for KeyStoreCache<K, V, L>
where
    K: Eq + Hash + Clone + fmt::Debug,
    V: Clone,
    L: Loader<K, V>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyStoreCache")
            .field("name", &self.config.name)
            .field("capacity", &self.config.capacity)
            .field("coordination", &self.config.coordination)
            .field("len", &self.len())
            .field("inflight", &self.inflight.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for engine.
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::testing::MockDb;

    type TagLoader = Box<dyn Fn(&String) -> Result<String, String> + Send + Sync>;

    fn tagging_loader(calls: &'static AtomicUsize) -> TagLoader {
        Box::new(move |key: &String| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("value-{key}"))
        })
    }

    fn key(name: &str) -> String {
        name.to_string()
    }

    /// Validates that a zero capacity is rejected at construction.
    ///
    /// Assertions:
    /// - Ensures `KeyStoreCache::new(0, ..)` returns `InvalidCapacity`.
    #[test]
    fn test_zero_capacity_rejected() {
        let result: CacheResult<KeyStoreCache<u32, u32, _>> =
            KeyStoreCache::new(0, |k: &u32| -> Result<u32, String> { Ok(*k) });
        assert!(matches!(result, Err(CacheError::InvalidCapacity { capacity: 0 })));
    }

    /// Validates the canonical recency scenario: a, b, a, c at capacity 2.
    ///
    /// Assertions:
    /// - Confirms final membership is `{a, c}` with `c` as MRU.
    /// - Confirms the loader ran exactly 3 times.
    #[test]
    fn test_recency_scenario() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        let cache = KeyStoreCache::new(2, tagging_loader(&CALLS)).unwrap();

        assert_eq!(cache.get(&key("a")).unwrap(), "value-a");
        assert_eq!(cache.get(&key("b")).unwrap(), "value-b");
        assert_eq!(cache.get(&key("a")).unwrap(), "value-a");
        assert_eq!(cache.get(&key("c")).unwrap(), "value-c");

        assert_eq!(cache.keys(), vec![key("c"), key("a")]);
        assert!(!cache.contains(&key("b")));
        assert_eq!(CALLS.load(Ordering::SeqCst), 3);
        assert!(cache.check_invariants().is_ok());
    }

    /// Validates that N+1 distinct keys evict the first inserted.
    ///
    /// Assertions:
    /// - Confirms `"k0"` is evicted and the size stays at capacity.
    #[test]
    fn test_evicts_first_inserted() {
        let cache = KeyStoreCache::new(3, |k: &String| -> Result<String, String> { Ok(k.clone()) })
            .unwrap();
        for i in 0..4 {
            cache.get(&format!("k{i}")).unwrap();
        }

        assert_eq!(cache.len(), 3);
        assert!(!cache.contains(&key("k0")));
        assert_eq!(cache.keys(), vec![key("k3"), key("k2"), key("k1")]);
    }

    /// Validates that repeated hits neither load nor grow the cache.
    ///
    /// Assertions:
    /// - Confirms the loader count stays at 1 across 10 hits.
    /// - Confirms the hit/miss counters when metrics are on.
    #[test]
    fn test_idempotent_hit() {
        let db = MockDb::with_entries([("x", "1")]);
        let config = CacheConfig::builder().capacity(4).track_metrics(true).build();
        let cache = KeyStoreCache::with_config(config, db.clone()).unwrap();

        for _ in 0..10 {
            assert_eq!(cache.get(&key("x")).unwrap(), "1");
            assert_eq!(cache.len(), 1);
        }

        assert_eq!(db.load_count("x"), 1);
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 9);
        assert_eq!(stats.loads, 1);
    }

    /// Validates that a failing load leaves the cache untouched and is not
    /// remembered.
    ///
    /// Assertions:
    /// - Confirms the error is a load error and size is unchanged.
    /// - Confirms the key loads normally once the store recovers.
    #[test]
    fn test_failure_isolation() {
        let db = MockDb::with_entries([("a", "1"), ("x", "9")]);
        let cache = KeyStoreCache::new(2, db.clone()).unwrap();
        cache.get(&key("a")).unwrap();

        db.fail_key("x");
        let err = cache.get(&key("x")).unwrap_err();
        assert!(err.is_load_error());
        assert_eq!(cache.len(), 1);
        assert!(!cache.contains(&key("x")));
        assert_eq!(cache.keys(), vec![key("a")]);

        let err = cache.get(&key("x")).unwrap_err();
        assert!(err.is_load_error());
        assert_eq!(db.load_count("x"), 2);

        db.recover_key("x");
        assert_eq!(cache.get(&key("x")).unwrap(), "9");
        assert_eq!(cache.keys(), vec![key("x"), key("a")]);
        assert!(cache.check_invariants().is_ok());
    }

    /// Validates that a failed load at capacity evicts nothing.
    ///
    /// Assertions:
    /// - Confirms the LRU entry survives a failed miss.
    #[test]
    fn test_failed_load_does_not_evict() {
        let db = MockDb::with_entries([("a", "1"), ("b", "2")]);
        let cache = KeyStoreCache::new(2, db.clone()).unwrap();
        cache.get(&key("a")).unwrap();
        cache.get(&key("b")).unwrap();

        assert!(cache.get(&key("missing")).is_err());
        assert_eq!(cache.keys(), vec![key("b"), key("a")]);
    }

    /// Validates peek and contains do not change recency.
    ///
    /// Assertions:
    /// - Confirms `peek` returns the value without promoting it.
    /// - Confirms `peek` on an absent key does not call the loader.
    #[test]
    fn test_peek_does_not_promote() {
        let db = MockDb::with_entries([("a", "1"), ("b", "2"), ("c", "3")]);
        let cache = KeyStoreCache::new(2, db.clone()).unwrap();
        cache.get(&key("a")).unwrap();
        cache.get(&key("b")).unwrap();

        assert_eq!(cache.peek(&key("a")), Some("1".to_string()));
        assert!(cache.contains(&key("a")));
        assert_eq!(cache.peek(&key("c")), None);
        assert_eq!(db.load_count("c"), 0);

        cache.get(&key("c")).unwrap();
        assert_eq!(cache.keys(), vec![key("c"), key("b")]);
    }

    /// Validates clear and stats reset.
    ///
    /// Assertions:
    /// - Confirms the cache is empty after `clear`.
    /// - Confirms a cleared key is loaded again.
    #[test]
    fn test_clear_and_reset() {
        let db = MockDb::with_entries([("a", "1")]);
        let config = CacheConfig::builder().capacity(2).track_metrics(true).build();
        let cache = KeyStoreCache::with_config(config, db.clone()).unwrap();
        cache.get(&key("a")).unwrap();

        cache.clear();
        assert!(cache.is_empty());
        cache.get(&key("a")).unwrap();
        assert_eq!(db.load_count("a"), 2);

        cache.reset_stats();
        assert_eq!(cache.stats().total_accesses(), 0);
        assert_eq!(cache.stats().size, 1);
    }

    /// Validates single-load-per-miss under contention for both
    /// coordination strategies.
    ///
    /// Assertions:
    /// - Confirms 16 concurrent callers trigger exactly one load.
    /// - Confirms every caller receives the same value.
    #[test]
    fn test_concurrent_same_key_single_load() {
        for coordination in [LoadCoordination::Exclusive, LoadCoordination::PerKey] {
            let db = MockDb::with_entries([("hot", "payload")]);
            db.set_latency(Duration::from_millis(50));
            let config = CacheConfig::builder().capacity(4).coordination(coordination).build();
            let cache = KeyStoreCache::with_config(config, db.clone()).unwrap();

            let cache = &cache;
            let values: Vec<String> = thread::scope(|scope| {
                let handles: Vec<_> = (0..16)
                    .map(|_| scope.spawn(move || cache.get(&key("hot")).unwrap()))
                    .collect();
                handles.into_iter().map(|h| h.join().unwrap()).collect()
            });

            assert_eq!(db.load_count("hot"), 1, "coordination {coordination:?}");
            assert!(values.iter().all(|v| v == "payload"));
            assert!(cache.check_invariants().is_ok());
        }
    }

    /// Validates that coalesced misses are counted the same way in both
    /// coordination modes.
    ///
    /// Assertions:
    /// - Confirms every miss is accounted for as either a load or a
    ///   coalesced wait.
    /// - Confirms one load per key.
    #[test]
    fn test_coalesced_accounting_matches_across_modes() {
        for coordination in [LoadCoordination::Exclusive, LoadCoordination::PerKey] {
            let db = MockDb::sequential(4);
            db.set_latency(Duration::from_millis(20));
            let config = CacheConfig::builder()
                .capacity(8)
                .coordination(coordination)
                .track_metrics(true)
                .build();
            let cache = KeyStoreCache::with_config(config, db.clone()).unwrap();

            let cache = &cache;
            thread::scope(|scope| {
                for t in 0..16 {
                    scope.spawn(move || {
                        let n = t % 4;
                        assert_eq!(cache.get(&format!("key-{n}")).unwrap(), format!("value-{n}"));
                    });
                }
            });

            let stats = cache.stats();
            assert_eq!(stats.loads, 4, "coordination {coordination:?}");
            assert_eq!(stats.load_failures, 0);
            assert_eq!(stats.misses, stats.loads + stats.coalesced, "coordination {coordination:?}");
            assert_eq!(db.total_loads(), 4);
        }
    }

    /// Validates that per-key coordination loads unrelated keys in parallel.
    ///
    /// Assertions:
    /// - Confirms a slow load for one key does not block another key.
    #[test]
    fn test_per_key_loads_unrelated_keys_in_parallel() {
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let release_rx = parking_lot::Mutex::new(release_rx);
        let loader = move |k: &String| -> Result<String, String> {
            if k == "slow" {
                release_rx.lock().recv().map_err(|e| e.to_string())?;
            }
            Ok(k.to_uppercase())
        };
        let config = CacheConfig::builder()
            .capacity(4)
            .coordination(LoadCoordination::PerKey)
            .build();
        let cache = KeyStoreCache::with_config(config, loader).unwrap();

        thread::scope(|scope| {
            let slow = scope.spawn(|| cache.get(&key("slow")));
            thread::sleep(Duration::from_millis(20));

            // Must complete while "slow" is still loading.
            assert_eq!(cache.get(&key("fast")).unwrap(), "FAST");

            release_tx.send(()).unwrap();
            assert_eq!(slow.join().unwrap().unwrap(), "SLOW");
        });
        assert_eq!(cache.len(), 2);
    }

    /// Validates that per-key waiters re-drive the load after a leader fails.
    ///
    /// Assertions:
    /// - Confirms the waiter succeeds with its own load once the store
    ///   recovers.
    #[test]
    fn test_per_key_waiter_retries_after_leader_failure() {
        let attempts = AtomicUsize::new(0);
        let (gate_tx, gate_rx) = mpsc::channel::<()>();
        let gate_rx = parking_lot::Mutex::new(gate_rx);
        let loader = |_: &String| -> Result<String, String> {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst);
            if attempt == 0 {
                gate_rx.lock().recv().map_err(|e| e.to_string())?;
                return Err("backend unavailable".to_string());
            }
            Ok("recovered".to_string())
        };
        let config = CacheConfig::builder()
            .capacity(2)
            .coordination(LoadCoordination::PerKey)
            .build();
        let cache = KeyStoreCache::with_config(config, loader).unwrap();

        thread::scope(|scope| {
            let leader = scope.spawn(|| cache.get(&key("k")));
            while attempts.load(Ordering::SeqCst) == 0 {
                thread::yield_now();
            }
            let waiter = scope.spawn(|| cache.get(&key("k")));
            thread::sleep(Duration::from_millis(20));
            gate_tx.send(()).unwrap();

            assert!(leader.join().unwrap().is_err());
            assert_eq!(waiter.join().unwrap().unwrap(), "recovered");
        });
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(cache.keys(), vec![key("k")]);
    }
}
