//! Mock backing store for tests
//!
//! [`MockDb`] is an in-memory key/value store that implements both
//! [`Loader`] and [`AsyncLoader`]. It counts every load per key and can be
//! told to fail specific keys, fail every key, or respond slowly.
//!
//! # Examples
//!
//! ```
//! # #[cfg(feature = "test-utils")]
//! # {
//! use keystore_cache::testing::MockDb;
//! use keystore_cache::KeyStoreCache;
//!
//! let db = MockDb::with_entries([("user:1", "alice")]);
//! let cache = KeyStoreCache::new(10, db.clone()).unwrap();
//!
//! assert_eq!(cache.get(&"user:1".to_string()).unwrap(), "alice");
//! assert_eq!(db.load_count("user:1"), 1);
//! # }
//! ```

// Allow missing error/panic docs for test mocks - they are designed to be simple
// and errors are clearly indicated by their return types
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use thiserror::Error;

use crate::loader::{AsyncLoader, Loader};

/// Errors returned by [`MockDb`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MockDbError {
    /// The key has no stored value
    #[error("key '{key}' not found")]
    NotFound { key: String },

    /// A failure was injected for this key
    #[error("injected failure for key '{key}'")]
    Injected { key: String },

    /// The whole store was marked unavailable
    #[error("mock database unavailable")]
    Unavailable,
}

#[derive(Debug, Default)]
struct MockDbState {
    data: RwLock<HashMap<String, String>>,
    loads: Mutex<HashMap<String, usize>>,
    total_loads: AtomicUsize,
    failing: Mutex<HashSet<String>>,
    unavailable: AtomicBool,
    latency: Mutex<Duration>,
}

/// In-memory backing store with load accounting and failure injection
///
/// Clones share the same underlying state.
#[derive(Debug, Clone, Default)]
pub struct MockDb {
    state: Arc<MockDbState>,
}

impl MockDb {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `entries`
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let db = Self::new();
        {
            let mut data = db.state.data.write();
            data.extend(entries.into_iter().map(|(k, v)| (k.into(), v.into())));
        }
        db
    }

    /// Store `count` entries named `key-{i}` with values `value-{i}`
    pub fn sequential(count: usize) -> Self {
        Self::with_entries((0..count).map(|i| (format!("key-{i}"), format!("value-{i}"))))
    }

    /// Insert or replace a stored value
    pub fn insert<K: Into<String>, V: Into<String>>(&self, key: K, value: V) {
        self.state.data.write().insert(key.into(), value.into());
    }

    /// Delay every subsequent load by `latency`
    pub fn set_latency(&self, latency: Duration) {
        *self.state.latency.lock() = latency;
    }

    /// Make loads of `key` fail until [`recover_key`](Self::recover_key)
    pub fn fail_key<K: Into<String>>(&self, key: K) {
        self.state.failing.lock().insert(key.into());
    }

    /// Stop failing loads of `key`
    pub fn recover_key(&self, key: &str) {
        self.state.failing.lock().remove(key);
    }

    /// Make every load fail (or succeed again)
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of loads attempted for `key`, including failed ones
    pub fn load_count(&self, key: &str) -> usize {
        self.state.loads.lock().get(key).copied().unwrap_or(0)
    }

    /// Number of loads attempted across all keys
    pub fn total_loads(&self) -> usize {
        self.state.total_loads.load(Ordering::SeqCst)
    }

    /// Look up `key`, counting the attempt and applying injected faults
    /// but not the configured latency
    pub fn fetch(&self, key: &str) -> Result<String, MockDbError> {
        *self.state.loads.lock().entry(key.to_string()).or_insert(0) += 1;
        self.state.total_loads.fetch_add(1, Ordering::SeqCst);

        if self.state.unavailable.load(Ordering::SeqCst) {
            return Err(MockDbError::Unavailable);
        }
        if self.state.failing.lock().contains(key) {
            return Err(MockDbError::Injected { key: key.to_string() });
        }
        self.state
            .data
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| MockDbError::NotFound { key: key.to_string() })
    }
}

impl Loader<String, String> for MockDb {
    type Error = MockDbError;

    fn load(&self, key: &String) -> Result<String, MockDbError> {
        let latency = *self.state.latency.lock();
        if !latency.is_zero() {
            thread::sleep(latency);
        }
        self.fetch(key)
    }
}

/// The async loader ignores the configured latency so it never blocks an
/// executor thread.
#[async_trait]
impl AsyncLoader<String, String> for MockDb {
    type Error = MockDbError;

    async fn load(&self, key: &String) -> Result<String, MockDbError> {
        self.fetch(key)
    }
}
