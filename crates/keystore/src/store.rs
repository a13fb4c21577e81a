//! Key index and recency ordering kept in lockstep.
//!
//! [`Store`] is the structure guarded by a cache's lock. The index maps each
//! key to the [`Handle`] of its entry in the [`RecencyList`]; every mutation
//! updates both sides together so the two always describe the same set of
//! entries.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use tracing::error;

use crate::error::{CacheError, CacheResult};
use crate::recency::{Handle, RecencyList};

pub(crate) struct Store<K, V> {
    index: HashMap<K, Handle>,
    order: RecencyList<K, V>,
}

impl<K, V> Store<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self { index: HashMap::with_capacity(capacity), order: RecencyList::with_capacity(capacity) }
    }

    pub(crate) fn len(&self) -> usize {
        self.index.len()
    }

    pub(crate) fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Reads a value without touching the recency order.
    pub(crate) fn peek(&self, key: &K) -> Option<&V> {
        let handle = *self.index.get(key)?;
        self.order.get(handle).map(|(_, value)| value)
    }

    /// Moves `key` to the MRU position and returns its value.
    ///
    /// Returns `None` when the key is absent. A key whose handle has gone
    /// stale is dropped from the index so a following insert can repair it.
    pub(crate) fn promote(&mut self, key: &K) -> Option<&V> {
        let handle = *self.index.get(key)?;
        if !self.order.move_to_front(handle) {
            error!(key = ?key, "Index referenced a stale recency handle; dropping it");
            self.index.remove(key);
            return None;
        }
        self.order.get(handle).map(|(_, value)| value)
    }

    /// Inserts an absent key at the MRU position, first evicting the LRU
    /// entry when the store already holds `capacity` entries.
    ///
    /// Returns the evicted key, if any.
    pub(crate) fn insert(&mut self, key: K, value: V, capacity: usize) -> Option<K> {
        let mut evicted = None;
        if self.index.len() >= capacity {
            if let Some((lru_key, _)) = self.order.remove_back() {
                self.index.remove(&lru_key);
                evicted = Some(lru_key);
            }
        }

        let handle = self.order.push_front(key.clone(), value);
        self.index.insert(key, handle);
        evicted
    }

    pub(crate) fn clear(&mut self) {
        self.index.clear();
        self.order.clear();
    }

    /// Keys from MRU to LRU.
    pub(crate) fn keys(&self) -> Vec<K> {
        self.order.iter().map(|(key, _)| key.clone()).collect()
    }

    /// Verifies that the index and the recency order describe the same
    /// entries and that the store is within `capacity`.
    pub(crate) fn check_invariants(&self, capacity: usize) -> CacheResult<()> {
        if self.index.len() != self.order.len() {
            return Err(CacheError::internal(format!(
                "index holds {} keys but recency order holds {} entries",
                self.index.len(),
                self.order.len()
            )));
        }
        if self.index.len() > capacity {
            return Err(CacheError::internal(format!(
                "{} entries exceed capacity {capacity}",
                self.index.len()
            )));
        }

        let mut visited = 0_usize;
        for (key, _) in self.order.iter() {
            visited += 1;
            let Some(&handle) = self.index.get(key) else {
                return Err(CacheError::internal(format!(
                    "recency entry {key:?} is missing from the index"
                )));
            };
            match self.order.get(handle) {
                Some((stored, _)) if stored == key => {}
                _ => {
                    return Err(CacheError::internal(format!(
                        "index handle for {key:?} does not address its entry"
                    )));
                }
            }
        }
        if visited != self.order.len() {
            return Err(CacheError::internal(format!(
                "recency walk visited {visited} entries, expected {}",
                self.order.len()
            )));
        }
        Ok(())
    }
}
