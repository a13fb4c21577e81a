//! Registry of loads in progress, one leader per key.
//!
//! Used by [`LoadCoordination::PerKey`](crate::LoadCoordination::PerKey). The
//! first caller to miss on a key becomes its leader and performs the load
//! without holding the cache's structure lock. Callers that miss on the same
//! key while the load is running become waiters: they block on the load's
//! condition variable and, once woken, look the key up again.
//!
//! The registry never carries a load's outcome to its waiters. If the leader
//! fails, each waiter finds the key still absent and competes to lead the
//! next attempt.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
pub(crate) struct InflightLoad {
    finished: Mutex<bool>,
    cv: Condvar,
}

impl InflightLoad {
    /// Blocks until the leader of this load has finished, successfully or not.
    pub(crate) fn wait(&self) {
        let mut finished = self.finished.lock();
        while !*finished {
            self.cv.wait(&mut finished);
        }
    }

    fn finish(&self) {
        *self.finished.lock() = true;
        self.cv.notify_all();
    }
}

pub(crate) enum InflightRole<'a, K>
where
    K: Eq + Hash + Clone,
{
    Leader(LeaderGuard<'a, K>),
    Waiter(Arc<InflightLoad>),
}

#[derive(Debug)]
pub(crate) struct InflightRegistry<K> {
    loads: Mutex<HashMap<K, Arc<InflightLoad>>>,
}

impl<K> Default for InflightRegistry<K> {
    fn default() -> Self {
        Self { loads: Mutex::new(HashMap::new()) }
    }
}

impl<K> InflightRegistry<K>
where
    K: Eq + Hash + Clone,
{
    /// Joins the load for `key`, becoming its leader if none is running.
    pub(crate) fn begin(&self, key: &K) -> InflightRole<'_, K> {
        let mut loads = self.loads.lock();
        if let Some(load) = loads.get(key) {
            return InflightRole::Waiter(Arc::clone(load));
        }

        let load = Arc::new(InflightLoad::default());
        loads.insert(key.clone(), Arc::clone(&load));
        InflightRole::Leader(LeaderGuard { registry: self, key: key.clone(), load })
    }

    /// Number of loads currently running.
    pub(crate) fn len(&self) -> usize {
        self.loads.lock().len()
    }

    fn complete(&self, key: &K, load: &InflightLoad) {
        self.loads.lock().remove(key);
        load.finish();
    }
}

/// Leadership of one in-flight load.
///
/// Dropping the guard deregisters the load and wakes its waiters, which also
/// happens if the loader panics.
pub(crate) struct LeaderGuard<'a, K>
where
    K: Eq + Hash + Clone,
{
    registry: &'a InflightRegistry<K>,
    key: K,
    load: Arc<InflightLoad>,
}

impl<K> Drop for LeaderGuard<'_, K>
where
    K: Eq + Hash + Clone,
{
    fn drop(&mut self) {
        self.registry.complete(&self.key, &self.load);
    }
}
