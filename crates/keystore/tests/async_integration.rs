//! Integration tests for the async key store cache

#![cfg(feature = "test-utils")]

use std::sync::Arc;

use futures::future::join_all;
use keystore_cache::testing::MockDb;
use keystore_cache::{AsyncKeyStoreCache, CacheConfig, CacheError};

fn key(name: &str) -> String {
    name.to_string()
}

/// Verifies LRU eviction through the async API at capacity 3.
///
/// # Test Steps
/// 1. Load `key-0`..`key-2`
/// 2. Touch `key-0` so `key-1` becomes least recently used
/// 3. Load `key-3` and verify `key-1` was evicted
#[tokio::test]
async fn test_async_lru_eviction() {
    let db = MockDb::sequential(4);
    let cache = AsyncKeyStoreCache::new(3, db.clone()).unwrap();

    for i in 0..3 {
        cache.get(&format!("key-{i}")).await.unwrap();
    }
    cache.get(&key("key-0")).await.unwrap();
    cache.get(&key("key-3")).await.unwrap();

    assert_eq!(cache.keys().await, vec![key("key-3"), key("key-0"), key("key-2")]);
    assert!(!cache.contains(&key("key-1")).await);
    assert_eq!(db.total_loads(), 4);
}

/// Validates that many tasks sharing one cache agree on values and stay
/// within capacity.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_async_concurrent_tasks() {
    let db = MockDb::sequential(32);
    let config = CacheConfig::builder().capacity(8).track_metrics(true).build();
    let cache = Arc::new(AsyncKeyStoreCache::with_config(config, db.clone()).unwrap());

    let tasks = (0..64).map(|i| {
        let cache = Arc::clone(&cache);
        tokio::spawn(async move {
            let n = i % 32;
            let value = cache.get(&format!("key-{n}")).await.unwrap();
            assert_eq!(value, format!("value-{n}"));
        })
    });
    for result in join_all(tasks).await {
        result.unwrap();
    }

    assert!(cache.len().await <= 8);
    assert!(cache.check_invariants().await.is_ok());
    assert_eq!(cache.stats().await.loads as usize, db.total_loads());
}

/// Validates zero capacity rejection and load error propagation.
#[tokio::test]
async fn test_async_errors() {
    let db = MockDb::new();
    let err = AsyncKeyStoreCache::new(0, db.clone()).unwrap_err();
    assert!(matches!(err, CacheError::InvalidCapacity { capacity: 0 }));

    let cache = AsyncKeyStoreCache::new(1, db.clone()).unwrap();
    db.fail_key("a");
    assert!(cache.get(&key("a")).await.unwrap_err().is_load_error());
    assert!(cache.is_empty().await);

    db.recover_key("a");
    db.insert("a", "1");
    assert_eq!(cache.get(&key("a")).await.unwrap(), "1");
    assert_eq!(db.load_count("a"), 2);
}
