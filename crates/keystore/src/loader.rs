//! Backing-store contracts consumed by the caches.
//!
//! A loader is the authoritative source for a key's value. The cache calls it
//! at most once per miss resolution and never caches its failures.
//!
//! A loader must not call back into the cache that owns it: under
//! [`LoadCoordination::Exclusive`](crate::LoadCoordination::Exclusive) the
//! call happens while the cache's exclusive lock is held and would deadlock.

use async_trait::async_trait;

use crate::error::BoxedError;

/// Synchronous backing-store contract
///
/// Closures of the form `Fn(&K) -> Result<V, E>` implement this trait:
///
/// ```
/// use keystore_cache::Loader;
///
/// let loader = |key: &String| -> Result<usize, std::io::Error> { Ok(key.len()) };
/// assert_eq!(loader.load(&"abc".to_string()).unwrap(), 3);
/// ```
pub trait Loader<K, V>: Send + Sync {
    /// Error produced when the backing store cannot provide a value
    type Error: Into<BoxedError>;

    /// Fetch the value for `key` from the backing store
    fn load(&self, key: &K) -> Result<V, Self::Error>;
}

impl<K, V, E, F> Loader<K, V> for F
where
    F: Fn(&K) -> Result<V, E> + Send + Sync,
    E: Into<BoxedError>,
{
    type Error = E;

    fn load(&self, key: &K) -> Result<V, E> {
        self(key)
    }
}

/// Asynchronous backing-store contract used by
/// [`AsyncKeyStoreCache`](crate::AsyncKeyStoreCache)
#[async_trait]
pub trait AsyncLoader<K, V>: Send + Sync
where
    K: Sync,
    V: Send,
{
    /// Error produced when the backing store cannot provide a value
    type Error: Into<BoxedError> + Send;

    /// Fetch the value for `key` from the backing store
    async fn load(&self, key: &K) -> Result<V, Self::Error>;
}
