//! Bounded response cache with first-in, first-out eviction.
//!
//! [`FifoCache`] keeps its own queue of keys so eviction order is strictly
//! insertion order: reading an entry or overwriting its value never moves it
//! back in the queue. [`SharedFifoCache`] wraps it in a mutex so every
//! insertion and its eviction bookkeeping happen as one step, keeping the
//! capacity bound intact when many requests complete at once.

use std::collections::{HashMap, VecDeque};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};

use log::debug;
use serde_json::Value;

/// Upstream payload as stored in and served from the cache.
pub type CachedPayload = Arc<Value>;

/// Number of entries retained when no capacity is configured.
pub const DEFAULT_CACHE_CAPACITY: NonZeroUsize = NonZeroUsize::MIN.saturating_add(199);

/// A capacity-bounded map that evicts the oldest inserted key first.
///
/// # Examples
///
/// ```
/// use std::num::NonZeroUsize;
/// use poi_gateway_core::FifoCache;
///
/// let capacity = NonZeroUsize::new(2).ok_or("capacity must be non-zero")?;
/// let mut cache = FifoCache::new(capacity);
/// cache.put("a".to_owned(), 1);
/// cache.put("b".to_owned(), 2);
/// cache.put("a".to_owned(), 10);
/// let evicted = cache.put("c".to_owned(), 3);
///
/// assert_eq!(evicted, vec!["a".to_owned()]);
/// assert_eq!(cache.get("b"), Some(&2));
/// # Ok::<(), &'static str>(())
/// ```
#[derive(Debug, Clone)]
pub struct FifoCache<V> {
    capacity: NonZeroUsize,
    entries: HashMap<String, V>,
    order: VecDeque<String>,
}

impl<V> FifoCache<V> {
    /// Create an empty cache holding at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            capacity,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    /// Look up an entry without affecting its eviction position.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.get(key)
    }

    /// Insert or overwrite an entry and return any keys evicted as a result.
    ///
    /// Overwriting keeps the key's original insertion position.
    pub fn put(&mut self, key: String, value: V) -> Vec<String> {
        if let Some(slot) = self.entries.get_mut(&key) {
            *slot = value;
            return Vec::new();
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, value);
        self.evict_if_over_capacity()
    }

    /// Drop the oldest entries until the cache is within capacity.
    pub fn evict_if_over_capacity(&mut self) -> Vec<String> {
        let mut evicted = Vec::new();
        while self.entries.len() > self.capacity.get() {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.entries.remove(&oldest);
            evicted.push(oldest);
        }
        evicted
    }

    /// Number of entries currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries retained.
    #[must_use]
    pub const fn capacity(&self) -> NonZeroUsize {
        self.capacity
    }

    /// Keys from oldest to newest insertion.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }
}

/// Process-wide response cache shared between in-flight requests.
///
/// Implementations must be safe to call concurrently and must keep their
/// capacity bound under concurrent `put`s.
pub trait ResponseCache: Send + Sync {
    /// Return the payload stored under `key`, if any.
    fn get(&self, key: &str) -> Option<CachedPayload>;

    /// Store `payload` under `key`, evicting as needed.
    fn put(&self, key: String, payload: CachedPayload);

    /// Number of entries currently held.
    fn len(&self) -> usize;

    /// Whether the cache holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A [`FifoCache`] guarded by a single mutex.
#[derive(Debug)]
pub struct SharedFifoCache {
    inner: Mutex<FifoCache<CachedPayload>>,
}

impl SharedFifoCache {
    /// Create an empty shared cache of the given capacity.
    #[must_use]
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            inner: Mutex::new(FifoCache::new(capacity)),
        }
    }

    fn with_cache<R>(&self, f: impl FnOnce(&mut FifoCache<CachedPayload>) -> R) -> R {
        // A panic while holding the lock cannot leave the map and queue out of
        // step, so a poisoned guard is still safe to use.
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

impl Default for SharedFifoCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl ResponseCache for SharedFifoCache {
    fn get(&self, key: &str) -> Option<CachedPayload> {
        self.with_cache(|cache| cache.get(key).cloned())
    }

    fn put(&self, key: String, payload: CachedPayload) {
        let evicted = self.with_cache(|cache| cache.put(key, payload));
        if !evicted.is_empty() {
            debug!("evicted {} cached response(s) at capacity", evicted.len());
        }
    }

    fn len(&self) -> usize {
        self.with_cache(|cache| cache.len())
    }
}
