//! Concurrent Map Implementation
//!
//! This module implements a generic key-value map guarded by a single
//! exclusive lock. Every operation, read-only ones included, acquires the
//! same mutex for its full duration.
//!
//! ## Design
//!
//! The map uses:
//! - One `parking_lot::Mutex` around an optional `HashMap`
//! - Lazy creation of the `HashMap` on first access, while the lock is held
//! - A scoped critical-section guard that records metrics when it is dropped,
//!   including during unwinding
//!
//! `parking_lot` mutexes do not poison, so a panic inside a critical section
//! (a [`get`](ConcurrentMap::get) miss or a panicking visitor) leaves the map
//! usable by every other caller.
//!
//! ## Ordering
//!
//! Operations from different threads are totally ordered by lock acquisition.
//! Iteration order of [`range`](ConcurrentMap::range),
//! [`keys`](ConcurrentMap::keys) and [`values`](ConcurrentMap::values) is the
//! `HashMap` order and must not be relied upon.
//!
//! ## Example
//!
//! ```rust
//! use syncmap::ConcurrentMap;
//! use std::sync::Arc;
//! use std::thread;
//!
//! let map = Arc::new(ConcurrentMap::new());
//!
//! // Writer thread
//! let writer = thread::spawn({
//!     let map = Arc::clone(&map);
//!     move || {
//!         for i in 0..1000 {
//!             map.insert(i, i * 2);
//!         }
//!     }
//! });
//!
//! // Reader thread
//! let reader = thread::spawn({
//!     let map = Arc::clone(&map);
//!     move || {
//!         let mut sum = 0;
//!         for i in 0..1000 {
//!             if map.exists(&i) {
//!                 sum += map.get(&i) - i * 2;
//!             }
//!         }
//!         sum
//!     }
//! });
//!
//! writer.join().unwrap();
//! assert_eq!(reader.join().unwrap(), 0);
//! assert_eq!(map.len(), 1000);
//! ```

use crate::metrics::{AtomicMetrics, MetricsCollector, PerformanceMetrics};
use core::fmt::{self, Debug, Display};
use core::hash::Hash;
use parking_lot::{Mutex, MutexGuard};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, trace};

/// A key-value map where every operation holds one exclusive lock
///
/// # Type Parameters
///
/// * `K` - The key type, must implement `Hash + Eq`
/// * `V` - The value type
///
/// # Safety
///
/// The map is `Sync` whenever `K` and `V` are `Send`, and can be shared
/// through an `Arc` or declared as a `static`.
///
/// Calling back into the same map from inside a [`range`](Self::range)
/// visitor deadlocks: the lock is not reentrant.
///
/// # Examples
///
/// ```rust
/// use syncmap::ConcurrentMap;
///
/// let map: ConcurrentMap<&str, String> = ConcurrentMap::new();
/// map.insert("hello", "world".to_string());
/// assert!(map.exists(&"hello"));
/// assert_eq!(map.get(&"hello"), "world");
/// ```
pub struct ConcurrentMap<K, V> {
    // Backing storage, `None` until the first operation
    data: Mutex<Option<HashMap<K, V>>>,

    // Capacity used when the backing storage is created
    capacity: usize,

    metrics: AtomicMetrics,
}

/// One critical section: holds the lock and records the operation on drop
struct Section<'a, K, V> {
    guard: MutexGuard<'a, Option<HashMap<K, V>>>,
    capacity: usize,
    metrics: &'a AtomicMetrics,
    started: Option<Instant>,
    failed: bool,
}

impl<K, V> Section<'_, K, V> {
    fn data(&mut self) -> &mut HashMap<K, V> {
        let capacity = self.capacity;
        self.guard.get_or_insert_with(|| {
            trace!(capacity, "creating backing map");
            HashMap::with_capacity(capacity)
        })
    }

    fn fail(&mut self) {
        self.failed = true;
    }
}

impl<K, V> Drop for Section<'_, K, V> {
    fn drop(&mut self) {
        // Runs before `guard` is released, so the entry count is exact
        let Some(started) = self.started else {
            return;
        };
        let elapsed = started.elapsed();
        self.metrics
            .update_entries((*self.guard).as_ref().map_or(0, HashMap::len));
        if self.failed || std::thread::panicking() {
            self.metrics.record_failure(elapsed);
        } else {
            self.metrics.record_success(elapsed);
        }
    }
}

impl<K, V> ConcurrentMap<K, V> {
    /// Create a new, empty map
    ///
    /// No storage is allocated until the first operation.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use syncmap::ConcurrentMap;
    ///
    /// static MAP: ConcurrentMap<i32, i32> = ConcurrentMap::new();
    /// assert!(MAP.is_empty());
    /// ```
    pub const fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create a new map that allocates room for `capacity` entries on first use
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of entries the backing storage is created with
    ///
    /// # Examples
    ///
    /// ```rust
    /// use syncmap::ConcurrentMap;
    ///
    /// let map: ConcurrentMap<i32, String> = ConcurrentMap::with_capacity(100);
    /// assert!(map.is_empty());
    /// ```
    pub const fn with_capacity(capacity: usize) -> Self {
        Self {
            data: parking_lot::const_mutex(None),
            capacity,
            metrics: AtomicMetrics::new(),
        }
    }

    /// Consume the map and return its entries
    pub fn into_inner(self) -> HashMap<K, V> {
        self.data.into_inner().unwrap_or_default()
    }

    fn lock(&self) -> Section<'_, K, V> {
        let enabled = self.metrics.is_enabled();
        let guard = match self.data.try_lock() {
            Some(guard) => guard,
            None => {
                if enabled {
                    self.metrics.record_contention();
                }
                self.data.lock()
            }
        };

        Section {
            guard,
            capacity: self.capacity,
            metrics: &self.metrics,
            started: enabled.then(Instant::now),
            failed: false,
        }
    }
}

impl<K, V> ConcurrentMap<K, V>
where
    K: Hash + Eq,
{
    /// Check whether `key` is present
    ///
    /// # Examples
    ///
    /// ```rust
    /// use syncmap::ConcurrentMap;
    ///
    /// let map = ConcurrentMap::new();
    /// assert!(!map.exists(&"hello"));
    /// map.insert("hello", "world");
    /// assert!(map.exists(&"hello"));
    /// ```
    pub fn exists(&self, key: &K) -> bool {
        self.lock().data().contains_key(key)
    }

    /// Insert a key-value pair, replacing any value already stored for `key`
    ///
    /// # Arguments
    ///
    /// * `key` - The key to insert
    /// * `value` - The value to associate with the key
    ///
    /// # Examples
    ///
    /// ```rust
    /// use syncmap::ConcurrentMap;
    ///
    /// let map = ConcurrentMap::new();
    /// map.insert(1, "one");
    /// map.insert(1, "uno");
    /// assert_eq!(map.get(&1), "uno");
    /// assert_eq!(map.len(), 1);
    /// ```
    pub fn insert(&self, key: K, value: V) {
        self.lock().data().insert(key, value);
    }

    /// Remove `key` if present; removing a missing key does nothing
    ///
    /// # Examples
    ///
    /// ```rust
    /// use syncmap::ConcurrentMap;
    ///
    /// let map = ConcurrentMap::new();
    /// map.delete(&0);
    /// map.insert(0, 1);
    /// map.delete(&0);
    /// assert!(!map.exists(&0));
    /// ```
    pub fn delete(&self, key: &K) {
        self.lock().data().remove(key);
    }

    /// Return a copy of the value stored for `key`
    ///
    /// # Panics
    ///
    /// Panics with `value for key '<key>' does not exist` when `key` is
    /// absent. Callers that cannot guarantee presence should check
    /// [`exists`](Self::exists) first. The two calls are separate critical
    /// sections, so another thread may still delete the key in between.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use syncmap::ConcurrentMap;
    ///
    /// let map = ConcurrentMap::new();
    /// map.insert("zero", 0);
    /// assert_eq!(map.get(&"zero"), 0);
    /// ```
    ///
    /// ```should_panic
    /// use syncmap::ConcurrentMap;
    ///
    /// let map: ConcurrentMap<&str, i32> = ConcurrentMap::new();
    /// map.get(&"two");
    /// ```
    pub fn get(&self, key: &K) -> V
    where
        K: Debug,
        V: Clone,
    {
        let mut section = self.lock();
        let found = section.data().get(key).cloned();
        match found {
            Some(value) => value,
            None => {
                section.fail();
                panic!("value for key '{:?}' does not exist", key);
            }
        }
    }

    /// Visit every entry until `visit` returns `false`
    ///
    /// The whole traversal runs inside one critical section: a slow visitor
    /// stalls every other caller, and a visitor that touches this map
    /// deadlocks.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use syncmap::ConcurrentMap;
    ///
    /// let map = ConcurrentMap::new();
    /// map.insert(1, 2);
    /// map.insert(3, 4);
    ///
    /// let mut visited = 0;
    /// map.range(|_, _| {
    ///     visited += 1;
    ///     false
    /// });
    /// assert_eq!(visited, 1);
    /// ```
    pub fn range<F>(&self, mut visit: F)
    where
        F: FnMut(&K, &V) -> bool,
    {
        let mut section = self.lock();
        for (key, value) in section.data().iter() {
            if !visit(key, value) {
                break;
            }
        }
    }

    /// Snapshot of all keys, in unspecified order
    pub fn keys(&self) -> Vec<K>
    where
        K: Clone,
    {
        self.lock().data().keys().cloned().collect()
    }

    /// Snapshot of all values, in unspecified order
    pub fn values(&self) -> Vec<V>
    where
        V: Clone,
    {
        self.lock().data().values().cloned().collect()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.lock().data().len()
    }

    /// Check if the map has no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every entry
    pub fn clear(&self) {
        self.lock().data().clear();
    }

    /// Serialize the map as a flat JSON object
    ///
    /// Keys are rendered as JSON strings through their `Display`
    /// implementation; values use their `Serialize` implementation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`](crate::Error::Serialization) when a
    /// value cannot be encoded.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use syncmap::ConcurrentMap;
    ///
    /// let map = ConcurrentMap::new();
    /// map.insert(1, 2);
    /// assert_eq!(map.to_json()?, br#"{"1":2}"#);
    /// # Ok::<(), syncmap::Error>(())
    /// ```
    pub fn to_json(&self) -> crate::Result<Vec<u8>>
    where
        K: Display,
        V: Serialize,
    {
        serde_json::to_vec(self).map_err(|err| {
            debug!(error = %err, "map serialization failed");
            crate::Error::from(err)
        })
    }
}

impl<K, V> Serialize for ConcurrentMap<K, V>
where
    K: Hash + Eq + Display,
    V: Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut section = self.lock();
        let result = serialize_entries(section.data(), serializer);
        if result.is_err() {
            section.fail();
        }
        result
    }
}

fn serialize_entries<K, V, S>(data: &HashMap<K, V>, serializer: S) -> Result<S::Ok, S::Error>
where
    K: Display,
    V: Serialize,
    S: Serializer,
{
    let mut entries = serializer.serialize_map(Some(data.len()))?;
    for (key, value) in data {
        entries.serialize_entry(&JsonKey(key), value)?;
    }
    entries.end()
}

/// Map key rendered as a string through `Display`
struct JsonKey<'a, K>(&'a K);

impl<K: Display> Serialize for JsonKey<'_, K> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self.0)
    }
}

impl<K, V> MetricsCollector for ConcurrentMap<K, V> {
    fn metrics(&self) -> PerformanceMetrics {
        self.metrics.snapshot()
    }

    fn reset_metrics(&self) {
        self.metrics.reset();
    }

    fn set_metrics_enabled(&self, enabled: bool) {
        self.metrics.set_enabled(enabled);
    }

    fn is_metrics_enabled(&self) -> bool {
        self.metrics.is_enabled()
    }
}

impl<K, V> Default for ConcurrentMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Debug, V: Debug> Debug for ConcurrentMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = self.data.lock();
        f.debug_map()
            .entries((*guard).iter().flat_map(|data| data.iter()))
            .finish()
    }
}

impl<K, V> FromIterator<(K, V)> for ConcurrentMap<K, V>
where
    K: Hash + Eq,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let map = Self::new();
        map.lock().data().extend(iter);
        map
    }
}

impl<K, V> Extend<(K, V)> for ConcurrentMap<K, V>
where
    K: Hash + Eq,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        self.lock().data().extend(iter);
    }
}
