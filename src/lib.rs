//! # syncmap
//!
//! A generic, thread-safe key-value map where every operation runs inside one
//! exclusive critical section.
//!
//! ## Features
//!
//! - **ConcurrentMap**: existence checks, insertion, deletion, lookup, visiting,
//!   key/value snapshots and JSON export, all serialized through a single mutex
//! - **Metrics**: per-map operation counts, contention and critical-section timing
//!
//! ## Quick Start
//!
//! ```rust
//! use syncmap::ConcurrentMap;
//!
//! let map = ConcurrentMap::new();
//! map.insert(1, 2);
//! assert!(map.exists(&1));
//! assert_eq!(map.get(&1), 2);
//! assert_eq!(map.to_json()?, br#"{"1":2}"#);
//! # Ok::<(), syncmap::Error>(())
//! ```
//!
//! ## Thread Safety
//!
//! A single lock guards all access, reads included. There is no reader fast
//! path, and operations from different threads are ordered by lock
//! acquisition. Two consecutive calls (for example [`ConcurrentMap::exists`]
//! followed by [`ConcurrentMap::get`]) are not atomic as a pair.
//!
//! ## Static Maps
//!
//! [`ConcurrentMap::new`] is a `const fn`; the backing storage is created on
//! first use, so a map can be declared as a `static`:
//!
//! ```rust
//! use syncmap::ConcurrentMap;
//!
//! static SESSIONS: ConcurrentMap<u64, &str> = ConcurrentMap::new();
//!
//! SESSIONS.insert(7, "alice");
//! assert_eq!(SESSIONS.get(&7), "alice");
//! ```

#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

pub mod map;
pub mod metrics;

pub use crate::map::ConcurrentMap;
pub use crate::metrics::{MetricsCollector, PerformanceMetrics};

/// Error types for syncmap operations
///
/// Looking up a missing key is not represented here: [`ConcurrentMap::get`]
/// panics instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A key or value could not be encoded as JSON
    #[error("failed to serialize map: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for syncmap operations
pub type Result<T> = core::result::Result<T, Error>;
