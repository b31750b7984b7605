//! Map implementations
//!
//! ## Available Maps
//!
//! - [`ConcurrentMap`]: a `HashMap` behind one exclusive lock, with JSON export
//!
//! ## Choosing a Map
//!
//! - Use `ConcurrentMap` when simplicity and a total order of operations
//!   matter more than read scalability
//! - Keep visitors passed to [`ConcurrentMap::range`] short; they run with the
//!   lock held

pub mod concurrent;

pub use self::concurrent::ConcurrentMap;


#[cfg(test)]
mod proptests;
