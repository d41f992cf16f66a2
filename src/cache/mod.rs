//! Cache Module
//!
//! The LRU cache engine: entry arena, ordered index, expiry table and the
//! locked [`Memcache`] that ties them together.

mod entry;
mod expiry;
mod index;
mod stats;
mod store;


// Re-export public types
pub use entry::{current_timestamp_ms, Entry};
pub use expiry::ExpiryTable;
pub use index::{Iter, OrderedIndex};
pub use stats::CacheStats;
pub use store::{Memcache, DEFAULT_SWEEP_INTERVAL};
