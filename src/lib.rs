//! LRU Memcache - A concurrency-safe, capacity-bounded in-memory cache
//!
//! Provides strict LRU eviction, optional per-key expiry driven by a
//! background sweep, and versioned snapshots for cold persistence and restore.

pub mod cache;
pub mod config;
pub mod error;
pub mod registry;
pub mod snapshot;
pub mod tasks;

pub use cache::{CacheStats, Memcache};
pub use config::Config;
pub use error::{CacheError, Result};
pub use registry::{CacheInstance, Registry};
pub use snapshot::{Snapshot, SnapshotNode};
pub use tasks::{spawn_expiry_task, ExpiryTask};
