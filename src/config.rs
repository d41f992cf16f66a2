//! Configuration Module
//!
//! Handles loading cache configuration from environment variables.

use std::env;
use std::path::PathBuf;

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of entries the cache can hold
    pub capacity: usize,
    /// Whether `set_expire` is honored and a sweep task is started
    pub expiry_enabled: bool,
    /// Expiry sweep interval in milliseconds
    pub sweep_interval_ms: u64,
    /// Directory snapshots are persisted into
    pub snapshot_dir: PathBuf,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_CAPACITY` - Maximum cache entries (default: 1000, must be > 0)
    /// - `CACHE_EXPIRY_ENABLED` - `true`/`1` to enable expiry (default: false)
    /// - `CACHE_SWEEP_INTERVAL_MS` - Sweep frequency in milliseconds (default: 100)
    /// - `CACHE_SNAPSHOT_DIR` - Snapshot directory (default: `.`)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            capacity: env::var("CACHE_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|&cap: &usize| cap > 0)
                .unwrap_or(defaults.capacity),
            expiry_enabled: env::var("CACHE_EXPIRY_ENABLED")
                .ok()
                .and_then(|v| parse_flag(&v))
                .unwrap_or(defaults.expiry_enabled),
            sweep_interval_ms: env::var("CACHE_SWEEP_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.sweep_interval_ms),
            snapshot_dir: env::var("CACHE_SNAPSHOT_DIR")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.snapshot_dir),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capacity: 1000,
            expiry_enabled: false,
            sweep_interval_ms: 100,
            snapshot_dir: PathBuf::from("."),
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
