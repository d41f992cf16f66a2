//! Snapshot Module
//!
//! Point-in-time copies of a [`Memcache`] for cold persistence and restore.
//!
//! File format:
//! - Header: magic bytes `b"LRUS"`, format revision u8
//! - Body: zstd-compressed bincode of [`Snapshot`]
//!
//! Node values are carried as the JSON encoding of the cache's value type.
//! JSON is self-describing, so values that rely on `deserialize_any` (untagged
//! enums, `serde_json::Value`, skipped fields) restore correctly, and a
//! snapshot can be decoded and inspected without knowing that type.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use std::time::Duration;

use crate::cache::{Memcache, DEFAULT_SWEEP_INTERVAL};
use crate::error::{CacheError, Result};

/// Leading bytes of every encoded snapshot.
pub const SNAPSHOT_MAGIC: [u8; 4] = *b"LRUS";

/// Current revision of the snapshot wire format.
pub const SNAPSHOT_FORMAT: u8 = 1;

const HEADER_LEN: usize = SNAPSHOT_MAGIC.len() + 1;
const ZSTD_LEVEL: i32 = 3;

// == Snapshot Node ==
/// One key and its serialized value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotNode {
    pub key: String,
    pub value: Vec<u8>,
}

// == Snapshot ==
/// Captured cache state. `nodes` are in recency order, most recent first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Capture time, microseconds since the Unix epoch
    pub version: i64,
    /// Number of entries at capture time
    pub size: u64,
    /// Capacity of the captured cache
    pub cap: u64,
    /// Entries from head to tail
    pub nodes: Vec<SnapshotNode>,
}

impl Snapshot {
    // == Capture ==
    /// Copies every entry of `cache` in head-to-tail order under its lock.
    pub fn capture<V: Serialize>(cache: &Memcache<V>) -> Result<Self> {
        let nodes = cache.with_index(|index| {
            index
                .iter()
                .map(|(key, value)| -> Result<SnapshotNode> {
                    let value = serde_json::to_vec(value).map_err(|e| {
                        CacheError::Encode(format!("value for key {:?}: {}", key, e))
                    })?;
                    Ok(SnapshotNode {
                        key: key.to_string(),
                        value,
                    })
                })
                .collect::<Result<Vec<_>>>()
        })?;

        let snapshot = Self {
            version: chrono::Utc::now().timestamp_micros(),
            size: nodes.len() as u64,
            cap: cache.cap() as u64,
            nodes,
        };
        debug!(
            version = snapshot.version,
            size = snapshot.size,
            "snapshot captured"
        );
        Ok(snapshot)
    }

    // == Encode ==
    /// Serializes and compresses the snapshot behind the format header.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let payload =
            bincode::serialize(self).map_err(|e| CacheError::Encode(e.to_string()))?;
        let compressed = zstd::encode_all(payload.as_slice(), ZSTD_LEVEL)
            .map_err(|e| CacheError::Encode(format!("compression failed: {}", e)))?;

        let mut bytes = Vec::with_capacity(HEADER_LEN + compressed.len());
        bytes.extend_from_slice(&SNAPSHOT_MAGIC);
        bytes.push(SNAPSHOT_FORMAT);
        bytes.extend_from_slice(&compressed);
        Ok(bytes)
    }

    // == Decode ==
    /// Parses bytes produced by [`Snapshot::encode`] and validates the record.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(CacheError::Decode(format!(
                "snapshot too short: {} bytes",
                bytes.len()
            )));
        }
        if bytes[..SNAPSHOT_MAGIC.len()] != SNAPSHOT_MAGIC {
            return Err(CacheError::BadMagic);
        }
        let format = bytes[SNAPSHOT_MAGIC.len()];
        if format != SNAPSHOT_FORMAT {
            return Err(CacheError::UnsupportedFormat {
                found: format,
                expected: SNAPSHOT_FORMAT,
            });
        }

        let payload = zstd::decode_all(&bytes[HEADER_LEN..])
            .map_err(|e| CacheError::Decode(format!("decompression failed: {}", e)))?;
        let snapshot: Snapshot = bincode::deserialize(&payload)
            .map_err(|e| CacheError::Decode(format!("malformed record: {}", e)))?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    // == Validate ==
    /// Checks the record describes a cache that can be rebuilt.
    pub fn validate(&self) -> Result<()> {
        if self.cap == 0 {
            return Err(CacheError::Decode("capacity is zero".to_string()));
        }
        if self.size != self.nodes.len() as u64 {
            return Err(CacheError::Decode(format!(
                "size {} does not match {} nodes",
                self.size,
                self.nodes.len()
            )));
        }
        if self.size > self.cap {
            return Err(CacheError::Decode(format!(
                "size {} exceeds capacity {}",
                self.size, self.cap
            )));
        }
        let mut seen = HashSet::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if !seen.insert(node.key.as_str()) {
                return Err(CacheError::Decode(format!("duplicate key {:?}", node.key)));
            }
        }
        Ok(())
    }

    // == Restore ==
    /// Builds a fresh cache with the captured capacity and exact recency order.
    ///
    /// Nothing is constructed unless every node value deserializes.
    /// With `expiry_enabled`, the restored cache sweeps every
    /// [`DEFAULT_SWEEP_INTERVAL`].
    pub fn restore<V>(&self, expiry_enabled: bool) -> Result<Arc<Memcache<V>>>
    where
        V: DeserializeOwned + Send + 'static,
    {
        self.restore_with_options(expiry_enabled, DEFAULT_SWEEP_INTERVAL)
    }

    /// Like [`Snapshot::restore`], with an explicit sweep interval.
    pub fn restore_with_options<V>(
        &self,
        expiry_enabled: bool,
        sweep_interval: Duration,
    ) -> Result<Arc<Memcache<V>>>
    where
        V: DeserializeOwned + Send + 'static,
    {
        self.validate()?;
        let cap = usize::try_from(self.cap)
            .map_err(|_| CacheError::Decode(format!("capacity {} too large", self.cap)))?;

        let nodes = self
            .nodes
            .iter()
            .map(|node| -> Result<(String, V)> {
                let value: V = serde_json::from_slice(&node.value).map_err(|e| {
                    CacheError::Decode(format!("value for key {:?}: {}", node.key, e))
                })?;
                Ok((node.key.clone(), value))
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(version = self.version, size = self.size, "snapshot restored");
        Ok(Memcache::from_ordered(
            cap,
            expiry_enabled,
            sweep_interval,
            nodes,
        ))
    }

    // == File Name ==
    /// Conventional file name, `{version}.bin`.
    pub fn file_name(&self) -> String {
        format!("{}.bin", self.version)
    }

    // == Persist ==
    /// Writes the encoded snapshot into `dir` as [`Snapshot::file_name`].
    ///
    /// Writes go to a temp file first and are renamed into place.
    pub async fn persist(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let bytes = self.encode()?;
        let path = dir.as_ref().join(self.file_name());
        let temp_path = path.with_extension("bin.tmp");

        tokio::fs::write(&temp_path, &bytes).await.map_err(|e| {
            error!(path = %temp_path.display(), "snapshot write failed: {}", e);
            CacheError::Io(e)
        })?;
        tokio::fs::rename(&temp_path, &path).await.map_err(|e| {
            error!(path = %path.display(), "snapshot rename failed: {}", e);
            CacheError::Io(e)
        })?;

        info!(
            path = %path.display(),
            size = self.size,
            bytes = bytes.len(),
            "snapshot persisted"
        );
        Ok(path)
    }

    // == From File ==
    /// Reads and decodes a snapshot file.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            error!(path = %path.display(), "snapshot read failed: {}", e);
            CacheError::Io(e)
        })?;

        let snapshot = Self::decode(&bytes).map_err(|e| {
            error!(path = %path.display(), "snapshot decode failed: {}", e);
            e
        })?;
        info!(path = %path.display(), size = snapshot.size, "snapshot loaded");
        Ok(snapshot)
    }
}

impl<V: Serialize> Memcache<V> {
    /// Captures a [`Snapshot`] of this cache.
    pub fn snapshot(&self) -> Result<Snapshot> {
        Snapshot::capture(self)
    }
}
