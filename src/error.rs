//! Error types for the cache
//!
//! Provides unified error handling using thiserror. Only snapshot encoding,
//! decoding and file I/O can fail; cache operations themselves never return
//! errors.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Snapshot blob does not start with the expected magic bytes
    #[error("Not a snapshot: bad magic bytes")]
    BadMagic,

    /// Snapshot blob was written by an incompatible format revision
    #[error("Unsupported snapshot format {found} (expected {expected})")]
    UnsupportedFormat { found: u8, expected: u8 },

    /// Snapshot bytes are corrupt, truncated, or describe an invalid cache
    #[error("Snapshot decode failed: {0}")]
    Decode(String),

    /// A value or record could not be serialized
    #[error("Snapshot encode failed: {0}")]
    Encode(String),

    /// Snapshot persist or load failed at the storage boundary
    #[error("Snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl CacheError {
    /// True for every variant that means "these bytes are not a usable snapshot".
    pub fn is_decode(&self) -> bool {
        matches!(
            self,
            CacheError::BadMagic | CacheError::UnsupportedFormat { .. } | CacheError::Decode(_)
        )
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CacheError::UnsupportedFormat {
            found: 9,
            expected: 1,
        };
        assert_eq!(err.to_string(), "Unsupported snapshot format 9 (expected 1)");
        assert!(err.is_decode());
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: CacheError = io.into();
        assert!(matches!(err, CacheError::Io(_)));
        assert!(!err.is_decode());
    }
}
