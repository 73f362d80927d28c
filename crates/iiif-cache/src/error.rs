//! Error types for cache backends

use std::path::PathBuf;

/// Errors raised by [`Cache`](crate::Cache) implementations
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Nothing is stored under the key
    #[error("cache miss for {key}")]
    Missing { key: String },

    /// Key cannot be mapped onto the backend
    #[error("invalid cache key {key:?}: {reason}")]
    InvalidKey { key: String, reason: &'static str },

    /// IO error in a filesystem-backed cache
    #[error("io error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Cache could not be built from its configuration
    #[error("invalid cache configuration: {0}")]
    InvalidConfig(String),
}

impl CacheError {
    /// Create a miss for `key`
    #[inline]
    pub fn missing(key: impl Into<String>) -> Self {
        Self::Missing { key: key.into() }
    }

    /// Create IO error for path
    #[inline]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Check if the error is a plain miss
    #[inline]
    #[must_use]
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing { .. })
    }
}

/// Result alias for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_display_names_key() {
        let err = CacheError::missing("avocado.png/process.json");
        assert!(err.to_string().contains("avocado.png/process.json"));
        assert!(err.is_missing());
    }

    #[test]
    fn io_error_is_not_missing() {
        let err = CacheError::io(
            "/tmp/x",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(!err.is_missing());
        assert!(err.to_string().contains("/tmp/x"));
    }
}
