//! Cache configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for a single cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Backend name: `memory`, `disk`, anything else is a null cache
    pub name: String,
    /// Root directory (disk only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Time-to-live in seconds (memory only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_secs: Option<u64>,
    /// Maximum number of entries (memory only)
    #[serde(default = "default_capacity")]
    pub max_capacity: u64,
}

fn default_capacity() -> u64 {
    10_000
}

impl CacheConfig {
    /// Config for a backend by name, other fields defaulted
    #[inline]
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: None,
            ttl_secs: None,
            max_capacity: default_capacity(),
        }
    }

    /// In-memory cache with capacity
    #[inline]
    #[must_use]
    pub fn memory(max_capacity: u64) -> Self {
        Self {
            max_capacity,
            ..Self::named("memory")
        }
    }

    /// Disk cache rooted at `path`
    #[inline]
    #[must_use]
    pub fn disk(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::named("disk")
        }
    }

    /// With time-to-live
    #[inline]
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl_secs = Some(ttl.as_secs());
        self
    }

    /// Configured TTL, if any
    #[inline]
    #[must_use]
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_secs.map(Duration::from_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::memory(default_capacity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_minimal_json() {
        let config: CacheConfig =
            serde_json::from_str(r#"{"name": "disk", "path": "/var/cache/iiif"}"#).unwrap();
        assert_eq!(config.name, "disk");
        assert_eq!(config.path, Some(PathBuf::from("/var/cache/iiif")));
        assert_eq!(config.max_capacity, 10_000);
        assert_eq!(config.ttl(), None);
    }

    #[test]
    fn ttl_builder() {
        let config = CacheConfig::memory(5).with_ttl(Duration::from_secs(60));
        assert_eq!(config.ttl(), Some(Duration::from_secs(60)));
        assert_eq!(config.max_capacity, 5);
    }
}
