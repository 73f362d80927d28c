//! In-process byte cache using moka
//!
//! Provides a high-performance, concurrent, bounded store for derivative
//! bytes and process reports.

use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};
use crate::Cache;
use async_trait::async_trait;
use moka::future::Cache as MokaCache;
use std::sync::Arc;
use std::time::Duration;

/// Statistics for cache performance monitoring
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    /// Number of entries in cache
    pub entry_count: u64,
}

/// In-memory cache
///
/// Cloning yields another handle onto the same store.
#[derive(Debug, Clone)]
pub struct MemoryCache {
    inner: MokaCache<String, Arc<[u8]>>,
}

impl MemoryCache {
    /// Create new cache with max capacity
    #[inline]
    #[must_use]
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: MokaCache::new(max_capacity),
        }
    }

    /// Create cache with time-based expiration
    #[inline]
    #[must_use]
    pub fn with_ttl(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: MokaCache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Create cache from configuration
    #[must_use]
    pub fn from_config(config: &CacheConfig) -> Self {
        match config.ttl() {
            Some(ttl) => Self::with_ttl(config.max_capacity, ttl),
            None => Self::new(config.max_capacity),
        }
    }

    /// Get cache statistics
    ///
    /// Counts are eventually consistent with recent writes.
    #[inline]
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.inner.entry_count(),
        }
    }
}

impl Default for MemoryCache {
    /// Create cache with default capacity (10,000 entries)
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[async_trait]
impl Cache for MemoryCache {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn exists(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    async fn get(&self, key: &str) -> CacheResult<Vec<u8>> {
        self.inner
            .get(key)
            .await
            .map(|body| body.to_vec())
            .ok_or_else(|| CacheError::missing(key))
    }

    async fn set(&self, key: &str, body: Vec<u8>) -> CacheResult<()> {
        self.inner.insert(key.to_string(), Arc::from(body)).await;
        Ok(())
    }

    async fn unset(&self, key: &str) -> CacheResult<()> {
        self.inner
            .remove(key)
            .await
            .map(|_| ())
            .ok_or_else(|| CacheError::missing(key))
    }
}
