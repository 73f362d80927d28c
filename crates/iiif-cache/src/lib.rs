//! IIIF Cache
//!
//! Byte-oriented key/value stores for derivative images and process reports.
//!
//! # Backends
//!
//! - [`MemoryCache`]: in-process, bounded, optional TTL (moka)
//! - [`DiskCache`]: files under a root directory
//! - [`NullCache`]: accepts writes, stores nothing
//!
//! A cache is a process-scoped handle: build it once with
//! [`cache_from_config`] and share the returned `Arc` with every consumer.
//!
//! # Example
//!
//! ```rust,ignore
//! use iiif_cache::{cache_from_config, CacheConfig};
//!
//! let cache = cache_from_config(&CacheConfig::memory(1_000))?;
//! cache.set("avocado.png/process.json", body).await?;
//! assert!(cache.exists("avocado.png/process.json").await);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod disk;
pub mod error;
pub mod memory;
pub mod null;

pub use config::CacheConfig;
pub use disk::DiskCache;
pub use error::{CacheError, CacheResult};
pub use memory::{CacheStats, MemoryCache};
pub use null::NullCache;

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

/// Byte-oriented cache keyed by string path
#[async_trait]
pub trait Cache: Send + Sync + Debug {
    /// Backend name, as used in [`CacheConfig::name`]
    fn name(&self) -> &'static str;

    /// Check whether something is stored under `key`
    async fn exists(&self, key: &str) -> bool;

    /// Fetch the bytes stored under `key`
    ///
    /// # Errors
    /// - `CacheError::Missing` if nothing is stored
    async fn get(&self, key: &str) -> CacheResult<Vec<u8>>;

    /// Store `body` under `key`, replacing any previous value
    async fn set(&self, key: &str, body: Vec<u8>) -> CacheResult<()>;

    /// Remove whatever is stored under `key`
    async fn unset(&self, key: &str) -> CacheResult<()>;
}

/// Build a cache from configuration
///
/// `memory` and `disk` select their backends; any other name yields a
/// [`NullCache`].
///
/// # Errors
/// - `CacheError::InvalidConfig` if a disk cache has no path
pub fn cache_from_config(config: &CacheConfig) -> CacheResult<Arc<dyn Cache>> {
    let cache: Arc<dyn Cache> = match config.name.to_lowercase().as_str() {
        "memory" => Arc::new(MemoryCache::from_config(config)),
        "disk" => {
            let root = config.path.clone().ok_or_else(|| {
                CacheError::InvalidConfig("disk cache requires a path".to_string())
            })?;
            Arc::new(DiskCache::new(root))
        }
        other => {
            tracing::debug!(name = other, "unrecognised cache name, using null cache");
            Arc::new(NullCache)
        }
    };

    Ok(cache)
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_selects_backend_by_name() {
        let memory = cache_from_config(&CacheConfig::memory(10)).unwrap();
        assert_eq!(memory.name(), "memory");

        let disk = cache_from_config(&CacheConfig::disk("/tmp/derivatives")).unwrap();
        assert_eq!(disk.name(), "disk");

        let null = cache_from_config(&CacheConfig::named("s3")).unwrap();
        assert_eq!(null.name(), "null");
    }

    #[test]
    fn factory_name_is_case_insensitive() {
        let cache = cache_from_config(&CacheConfig::named("Memory")).unwrap();
        assert_eq!(cache.name(), "memory");
    }

    #[test]
    fn disk_without_path_is_rejected() {
        let result = cache_from_config(&CacheConfig::named("disk"));
        assert!(matches!(result, Err(CacheError::InvalidConfig(_))));
    }
}
