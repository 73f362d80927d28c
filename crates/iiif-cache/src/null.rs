//! Cache that stores nothing

use crate::error::{CacheError, CacheResult};
use crate::Cache;
use async_trait::async_trait;

/// Accepts every write and forgets it
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCache;

#[async_trait]
impl Cache for NullCache {
    fn name(&self) -> &'static str {
        "null"
    }

    async fn exists(&self, _key: &str) -> bool {
        false
    }

    async fn get(&self, key: &str) -> CacheResult<Vec<u8>> {
        Err(CacheError::missing(key))
    }

    async fn set(&self, _key: &str, _body: Vec<u8>) -> CacheResult<()> {
        Ok(())
    }

    async fn unset(&self, _key: &str) -> CacheResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_are_discarded() {
        let cache = NullCache;

        cache.set("k", b"v".to_vec()).await.unwrap();
        assert!(!cache.exists("k").await);
        assert!(cache.get("k").await.unwrap_err().is_missing());
        assert!(cache.unset("k").await.is_ok());
    }
}
