//! Filesystem-backed cache
//!
//! Keys are relative paths under a root directory.

use crate::error::{CacheError, CacheResult};
use crate::Cache;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

/// Cache storing one file per key under `root`
#[derive(Debug, Clone)]
pub struct DiskCache {
    root: PathBuf,
}

impl DiskCache {
    /// Create cache rooted at `root`
    ///
    /// The directory is created lazily on first write.
    #[inline]
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Map a key onto a path below the root
    ///
    /// # Errors
    /// - `CacheError::InvalidKey` for empty, absolute or escaping keys
    pub fn path_for(&self, key: &str) -> CacheResult<PathBuf> {
        let invalid = |reason| CacheError::InvalidKey {
            key: key.to_string(),
            reason,
        };

        let relative = Path::new(key.trim_start_matches('/'));
        if relative.as_os_str().is_empty() {
            return Err(invalid("empty key"));
        }

        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                Component::ParentDir => return Err(invalid("key escapes cache root")),
                Component::RootDir | Component::Prefix(_) => {
                    return Err(invalid("key must be relative"))
                }
            }
        }

        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl Cache for DiskCache {
    fn name(&self) -> &'static str {
        "disk"
    }

    async fn exists(&self, key: &str) -> bool {
        match self.path_for(key) {
            Ok(path) => tokio::fs::metadata(&path)
                .await
                .map(|m| m.is_file())
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn get(&self, key: &str) -> CacheResult<Vec<u8>> {
        let path = self.path_for(key)?;
        tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => CacheError::missing(key),
            _ => CacheError::io(path, e),
        })
    }

    async fn set(&self, key: &str, body: Vec<u8>) -> CacheResult<()> {
        let path = self.path_for(key)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CacheError::io(parent, e))?;
        }

        tokio::fs::write(&path, body)
            .await
            .map_err(|e| CacheError::io(&path, e))?;

        tracing::trace!(key, path = %path.display(), "cache write");
        Ok(())
    }

    async fn unset(&self, key: &str) -> CacheResult<()> {
        let path = self.path_for(key)?;
        tokio::fs::remove_file(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => CacheError::missing(key),
            _ => CacheError::io(path, e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_creates_nested_directories() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path());

        cache
            .set("avocado.png/process.json", b"{\"uris\":{}}".to_vec())
            .await
            .unwrap();

        assert!(dir.path().join("avocado.png").is_dir());
        assert!(cache.exists("avocado.png/process.json").await);
        assert_eq!(
            cache.get("avocado.png/process.json").await.unwrap(),
            b"{\"uris\":{}}"
        );
    }

    #[tokio::test]
    async fn get_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path());

        let err = cache.get("nope.json").await.unwrap_err();
        assert!(err.is_missing());
    }

    #[tokio::test]
    async fn unset_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path());

        cache.set("a/b.json", b"x".to_vec()).await.unwrap();
        cache.unset("a/b.json").await.unwrap();

        assert!(!cache.exists("a/b.json").await);
        assert!(cache.unset("a/b.json").await.unwrap_err().is_missing());
    }

    #[test]
    fn leading_slash_is_relative_to_root() {
        let cache = DiskCache::new("/srv/cache");
        assert_eq!(
            cache.path_for("/avocado.png/process.json").unwrap(),
            PathBuf::from("/srv/cache/avocado.png/process.json")
        );
    }

    #[test]
    fn rejects_escaping_keys() {
        let cache = DiskCache::new("/srv/cache");

        assert!(matches!(
            cache.path_for("../etc/passwd"),
            Err(CacheError::InvalidKey { .. })
        ));
        assert!(matches!(
            cache.path_for(""),
            Err(CacheError::InvalidKey { .. })
        ));
    }

    #[tokio::test]
    async fn exists_is_false_for_invalid_key() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path());

        assert!(!cache.exists("../outside").await);
    }
}
