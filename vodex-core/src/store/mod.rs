mod dir;
mod memory;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

pub use dir::DirStore;
pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("object {key} not found in store {store}")]
    NotFound { store: String, key: String },
    #[error("invalid object key: {key}")]
    InvalidKey { key: String },
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// One stored object as reported by a listing call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub key: String,
    pub size: u64,
}

/// A flat bucket of objects addressed by `/`-separated keys.
///
/// Listing comes in two shapes: `list_dir` is delimiter-style (one logical
/// entry per first path segment, directories carrying a trailing `/`), while
/// `list_prefix` enumerates every full key under a prefix.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    fn name(&self) -> &str;

    async fn list_dir(&self) -> StoreResult<Vec<String>>;

    async fn list_prefix(&self, prefix: &str) -> StoreResult<Vec<ObjectInfo>>;

    /// Copy `src_key` to `dst_key` within the store, preserving the object's
    /// access metadata.
    async fn copy(&self, src_key: &str, dst_key: &str) -> StoreResult<()>;

    async fn put_file(&self, key: &str, local: &Path) -> StoreResult<()>;

    /// Remove an object. Removing a key that is already absent is not an
    /// error.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Store-addressable URL for a key, in the store's URL scheme.
    fn url_for(&self, key: &str) -> String;
}

pub(crate) fn validate_key(key: &str) -> StoreResult<()> {
    let suspicious = key.is_empty()
        || key.starts_with('/')
        || key.split('/').any(|segment| segment == ".." || segment == ".");
    if suspicious {
        return Err(StoreError::InvalidKey {
            key: key.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_validation_rejects_traversal() {
        assert!(validate_key("abc.mp4/abc.mp4").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("/rooted").is_err());
        assert!(validate_key("a/../b").is_err());
        assert!(validate_key("./a").is_err());
    }
}
