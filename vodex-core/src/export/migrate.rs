use tracing::info;

use crate::store::ObjectStore;

use super::error::{ExportError, ExportResult};
use super::key::{parse_key, ParsedKey};

/// Legacy content is always an mp4 plus its companion image, so migrated
/// objects land under the id's mp4 subtree. Fixed policy, not a generic
/// rename.
pub const LEGACY_TARGET_FORMAT: &str = "mp4";

/// Copy every object under a legacy id's prefix to canonical naming,
/// preserving access metadata. Idempotent: destination keys are a pure
/// function of the source keys, so re-running overwrites the same set.
///
/// Returns the number of objects copied. A listed key that does not belong
/// to `content_id` is a listing we cannot trust, and aborts the run.
pub async fn migrate_legacy(store: &dyn ObjectStore, content_id: &str) -> ExportResult<usize> {
    let prefix = format!("{content_id}/");
    let mut copied = 0usize;
    for object in store.list_prefix(&prefix).await? {
        let owned_by_id = matches!(
            parse_key(&object.key),
            ParsedKey::Legacy { id } if id == content_id
        );
        if !owned_by_id {
            return Err(ExportError::MigrationInvariant {
                key: object.key,
                expected_id: content_id.to_string(),
            });
        }
        let rest = match object.key.strip_prefix(&prefix) {
            Some(rest) => rest,
            None => {
                return Err(ExportError::MigrationInvariant {
                    key: object.key,
                    expected_id: content_id.to_string(),
                })
            }
        };
        let dest = format!("{content_id}.{LEGACY_TARGET_FORMAT}/{rest}");
        info!(src = %object.key, dest = %dest, "copying legacy object to canonical location");
        store.copy(&object.key, &dest).await?;
        copied += 1;
    }
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, ObjectInfo, StoreResult};
    use async_trait::async_trait;
    use std::path::Path;

    #[tokio::test]
    async fn migrates_mp4_and_companion_image() {
        let store = MemoryStore::new("converted");
        store.insert("old1/old1.mp4", b"video".to_vec());
        store.insert("old1/old1.png", b"image".to_vec());

        let copied = migrate_legacy(&store, "old1").await.unwrap();
        assert_eq!(copied, 2);
        assert!(store.contains("old1.mp4/old1.mp4"));
        assert!(store.contains("old1.mp4/old1.png"));
        // originals are left in place
        assert!(store.contains("old1/old1.mp4"));
    }

    #[tokio::test]
    async fn migration_is_idempotent() {
        let store = MemoryStore::new("converted");
        store.insert("old1/old1.mp4", b"video".to_vec());

        migrate_legacy(&store, "old1").await.unwrap();
        let after_first = store.keys();
        migrate_legacy(&store, "old1").await.unwrap();
        assert_eq!(store.keys(), after_first);
    }

    #[tokio::test]
    async fn does_not_touch_other_ids() {
        let store = MemoryStore::new("converted");
        store.insert("old1/old1.mp4", b"video".to_vec());
        store.insert("old2/old2.mp4", b"video".to_vec());

        migrate_legacy(&store, "old1").await.unwrap();
        assert!(store.contains("old1.mp4/old1.mp4"));
        assert!(!store.contains("old2.mp4/old2.mp4"));
    }

    /// Store whose prefix listing returns a key outside the prefix, the way
    /// a broken backend would.
    struct LyingStore {
        inner: MemoryStore,
    }

    #[async_trait]
    impl crate::store::ObjectStore for LyingStore {
        fn name(&self) -> &str {
            self.inner.name()
        }
        async fn list_dir(&self) -> StoreResult<Vec<String>> {
            self.inner.list_dir().await
        }
        async fn list_prefix(&self, _prefix: &str) -> StoreResult<Vec<ObjectInfo>> {
            Ok(vec![ObjectInfo {
                key: "other2/other2.mp4".to_string(),
                size: 5,
            }])
        }
        async fn copy(&self, src: &str, dst: &str) -> StoreResult<()> {
            self.inner.copy(src, dst).await
        }
        async fn put_file(&self, key: &str, local: &Path) -> StoreResult<()> {
            self.inner.put_file(key, local).await
        }
        async fn delete(&self, key: &str) -> StoreResult<()> {
            self.inner.delete(key).await
        }
        fn url_for(&self, key: &str) -> String {
            self.inner.url_for(key)
        }
    }

    #[tokio::test]
    async fn foreign_key_in_listing_is_an_invariant_violation() {
        let store = LyingStore {
            inner: MemoryStore::new("converted"),
        };
        let err = migrate_legacy(&store, "old1").await.unwrap_err();
        assert!(matches!(err, ExportError::MigrationInvariant { .. }));
    }
}
