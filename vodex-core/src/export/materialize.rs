use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::library::MediaLibrary;
use crate::store::ObjectStore;

use super::error::ExportResult;

/// Objects still being written by an uploader carry this suffix; they are
/// never a valid source.
pub const PARTIAL_UPLOAD_SUFFIX: &str = ".part";

/// Container extensions the library's downloader is known to produce.
pub const ACCEPTED_CONTAINERS: [&str; 2] = ["flv", "mp4"];

/// Get-or-create the raw source object for a content id.
///
/// Returns the store URL of a complete source object, or `None` when the
/// library has no media for the id (the caller records the id as errored and
/// moves on). Any media fetched to local scratch is removed on every exit
/// path, and a failed upload never leaves a half-written object behind.
pub async fn get_or_create_source(
    store: &dyn ObjectStore,
    library: &dyn MediaLibrary,
    content_id: &str,
) -> ExportResult<Option<String>> {
    let mut matches: Vec<String> = store
        .list_prefix(content_id)
        .await?
        .into_iter()
        .map(|object| object.key)
        .filter(|key| !key.ends_with(PARTIAL_UPLOAD_SUFFIX))
        .collect();

    if !matches.is_empty() {
        matches.sort();
        if matches.len() > 1 {
            warn!(
                content_id,
                candidates = matches.len(),
                "more than one unconverted source object; using the smallest key"
            );
        }
        return Ok(Some(store.url_for(&matches[0])));
    }

    info!(content_id, "unconverted source not on the store yet; fetching from the library");
    let Some(path) = library.fetch(content_id).await? else {
        warn!(content_id, "library produced no media");
        return Ok(None);
    };
    let scratch = ScratchFile::new(path);

    let extension = scratch
        .path()
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default()
        .to_string();
    if !ACCEPTED_CONTAINERS.contains(&extension.as_str()) {
        warn!(
            content_id,
            extension = %extension,
            "unrecognized container extension on fetched media"
        );
    }

    let key = format!("{content_id}/{content_id}.{extension}");
    if let Err(err) = store.put_file(&key, scratch.path()).await {
        // never leave a half-written source object behind
        if let Err(cleanup) = store.delete(&key).await {
            warn!(key = %key, error = %cleanup, "failed to remove partial upload");
        }
        return Err(err.into());
    }
    Ok(Some(store.url_for(&key)))
}

/// Local media artifact removed when it goes out of scope.
struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "removed scratch media"),
            Err(err) => warn!(
                path = %self.path.display(),
                error = %err,
                "failed to remove scratch media"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::LibraryResult;
    use crate::store::{MemoryStore, ObjectInfo, StoreError, StoreResult};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct FakeLibrary {
        media: Mutex<Option<PathBuf>>,
        fetches: Mutex<usize>,
    }

    impl FakeLibrary {
        fn with_media(path: Option<PathBuf>) -> Self {
            Self {
                media: Mutex::new(path),
                fetches: Mutex::new(0),
            }
        }

        fn fetch_count(&self) -> usize {
            *self.fetches.lock().unwrap()
        }
    }

    #[async_trait]
    impl MediaLibrary for FakeLibrary {
        async fn list_video_ids(&self) -> LibraryResult<Vec<String>> {
            Ok(Vec::new())
        }

        async fn fetch(&self, _content_id: &str) -> LibraryResult<Option<PathBuf>> {
            *self.fetches.lock().unwrap() += 1;
            Ok(self.media.lock().unwrap().take())
        }
    }

    fn scratch_media(dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, b"video").unwrap();
        path
    }

    #[tokio::test]
    async fn existing_source_is_reused_without_fetching() {
        let store = MemoryStore::new("unconverted");
        store.insert("abc/abc.mp4", b"video".to_vec());
        let library = FakeLibrary::with_media(None);

        let url = get_or_create_source(&store, &library, "abc").await.unwrap();
        assert_eq!(url, Some("store://unconverted/abc/abc.mp4".to_string()));
        assert_eq!(library.fetch_count(), 0);
    }

    #[tokio::test]
    async fn partial_uploads_are_never_a_source() {
        let store = MemoryStore::new("unconverted");
        store.insert("abc/abc.mp4.part", b"partial".to_vec());
        let temp = TempDir::new().unwrap();
        let library = FakeLibrary::with_media(Some(scratch_media(&temp, "abc.mp4")));

        let url = get_or_create_source(&store, &library, "abc").await.unwrap();
        assert_eq!(url, Some("store://unconverted/abc/abc.mp4".to_string()));
        assert_eq!(library.fetch_count(), 1);
        assert!(store.contains("abc/abc.mp4"));
    }

    #[tokio::test]
    async fn ambiguous_sources_pick_the_smallest_key() {
        let store = MemoryStore::new("unconverted");
        store.insert("dup1/dup1.mp4", b"video".to_vec());
        store.insert("dup1/dup1.flv", b"video".to_vec());
        let library = FakeLibrary::with_media(None);

        let url = get_or_create_source(&store, &library, "dup1").await.unwrap();
        assert_eq!(url, Some("store://unconverted/dup1/dup1.flv".to_string()));
    }

    #[tokio::test]
    async fn missing_media_returns_none() {
        let store = MemoryStore::new("unconverted");
        let library = FakeLibrary::with_media(None);

        let url = get_or_create_source(&store, &library, "missing1")
            .await
            .unwrap();
        assert_eq!(url, None);
    }

    #[tokio::test]
    async fn fetched_media_is_uploaded_and_scratch_removed() {
        let store = MemoryStore::new("unconverted");
        let temp = TempDir::new().unwrap();
        let media = scratch_media(&temp, "abc.mp4");
        let library = FakeLibrary::with_media(Some(media.clone()));

        let url = get_or_create_source(&store, &library, "abc").await.unwrap();
        assert_eq!(url, Some("store://unconverted/abc/abc.mp4".to_string()));
        assert!(store.contains("abc/abc.mp4"));
        assert!(!media.exists());
    }

    #[tokio::test]
    async fn unknown_container_uploads_anyway() {
        let store = MemoryStore::new("unconverted");
        let temp = TempDir::new().unwrap();
        let library = FakeLibrary::with_media(Some(scratch_media(&temp, "abc.webm")));

        let url = get_or_create_source(&store, &library, "abc").await.unwrap();
        assert_eq!(url, Some("store://unconverted/abc/abc.webm".to_string()));
    }

    /// Store whose uploads always fail, recording the delete that follows.
    struct FailingStore {
        inner: MemoryStore,
        deletes: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ObjectStore for FailingStore {
        fn name(&self) -> &str {
            self.inner.name()
        }
        async fn list_dir(&self) -> StoreResult<Vec<String>> {
            self.inner.list_dir().await
        }
        async fn list_prefix(&self, prefix: &str) -> StoreResult<Vec<ObjectInfo>> {
            self.inner.list_prefix(prefix).await
        }
        async fn copy(&self, src: &str, dst: &str) -> StoreResult<()> {
            self.inner.copy(src, dst).await
        }
        async fn put_file(&self, key: &str, _local: &std::path::Path) -> StoreResult<()> {
            Err(StoreError::Io {
                path: PathBuf::from(key),
                source: std::io::Error::other("upload interrupted"),
            })
        }
        async fn delete(&self, key: &str) -> StoreResult<()> {
            self.deletes.lock().unwrap().push(key.to_string());
            self.inner.delete(key).await
        }
        fn url_for(&self, key: &str) -> String {
            self.inner.url_for(key)
        }
    }

    #[tokio::test]
    async fn failed_upload_cleans_up_destination_and_scratch() {
        let store = FailingStore {
            inner: MemoryStore::new("unconverted"),
            deletes: Mutex::new(Vec::new()),
        };
        let temp = TempDir::new().unwrap();
        let media = scratch_media(&temp, "abc.mp4");
        let library = FakeLibrary::with_media(Some(media.clone()));

        let err = get_or_create_source(&store, &library, "abc").await;
        assert!(err.is_err());
        assert_eq!(store.deletes.lock().unwrap().as_slice(), ["abc/abc.mp4"]);
        assert!(!media.exists());
    }
}
