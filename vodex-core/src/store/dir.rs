use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use walkdir::WalkDir;

use super::{validate_key, ObjectInfo, ObjectStore, StoreError, StoreResult};

/// Object store backed by a directory tree. Keys map to file paths relative
/// to the root; `copy` goes through `fs::copy`, which carries permission bits
/// along with the contents.
#[derive(Debug, Clone)]
pub struct DirStore {
    name: String,
    root: PathBuf,
    url_scheme: String,
}

impl DirStore {
    pub fn new(
        name: impl Into<String>,
        root: impl Into<PathBuf>,
        url_scheme: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            url_scheme: url_scheme.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, key: &str) -> StoreResult<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }

    fn io_error(&self, path: &Path, source: io::Error) -> StoreError {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[async_trait]
impl ObjectStore for DirStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_dir(&self) -> StoreResult<Vec<String>> {
        let mut entries = Vec::new();
        let mut reader = fs::read_dir(&self.root)
            .await
            .map_err(|source| self.io_error(&self.root, source))?;
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|source| self.io_error(&self.root, source))?
        {
            let mut name = entry.file_name().to_string_lossy().into_owned();
            let file_type = entry
                .file_type()
                .await
                .map_err(|source| self.io_error(&entry.path(), source))?;
            if file_type.is_dir() {
                name.push('/');
            }
            entries.push(name);
        }
        entries.sort();
        Ok(entries)
    }

    async fn list_prefix(&self, prefix: &str) -> StoreResult<Vec<ObjectInfo>> {
        let mut objects = Vec::new();
        if !self.root.exists() {
            return Ok(objects);
        }
        for entry in WalkDir::new(&self.root) {
            let entry = entry.map_err(|source| StoreError::Io {
                path: self.root.clone(),
                source: source.into(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(&self.root)
                .unwrap_or(entry.path());
            let key = relative.to_string_lossy().into_owned();
            if !key.starts_with(prefix) {
                continue;
            }
            let size = entry
                .metadata()
                .map_err(|source| StoreError::Io {
                    path: entry.path().to_path_buf(),
                    source: source.into(),
                })?
                .len();
            objects.push(ObjectInfo { key, size });
        }
        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    async fn copy(&self, src_key: &str, dst_key: &str) -> StoreResult<()> {
        let src = self.object_path(src_key)?;
        let dst = self.object_path(dst_key)?;
        if !src.exists() {
            return Err(StoreError::NotFound {
                store: self.name.clone(),
                key: src_key.to_string(),
            });
        }
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| self.io_error(parent, source))?;
        }
        fs::copy(&src, &dst)
            .await
            .map_err(|source| self.io_error(&dst, source))?;
        Ok(())
    }

    async fn put_file(&self, key: &str, local: &Path) -> StoreResult<()> {
        let dst = self.object_path(key)?;
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| self.io_error(parent, source))?;
        }
        fs::copy(local, &dst)
            .await
            .map_err(|source| self.io_error(&dst, source))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let path = self.object_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(source) if source.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(self.io_error(&path, source)),
        }
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}://{}/{}", self.url_scheme, self.name, key)
    }
}
