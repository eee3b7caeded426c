use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::fs;

use super::{validate_key, ObjectInfo, ObjectStore, StoreError, StoreResult};

/// In-memory object store. Backs unit tests and local dry experiments where
/// touching the filesystem is unwanted.
#[derive(Debug)]
pub struct MemoryStore {
    name: String,
    url_scheme: String,
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url_scheme: "store".to_string(),
            objects: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn insert(&self, key: impl Into<String>, contents: impl Into<Vec<u8>>) {
        self.objects
            .lock()
            .expect("memory store mutex poisoned")
            .insert(key.into(), contents.into());
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects
            .lock()
            .expect("memory store mutex poisoned")
            .keys()
            .cloned()
            .collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects
            .lock()
            .expect("memory store mutex poisoned")
            .contains_key(key)
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_dir(&self) -> StoreResult<Vec<String>> {
        let objects = self.objects.lock().expect("memory store mutex poisoned");
        let mut entries: Vec<String> = Vec::new();
        for key in objects.keys() {
            let entry = match key.split_once('/') {
                Some((first, _)) => format!("{first}/"),
                None => key.clone(),
            };
            if entries.last() != Some(&entry) {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    async fn list_prefix(&self, prefix: &str) -> StoreResult<Vec<ObjectInfo>> {
        let objects = self.objects.lock().expect("memory store mutex poisoned");
        Ok(objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, contents)| ObjectInfo {
                key: key.clone(),
                size: contents.len() as u64,
            })
            .collect())
    }

    async fn copy(&self, src_key: &str, dst_key: &str) -> StoreResult<()> {
        validate_key(src_key)?;
        validate_key(dst_key)?;
        let mut objects = self.objects.lock().expect("memory store mutex poisoned");
        let contents = objects
            .get(src_key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                store: self.name.clone(),
                key: src_key.to_string(),
            })?;
        objects.insert(dst_key.to_string(), contents);
        Ok(())
    }

    async fn put_file(&self, key: &str, local: &Path) -> StoreResult<()> {
        validate_key(key)?;
        let contents = fs::read(local).await.map_err(|source| StoreError::Io {
            path: local.to_path_buf(),
            source,
        })?;
        self.insert(key, contents);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        validate_key(key)?;
        self.objects
            .lock()
            .expect("memory store mutex poisoned")
            .remove(key);
        Ok(())
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}://{}/{}", self.url_scheme, self.name, key)
    }
}
