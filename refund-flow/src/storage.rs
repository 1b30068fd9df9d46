use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Serialize, de::DeserializeOwned};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::Result;

/// String-keyed, string-valued store.
///
/// Two of these back the client: a persistent one and a session-scoped one.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: String) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Typed JSON access on top of any [`KeyValueStore`].
#[async_trait]
pub trait KeyValueStoreExt: KeyValueStore {
    /// Reads and decodes `key`. Undecodable values are logged and treated as absent.
    async fn get_json<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.get(key).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(key = %key, error = %e, "Ignoring unreadable stored value");
                Ok(None)
            }
        }
    }

    async fn set_json<T: Serialize + Sync>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.set(key, raw).await
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueStoreExt for S {}

/// In-memory implementation of KeyValueStore
#[derive(Clone, Default)]
pub struct InMemoryStore {
    data: Arc<DashMap<String, String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.data.get(key).map(|entry| entry.clone()))
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.data.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.data.remove(key);
        Ok(())
    }
}

/// KeyValueStore kept as a single JSON object on disk.
///
/// Every write rewrites the whole file through a temporary sibling and a rename.
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<BTreeMap<String, String>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice(&bytes) {
            Ok(map) => Ok(map),
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Store file is not a JSON object of strings, starting empty"
                );
                Ok(BTreeMap::new())
            }
        }
    }

    async fn persist(&self, map: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(map)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), keys = map.len(), "Store file written");
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(key))
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut map = self.load().await?;
        map.insert(key.to_string(), value);
        self.persist(&map).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut map = self.load().await?;
        if map.remove(key).is_some() {
            self.persist(&map).await?;
        }
        Ok(())
    }
}
