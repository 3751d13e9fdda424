//! String-keyed local persistence and the order cache built on top of it.

#[cfg(test)]
mod memory;
pub mod order_cache;

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use crate::error::StorageError;

#[cfg(test)]
pub use memory::MemoryStore;
pub use order_cache::*;

/// Site-scoped string storage. Reads never fail: anything unreadable is
/// reported as absent.
#[async_trait]
pub trait KeyValueStore: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Option<String>;
    async fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// One `<key>.json` file per entry under a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Option<String> {
        let path = self.path_for(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(raw) => Some(raw),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "No stored value");
                None
            }
        }
    }

    async fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        let write_err = |e: std::io::Error| StorageError::Write {
            key: key.to_string(),
            reason: e.to_string(),
        };
        tokio::fs::create_dir_all(&self.dir).await.map_err(write_err)?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, value).await.map_err(write_err)?;
        tokio::fs::rename(&tmp, &path).await.map_err(write_err)
    }
}
