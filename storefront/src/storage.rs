//! Key/value persistence for client-side state (cart, customer drafts).
//!
//! Values are JSON strings. [`MemoryStorage`] keeps them in a map,
//! [`FileStorage`] writes one file per key under a directory and replaces it
//! atomically through a rename, so a crash mid-write leaves the previous value.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors from a [`Storage`] backend
#[derive(Error, Debug)]
pub enum StorageError {
    /// Filesystem failure
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Value could not be encoded or decoded
    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Future returned by [`Storage`] methods
pub type StorageFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StorageError>> + Send + 'a>>;

/// String key/value store
///
/// Uses explicit boxed futures so it can live behind `Arc<dyn Storage>` in
/// reducer environments.
pub trait Storage: Send + Sync {
    /// Value stored under `key`, if any
    fn load(&self, key: &str) -> StorageFuture<'_, Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    fn save(&self, key: &str, value: String) -> StorageFuture<'_, ()>;

    /// Delete `key`; missing keys are not an error
    fn remove(&self, key: &str) -> StorageFuture<'_, ()>;
}

// ============================================================================
// In-memory
// ============================================================================

/// Map-backed storage; clones share the same map
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    values: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStorage {
    /// Empty storage
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn load(&self, key: &str) -> StorageFuture<'_, Option<String>> {
        let key = key.to_string();
        Box::pin(async move { Ok(self.values.read().await.get(&key).cloned()) })
    }

    fn save(&self, key: &str, value: String) -> StorageFuture<'_, ()> {
        let key = key.to_string();
        Box::pin(async move {
            self.values.write().await.insert(key, value);
            Ok(())
        })
    }

    fn remove(&self, key: &str) -> StorageFuture<'_, ()> {
        let key = key.to_string();
        Box::pin(async move {
            self.values.write().await.remove(&key);
            Ok(())
        })
    }
}

// ============================================================================
// Filesystem
// ============================================================================

/// One `<key>.json` file per key under `dir`
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Storage rooted at `dir` (created on first write)
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Root directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File for `key`; anything but `[A-Za-z0-9_-]` becomes `_`
    fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{name}.json"))
    }
}

impl Storage for FileStorage {
    fn load(&self, key: &str) -> StorageFuture<'_, Option<String>> {
        let path = self.path_for(key);
        Box::pin(async move {
            match tokio::fs::read_to_string(&path).await {
                Ok(value) => Ok(Some(value)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    fn save(&self, key: &str, value: String) -> StorageFuture<'_, ()> {
        let path = self.path_for(key);
        Box::pin(async move {
            tokio::fs::create_dir_all(&self.dir).await?;
            let tmp = path.with_extension("json.tmp");
            tokio::fs::write(&tmp, value).await?;
            tokio::fs::rename(&tmp, &path).await?;
            Ok(())
        })
    }

    fn remove(&self, key: &str) -> StorageFuture<'_, ()> {
        let path = self.path_for(key);
        Box::pin(async move {
            match tokio::fs::remove_file(&path).await {
                Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
                _ => Ok(()),
            }
        })
    }
}
