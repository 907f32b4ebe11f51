//! Key-value store adapter
//!
//! All durable application data goes through the [`KeyValueStore`] trait:
//! string keys to string values, asynchronous, with no transactions and no
//! atomicity across keys. A crash between two related `set` calls can leave
//! the store partially updated; each repository owns a disjoint set of keys
//! so the blast radius of that is a single record.
//!
//! [`SharedStore`] wraps any implementation with a per-key lock table so
//! that read-modify-write cycles on the same key are serialized instead of
//! racing on "last write wins".

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard, RwLock};

/// Storage error types
#[derive(Debug, Error)]
pub enum StorageError {
    /// Sled database error
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),

    /// Underlying IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The backing store is out of space
    #[error("Storage quota exceeded")]
    QuotaExceeded,
}

/// Result type for key-value operations
pub type Result<T> = std::result::Result<T, StorageError>;

/// Asynchronous string-keyed store
///
/// Repositories depend on this trait, never on a concrete backend, so the
/// whole persistence layer can run against [`MemoryStore`] in tests.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Get the value stored under `key`
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, overwriting any prior value
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`, returning whether it existed
    async fn remove(&self, key: &str) -> Result<bool>;

    /// Remove several keys, returning how many existed
    ///
    /// Not atomic: a failure partway through leaves earlier keys removed.
    async fn remove_many(&self, keys: &[&str]) -> Result<usize> {
        let mut count = 0;
        for key in keys {
            if self.remove(key).await? {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Check whether `key` exists
    async fn contains(&self, key: &str) -> Result<bool>;

    /// Remove every key in the store
    async fn clear(&self) -> Result<()>;
}

/// Sled store configuration
#[derive(Debug, Clone)]
pub struct KvConfig {
    /// Database path
    pub path: String,
    /// Cache capacity in bytes
    pub cache_capacity: u64,
    /// Enable compression
    pub use_compression: bool,
    /// Flush interval in milliseconds (None for immediate flush)
    pub flush_every_ms: Option<u64>,
}

impl Default for KvConfig {
    fn default() -> Self {
        Self {
            path: "gita_kv.db".to_string(),
            cache_capacity: 16 * 1024 * 1024, // 16MB
            use_compression: true,
            flush_every_ms: Some(500),
        }
    }
}

impl KvConfig {
    /// Create a new configuration with a custom path
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into(), ..Default::default() }
    }

    /// Set cache capacity in bytes
    pub fn cache_capacity(mut self, bytes: u64) -> Self {
        self.cache_capacity = bytes;
        self
    }

    /// Enable or disable compression
    pub fn use_compression(mut self, enabled: bool) -> Self {
        self.use_compression = enabled;
        self
    }

    /// Set flush interval in milliseconds
    pub fn flush_every_ms(mut self, ms: Option<u64>) -> Self {
        self.flush_every_ms = ms;
        self
    }
}

/// Sled-backed key-value store
pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    /// Open a store with the given configuration
    pub fn new(config: KvConfig) -> Result<Self> {
        let mut db_config = sled::Config::new()
            .path(&config.path)
            .cache_capacity(config.cache_capacity)
            .use_compression(config.use_compression);

        if let Some(ms) = config.flush_every_ms {
            db_config = db_config.flush_every_ms(Some(ms));
        }

        let db = db_config.open()?;
        tracing::debug!(path = %config.path, "opened key-value store");

        Ok(Self { db })
    }

    /// Create a temporary in-memory store (for testing)
    pub fn in_memory() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    /// Flush pending writes to disk
    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for SledStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        match self.db.get(key.as_bytes())? {
            Some(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.db.insert(key.as_bytes(), value.as_bytes())?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        Ok(self.db.remove(key.as_bytes())?.is_some())
    }

    async fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.db.contains_key(key.as_bytes())?)
    }

    async fn clear(&self) -> Result<()> {
        self.db.clear()?;
        Ok(())
    }
}

/// In-memory store for unit tests
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        Ok(self.entries.write().await.remove(key).is_some())
    }

    async fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.entries.read().await.contains_key(key))
    }

    async fn clear(&self) -> Result<()> {
        self.entries.write().await.clear();
        Ok(())
    }
}

/// Cloneable store handle with per-key locking
///
/// The underlying trait offers no compare-and-swap, so two overlapping
/// read-modify-write cycles on the same key would silently drop one write.
/// Callers that mutate a record in place take [`SharedStore::lock`] for its
/// key around the load/save pair; plain reads and whole-record overwrites
/// go straight through.
#[derive(Clone)]
pub struct SharedStore {
    inner: Arc<dyn KeyValueStore>,
    locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl SharedStore {
    /// Wrap a store implementation
    pub fn new(inner: Arc<dyn KeyValueStore>) -> Self {
        Self {
            inner,
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Shared handle over a fresh in-memory store (for testing)
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Acquire the mutation lock for `key`
    ///
    /// Hold the returned guard across the whole read-modify-write cycle.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock();
            locks
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Get the value stored under `key`
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key).await
    }

    /// Store `value` under `key`
    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.inner.set(key, value).await
    }

    /// Remove `key`, returning whether it existed
    pub async fn remove(&self, key: &str) -> Result<bool> {
        self.inner.remove(key).await
    }

    /// Remove several keys, returning how many existed
    pub async fn remove_many(&self, keys: &[&str]) -> Result<usize> {
        self.inner.remove_many(keys).await
    }

    /// Check whether `key` exists
    pub async fn contains(&self, key: &str) -> Result<bool> {
        self.inner.contains(key).await
    }

    /// Remove every key in the store
    pub async fn clear(&self) -> Result<()> {
        self.inner.clear().await
    }
}
