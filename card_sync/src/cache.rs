//! Volatile cache tier
//!
//! `CacheBackend` is the get/set/delete/exists/clear contract of the external
//! volatile cache. `VolatileCache` wraps a backend, connects lazily on first
//! use and fails open: backend errors are logged and every operation degrades
//! to a miss or a no-op. The cache only ever accelerates, it never fails a
//! request.

use crate::cache_keys::{matches_pattern, now_ms, CacheEntry, CacheKey, CacheTtls};
use crate::error::SyncResult;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};

/// Contract of the volatile cache collaborator
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> SyncResult<Option<CacheEntry<Value>>>;
    async fn set(&self, key: &str, entry: CacheEntry<Value>) -> SyncResult<()>;
    async fn delete(&self, key: &str) -> SyncResult<bool>;
    async fn exists(&self, key: &str) -> SyncResult<bool>;
    /// Remove every key matching a `*` glob, returning how many were removed
    async fn clear(&self, pattern: &str) -> SyncResult<usize>;
}

/// Establishes the backend connection on first use
#[async_trait]
pub trait CacheConnector: Send + Sync {
    async fn connect(&self) -> SyncResult<Arc<dyn CacheBackend>>;
}

/// Connector for a backend that is already available
struct Ready(Arc<dyn CacheBackend>);

#[async_trait]
impl CacheConnector for Ready {
    async fn connect(&self) -> SyncResult<Arc<dyn CacheBackend>> {
        Ok(Arc::clone(&self.0))
    }
}

/// In-process TTL cache backend.
///
/// Expired entries are misses on read and are evicted on every write.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CacheEntry<Value>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &str) -> SyncResult<Option<CacheEntry<Value>>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, entry: CacheEntry<Value>) -> SyncResult<()> {
        let now = now_ms();
        let mut entries = self.entries.write().await;
        entries.retain(|_, existing| !existing.is_expired_at(now));
        entries.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> SyncResult<bool> {
        Ok(self.entries.write().await.remove(key).is_some())
    }

    async fn exists(&self, key: &str) -> SyncResult<bool> {
        let now = now_ms();
        Ok(self
            .entries
            .read()
            .await
            .get(key)
            .is_some_and(|entry| !entry.is_expired_at(now)))
    }

    async fn clear(&self, pattern: &str) -> SyncResult<usize> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !matches_pattern(pattern, key));
        Ok(before - entries.len())
    }
}

/// A cache hit with the age of the entry
#[derive(Debug, Clone, PartialEq)]
pub struct Cached<T> {
    pub value: T,
    pub age_seconds: u64,
}

/// Fail-open, lazily connected client for the volatile cache
pub struct VolatileCache {
    connector: Option<Arc<dyn CacheConnector>>,
    backend: OnceCell<Option<Arc<dyn CacheBackend>>>,
    ttls: CacheTtls,
}

impl VolatileCache {
    /// Connect through `connector` on first use
    pub fn lazy(connector: Arc<dyn CacheConnector>, ttls: CacheTtls) -> Self {
        Self {
            connector: Some(connector),
            backend: OnceCell::new(),
            ttls,
        }
    }

    pub fn with_backend(backend: Arc<dyn CacheBackend>, ttls: CacheTtls) -> Self {
        Self::lazy(Arc::new(Ready(backend)), ttls)
    }

    /// A cache where every operation is a no-op
    pub fn disabled(ttls: CacheTtls) -> Self {
        Self {
            connector: None,
            backend: OnceCell::new(),
            ttls,
        }
    }

    pub fn ttls(&self) -> &CacheTtls {
        &self.ttls
    }

    /// A failed connect disables the cache for the rest of the process.
    async fn backend(&self) -> Option<&Arc<dyn CacheBackend>> {
        self.backend
            .get_or_init(|| async {
                let connector = self.connector.as_ref()?;
                match connector.connect().await {
                    Ok(backend) => {
                        log::info!("Volatile cache connected");
                        Some(backend)
                    }
                    Err(e) => {
                        log::warn!("Volatile cache unavailable, continuing without it: {}", e);
                        None
                    }
                }
            })
            .await
            .as_ref()
    }

    /// Read a value; expired, undecodable or unreachable entries are misses
    pub async fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<Cached<T>> {
        let backend = self.backend().await?;
        let key_str = key.to_string();

        let entry = match backend.get(&key_str).await {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                log::debug!("Cache miss for {}", key_str);
                return None;
            }
            Err(e) => {
                log::warn!("Cache read failed for {}: {}", key_str, e);
                return None;
            }
        };

        let now = now_ms();
        if entry.is_expired_at(now) {
            log::debug!("Cache entry expired for {}", key_str);
            return None;
        }

        match serde_json::from_value(entry.data.clone()) {
            Ok(value) => {
                log::debug!("Cache hit for {}", key_str);
                Some(Cached {
                    value,
                    age_seconds: entry.age_seconds(now),
                })
            }
            Err(e) => {
                log::warn!("Failed to decode cached value for {}: {}", key_str, e);
                None
            }
        }
    }

    /// Write a value with the TTL configured for the key's resource kind
    pub async fn set<T: Serialize>(&self, key: &CacheKey, value: &T) {
        let ttl = self.ttls.ttl_for(key.kind());
        self.set_with_ttl(key, value, ttl).await;
    }

    pub async fn set_with_ttl<T: Serialize>(&self, key: &CacheKey, value: &T, ttl_seconds: u64) {
        let Some(backend) = self.backend().await else {
            return;
        };
        let key_str = key.to_string();

        let data = match serde_json::to_value(value) {
            Ok(data) => data,
            Err(e) => {
                log::warn!("Failed to encode value for {}: {}", key_str, e);
                return;
            }
        };

        if let Err(e) = backend
            .set(&key_str, CacheEntry::new(data, ttl_seconds, now_ms()))
            .await
        {
            log::warn!("Cache write failed for {}: {}", key_str, e);
        }
    }

    pub async fn delete(&self, key: &CacheKey) {
        let Some(backend) = self.backend().await else {
            return;
        };
        if let Err(e) = backend.delete(&key.to_string()).await {
            log::warn!("Cache delete failed for {}: {}", key, e);
        }
    }

    pub async fn exists(&self, key: &CacheKey) -> bool {
        let Some(backend) = self.backend().await else {
            return false;
        };
        match backend.exists(&key.to_string()).await {
            Ok(exists) => exists,
            Err(e) => {
                log::warn!("Cache exists check failed for {}: {}", key, e);
                false
            }
        }
    }

    pub async fn clear(&self, pattern: &str) -> usize {
        let Some(backend) = self.backend().await else {
            return 0;
        };
        match backend.clear(pattern).await {
            Ok(removed) => {
                log::debug!("Cleared {} cache entries matching {}", removed, pattern);
                removed
            }
            Err(e) => {
                log::warn!("Cache clear failed for {}: {}", pattern, e);
                0
            }
        }
    }
}
