//! In-process cache storage

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::{now_millis, validate_prefix, BackendStats, CacheBackend, CacheEntry};
use crate::{CacheError, Result};

type Namespace = HashMap<String, CacheEntry>;

/// Process-wide entry table.
///
/// Several [`MemoryBackend`]s may share one store; each only ever sees the
/// namespace matching its own prefix.
#[derive(Clone, Default)]
pub struct MemoryStore {
    namespaces: Arc<RwLock<HashMap<String, Namespace>>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

/// In-memory cache backend
pub struct MemoryBackend {
    store: MemoryStore,
    prefix: String,
    max_entries: Option<usize>,
    available: bool,
}

impl MemoryBackend {
    /// Create a backend over a private store
    pub fn new(prefix: impl Into<String>) -> Self {
        Self::with_store(MemoryStore::new(), prefix)
    }

    /// Create a backend over a shared store.
    ///
    /// An invalid prefix leaves the backend unavailable.
    pub fn with_store(store: MemoryStore, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let available = match validate_prefix(&prefix) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Memory cache unavailable");
                false
            }
        };

        Self {
            store,
            prefix,
            max_entries: None,
            available,
        }
    }

    /// Bound the number of entries kept under this prefix
    pub fn with_max_entries(mut self, max_entries: Option<usize>) -> Self {
        self.max_entries = max_entries;
        self
    }

    fn ensure_available(&self) -> Result<()> {
        if self.available {
            Ok(())
        } else {
            Err(CacheError::Unavailable {
                backend: self.name().to_string(),
            })
        }
    }

    /// Make room for one more entry when the namespace is at capacity
    fn make_room(&self, entries: &mut Namespace, max: usize) {
        if entries.len() < max {
            return;
        }

        let now = now_millis();
        entries.retain(|_, entry| entry.expires_at > now);

        while entries.len() >= max {
            let victim = entries
                .iter()
                .min_by_key(|(_, entry)| entry.expires_at)
                .map(|(key, _)| key.clone());
            match victim {
                Some(key) => {
                    debug!(prefix = %self.prefix, key = %key, "Evicting memory cache entry");
                    entries.remove(&key);
                }
                None => break,
            }
        }
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    fn prefix(&self) -> &str {
        &self.prefix
    }

    fn is_available(&self) -> bool {
        self.available
    }

    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        if !self.available {
            return Ok(None);
        }

        {
            let namespaces = self.store.namespaces.read().await;
            match namespaces.get(&self.prefix).and_then(|ns| ns.get(key)) {
                None => return Ok(None),
                Some(entry) if !entry.is_expired() => return Ok(Some(entry.value.clone())),
                Some(_) => {}
            }
        }

        // Expired: re-check under the write lock, a concurrent set may have refreshed it
        let mut namespaces = self.store.namespaces.write().await;
        if let Some(entries) = namespaces.get_mut(&self.prefix) {
            if entries.get(key).is_some_and(|entry| entry.is_expired()) {
                entries.remove(key);
                return Ok(None);
            }
            return Ok(entries.get(key).map(|entry| entry.value.clone()));
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &serde_json::Value, ttl: Duration) -> Result<()> {
        self.ensure_available()?;

        let entry = CacheEntry::new(key, value.clone(), ttl);
        let mut namespaces = self.store.namespaces.write().await;
        let entries = namespaces.entry(self.prefix.clone()).or_default();

        if let Some(max) = self.max_entries {
            if !entries.contains_key(key) {
                self.make_room(entries, max);
            }
        }

        entries.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.ensure_available()?;

        let mut namespaces = self.store.namespaces.write().await;
        if let Some(entries) = namespaces.get_mut(&self.prefix) {
            entries.remove(key);
        }
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.ensure_available()?;

        let mut namespaces = self.store.namespaces.write().await;
        namespaces.remove(&self.prefix);
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize> {
        self.ensure_available()?;

        let mut namespaces = self.store.namespaces.write().await;
        let Some(entries) = namespaces.get_mut(&self.prefix) else {
            return Ok(0);
        };
        let before = entries.len();
        let now = now_millis();
        entries.retain(|_, entry| entry.expires_at > now);
        Ok(before - entries.len())
    }

    async fn stats(&self) -> BackendStats {
        if !self.available {
            return BackendStats::unavailable().with("prefix", self.prefix.as_str());
        }

        let namespaces = self.store.namespaces.read().await;
        let (entries, size_bytes) = namespaces
            .get(&self.prefix)
            .map(|entries| {
                (
                    entries.len(),
                    entries.values().map(CacheEntry::size_bytes).sum::<u64>(),
                )
            })
            .unwrap_or((0, 0));

        let mut stats = BackendStats::available()
            .with("prefix", self.prefix.as_str())
            .with("entries", entries)
            .with("size_bytes", size_bytes);
        if let Some(max) = self.max_entries {
            stats = stats.with("max_entries", max);
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    #[tokio::test]
    async fn test_memory_backend_basic_operations() {
        let backend = MemoryBackend::new("test");

        backend.set("test_key", &json!("test data"), HOUR).await.unwrap();
        assert_eq!(
            backend.get("test_key").await.unwrap(),
            Some(json!("test data"))
        );
        assert!(backend.contains("test_key").await.unwrap());
        assert!(!backend.contains("nonexistent").await.unwrap());

        backend.delete("test_key").await.unwrap();
        assert!(!backend.contains("test_key").await.unwrap());

        // Deleting again is fine
        backend.delete("test_key").await.unwrap();
    }

    #[tokio::test]
    async fn test_expired_entry_is_evicted_on_read() {
        let backend = MemoryBackend::new("test");
        backend
            .set("short", &json!(1), Duration::from_millis(20))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(backend.get("short").await.unwrap(), None);
        assert_eq!(backend.stats().await.details["entries"], json!(0));
    }

    #[tokio::test]
    async fn test_shared_store_namespace_isolation() {
        let store = MemoryStore::new();
        let a = MemoryBackend::with_store(store.clone(), "tenant-a");
        let b = MemoryBackend::with_store(store, "tenant-b");

        a.set("query", &json!("from a"), HOUR).await.unwrap();
        b.set("other", &json!("from b"), HOUR).await.unwrap();

        assert_eq!(b.get("query").await.unwrap(), None);

        a.clear().await.unwrap();
        assert_eq!(a.get("query").await.unwrap(), None);
        assert_eq!(b.get("other").await.unwrap(), Some(json!("from b")));
    }

    #[tokio::test]
    async fn test_invalid_prefix_disables_backend() {
        let store = MemoryStore::new();
        let valid = MemoryBackend::with_store(store.clone(), "a");
        valid.set("b:key", &json!("kept"), HOUR).await.unwrap();

        let backend = MemoryBackend::with_store(store, "a:b");

        assert!(!backend.is_available());
        assert!(!backend.stats().await.available);
        assert!(backend.set("key", &json!(1), HOUR).await.is_err());
        assert!(backend.clear().await.is_err());
        assert_eq!(backend.get("key").await.unwrap(), None);
        assert_eq!(valid.get("b:key").await.unwrap(), Some(json!("kept")));
    }

    #[tokio::test]
    async fn test_max_entries_evicts_soonest_expiry() {
        let backend = MemoryBackend::new("bounded").with_max_entries(Some(2));

        backend.set("short", &json!(1), Duration::from_secs(10)).await.unwrap();
        backend.set("long", &json!(2), HOUR).await.unwrap();
        backend.set("new", &json!(3), HOUR).await.unwrap();

        assert_eq!(backend.get("short").await.unwrap(), None);
        assert!(backend.contains("long").await.unwrap());
        assert!(backend.contains("new").await.unwrap());

        // Overwriting an existing key never evicts
        backend.set("long", &json!(4), HOUR).await.unwrap();
        assert!(backend.contains("new").await.unwrap());
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let backend = MemoryBackend::new("purge");
        backend.set("a", &json!(1), Duration::from_millis(10)).await.unwrap();
        backend.set("b", &json!(2), Duration::from_millis(10)).await.unwrap();
        backend.set("c", &json!(3), HOUR).await.unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(backend.purge_expired().await.unwrap(), 2);
        assert_eq!(backend.purge_expired().await.unwrap(), 0);
        assert!(backend.contains("c").await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_writers() {
        let backend = Arc::new(MemoryBackend::new("concurrent"));
        let mut handles = Vec::new();
        for i in 0..16 {
            let backend = backend.clone();
            handles.push(tokio::spawn(async move {
                backend
                    .set(&format!("key{i}"), &json!(i), HOUR)
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(backend.stats().await.details["entries"], json!(16));
    }
}
