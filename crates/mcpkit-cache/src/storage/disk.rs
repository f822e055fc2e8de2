//! Disk-based cache storage
//!
//! One file per key at `<root>/<prefix>/<hh>/<sha256(key)>.cache`, holding a
//! JSON [`CacheEntry`] envelope, optionally gzip-compressed. Reads take a
//! shared lock and writes an exclusive lock on the entry file.

use std::{
    fs::{self, File, OpenOptions},
    io::{self, Read, Write},
    path::{Path, PathBuf},
    time::Duration,
};

use async_trait::async_trait;
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use fs2::FileExt;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::{validate_prefix, BackendStats, CacheBackend, CacheEntry};
use crate::{CacheError, Result};

const ENTRY_EXTENSION: &str = "cache";
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const WRITE_ATTEMPTS: usize = 3;

/// Disk-based cache backend
pub struct DiskBackend {
    /// Namespace directory (`root/prefix`)
    base_path: PathBuf,
    prefix: String,
    compress: bool,
    available: bool,
}

impl DiskBackend {
    /// Create a disk backend rooted at `root`.
    ///
    /// If the prefix is not a valid namespace or the namespace directory
    /// cannot be created, the backend reports itself unavailable instead of
    /// failing. An invalid prefix never touches the filesystem.
    pub fn new<P: AsRef<Path>>(root: P, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let base_path = root.as_ref().join(&prefix);
        let available = match validate_prefix(&prefix) {
            Err(e) => {
                warn!(root = %root.as_ref().display(), error = %e, "Disk cache unavailable");
                false
            }
            Ok(()) => match fs::create_dir_all(&base_path) {
                Ok(()) => true,
                Err(e) => {
                    warn!(path = %base_path.display(), error = %e, "Disk cache unavailable");
                    false
                }
            },
        };

        Self {
            base_path,
            prefix,
            compress: false,
            available,
        }
    }

    /// Gzip entry files
    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Namespace directory holding this backend's entries
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Get file path for a key
    fn key_path(&self, key: &str) -> PathBuf {
        let digest = hex::encode(Sha256::digest(key.as_bytes()));
        self.base_path
            .join(&digest[..2])
            .join(format!("{}.{}", digest, ENTRY_EXTENSION))
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
}

fn read_locked(path: &Path) -> io::Result<Option<Vec<u8>>> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    FileExt::lock_shared(&file)?;
    let mut bytes = Vec::new();
    let result = file.read_to_end(&mut bytes);
    let _ = FileExt::unlock(&file);
    result?;
    Ok(Some(bytes))
}

fn write_locked(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new().write(true).create(true).open(path)?;
        FileExt::lock_exclusive(&file)?;
        // Unlinked by a stale eviction while we waited for the lock
        if !path.exists() && attempt < WRITE_ATTEMPTS {
            let _ = FileExt::unlock(&file);
            continue;
        }

        let result = file
            .set_len(0)
            .and_then(|_| file.write_all(bytes))
            .and_then(|_| file.flush());
        let _ = FileExt::unlock(&file);
        return result;
    }
}

/// Outcome of re-reading an entry file under an exclusive lock
enum Recheck {
    /// A live entry replaced the stale one
    Live(CacheEntry),
    Removed,
    /// Missing, or created but not yet written
    Absent,
}

/// Remove an entry file only if it is still corrupt or expired once the
/// exclusive lock is held, so a concurrent `set` is never discarded.
fn evict_if_stale(path: &Path) -> io::Result<Recheck> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Recheck::Absent),
        Err(e) => return Err(e),
    };

    FileExt::lock_exclusive(&file)?;
    let mut bytes = Vec::new();
    let result = file.read_to_end(&mut bytes).and_then(|_| {
        if bytes.is_empty() {
            return Ok(Recheck::Absent);
        }
        match decode_entry(&bytes) {
            Some(entry) if !entry.is_expired() => Ok(Recheck::Live(entry)),
            _ => remove_if_exists(path).map(|_| Recheck::Removed),
        }
    });
    let _ = FileExt::unlock(&file);
    result
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

fn encode_entry(entry: &CacheEntry, compress: bool) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(entry).map_err(|e| CacheError::Serialization {
        message: e.to_string(),
    })?;
    if !compress {
        return Ok(json);
    }

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json)?;
    Ok(encoder.finish()?)
}

/// Decode an entry file; `None` means the file is corrupt.
fn decode_entry(bytes: &[u8]) -> Option<CacheEntry> {
    if bytes.starts_with(&GZIP_MAGIC) {
        let mut json = Vec::new();
        GzDecoder::new(bytes).read_to_end(&mut json).ok()?;
        serde_json::from_slice(&json).ok()
    } else {
        serde_json::from_slice(bytes).ok()
    }
}

fn is_entry_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == ENTRY_EXTENSION)
}

#[async_trait]
impl CacheBackend for DiskBackend {
    fn name(&self) -> &str {
        "disk"
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

        let path = self.key_path(key);
        let key = key.to_string();
        tokio::task::spawn_blocking(move || -> Result<Option<serde_json::Value>> {
            let Some(bytes) = read_locked(&path)? else {
                return Ok(None);
            };
            // Created but not yet written by a concurrent set
            if bytes.is_empty() {
                return Ok(None);
            }

            let entry = match decode_entry(&bytes) {
                Some(entry) if !entry.is_expired() => entry,
                _ => match evict_if_stale(&path) {
                    Ok(Recheck::Live(entry)) => entry,
                    Ok(Recheck::Removed) => {
                        debug!(path = %path.display(), "Removed stale disk cache entry");
                        return Ok(None);
                    }
                    Ok(Recheck::Absent) => return Ok(None),
                    Err(e) => {
                        debug!(path = %path.display(), error = %e, "Stale entry eviction failed");
                        return Ok(None);
                    }
                },
            };

            Ok((entry.key == key).then_some(entry.value))
        })
        .await?
    }

    async fn set(&self, key: &str, value: &serde_json::Value, ttl: Duration) -> Result<()> {
        self.ensure_available()?;

        let path = self.key_path(key);
        let bytes = encode_entry(&CacheEntry::new(key, value.clone(), ttl), self.compress)?;
        tokio::task::spawn_blocking(move || write_locked(&path, &bytes)).await??;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.ensure_available()?;

        let path = self.key_path(key);
        tokio::task::spawn_blocking(move || remove_if_exists(&path)).await??;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.ensure_available()?;

        let base_path = self.base_path.clone();
        tokio::task::spawn_blocking(move || -> io::Result<()> {
            match fs::remove_dir_all(&base_path) {
                Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e),
                _ => {}
            }
            fs::create_dir_all(&base_path)
        })
        .await??;
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize> {
        self.ensure_available()?;

        let base_path = self.base_path.clone();
        let removed = tokio::task::spawn_blocking(move || {
            let mut removed = 0;
            for entry in WalkDir::new(&base_path).into_iter().filter_map(|e| e.ok()) {
                let path = entry.path();
                if !entry.file_type().is_file() || !is_entry_file(path) {
                    continue;
                }
                let stale = match read_locked(path) {
                    Ok(Some(bytes)) => decode_entry(&bytes).map_or(true, |e| e.is_expired()),
                    _ => false,
                };
                if stale && matches!(evict_if_stale(path), Ok(Recheck::Removed)) {
                    removed += 1;
                }
            }
            removed
        })
        .await?;
        Ok(removed)
    }

    async fn stats(&self) -> BackendStats {
        if !self.available {
            return BackendStats::unavailable()
                .with("path", self.base_path.display().to_string());
        }

        let base_path = self.base_path.clone();
        let (entries, size_bytes) = tokio::task::spawn_blocking(move || {
            WalkDir::new(&base_path)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file() && is_entry_file(e.path()))
                .fold((0usize, 0u64), |(count, size), e| {
                    let len = e.metadata().map(|m| m.len()).unwrap_or(0);
                    (count + 1, size + len)
                })
        })
        .await
        .unwrap_or((0, 0));

        BackendStats::available()
            .with("path", self.base_path.display().to_string())
            .with("prefix", self.prefix.as_str())
            .with("entries", entries)
            .with("size_bytes", size_bytes)
            .with("compress", self.compress)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    #[tokio::test]
    async fn test_disk_backend_basic_operations() {
        let temp_dir = TempDir::new().unwrap();
        let backend = DiskBackend::new(temp_dir.path(), "test");
        assert!(backend.is_available());

        backend
            .set("test_key", &json!({"rows": [1, 2, 3]}), HOUR)
            .await
            .unwrap();
        assert_eq!(
            backend.get("test_key").await.unwrap(),
            Some(json!({"rows": [1, 2, 3]}))
        );

        backend.delete("test_key").await.unwrap();
        assert_eq!(backend.get("test_key").await.unwrap(), None);
        backend.delete("test_key").await.unwrap();
    }

    #[tokio::test]
    async fn test_entries_are_hashed_into_subdirectories() {
        let temp_dir = TempDir::new().unwrap();
        let backend = DiskBackend::new(temp_dir.path(), "ns");
        backend.set("a/b:c", &json!(1), HOUR).await.unwrap();

        let path = backend.key_path("a/b:c");
        assert!(path.exists());
        assert!(path.starts_with(temp_dir.path().join("ns")));
        let shard = path.parent().unwrap().file_name().unwrap().to_str().unwrap();
        assert_eq!(shard.len(), 2);
    }

    #[tokio::test]
    async fn test_compressed_entries_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let backend = DiskBackend::new(temp_dir.path(), "gz").with_compression(true);
        let value = json!({"text": "x".repeat(4096)});

        backend.set("big", &value, HOUR).await.unwrap();

        let raw = fs::read(backend.key_path("big")).unwrap();
        assert!(raw.starts_with(&GZIP_MAGIC));
        assert!(raw.len() < 4096);
        assert_eq!(backend.get("big").await.unwrap(), Some(value));
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_a_miss_and_removed() {
        let temp_dir = TempDir::new().unwrap();
        let backend = DiskBackend::new(temp_dir.path(), "test");
        backend.set("key", &json!(1), HOUR).await.unwrap();

        let path = backend.key_path("key");
        fs::write(&path, b"{not json").unwrap();

        assert_eq!(backend.get("key").await.unwrap(), None);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_expired_entry_is_removed() {
        let temp_dir = TempDir::new().unwrap();
        let backend = DiskBackend::new(temp_dir.path(), "test");
        backend
            .set("key", &json!(1), Duration::from_millis(10))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(backend.get("key").await.unwrap(), None);
        assert!(!backend.key_path("key").exists());
    }

    #[tokio::test]
    async fn test_clear_only_touches_own_prefix() {
        let temp_dir = TempDir::new().unwrap();
        let a = DiskBackend::new(temp_dir.path(), "a");
        let b = DiskBackend::new(temp_dir.path(), "b");
        fs::write(temp_dir.path().join("unrelated.txt"), b"keep").unwrap();

        a.set("key", &json!("a"), HOUR).await.unwrap();
        b.set("key", &json!("b"), HOUR).await.unwrap();

        a.clear().await.unwrap();

        assert_eq!(a.get("key").await.unwrap(), None);
        assert_eq!(b.get("key").await.unwrap(), Some(json!("b")));
        assert!(temp_dir.path().join("unrelated.txt").exists());

        // Still usable after clear
        a.set("again", &json!(2), HOUR).await.unwrap();
        assert_eq!(a.get("again").await.unwrap(), Some(json!(2)));
    }

    #[tokio::test]
    async fn test_purge_expired_and_stats() {
        let temp_dir = TempDir::new().unwrap();
        let backend = DiskBackend::new(temp_dir.path(), "test");
        backend.set("old", &json!(1), Duration::from_millis(10)).await.unwrap();
        backend.set("live", &json!(2), HOUR).await.unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(backend.purge_expired().await.unwrap(), 1);
        let stats = backend.stats().await;
        assert!(stats.available);
        assert_eq!(stats.details["entries"], json!(1));
    }

    #[tokio::test]
    async fn test_unwritable_root_disables_backend() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("file");
        fs::write(&blocker, b"not a directory").unwrap();

        let backend = DiskBackend::new(&blocker, "ns");

        assert!(!backend.is_available());
        assert!(!backend.stats().await.available);
        assert_eq!(backend.get("key").await.unwrap(), None);
        assert!(backend.set("key", &json!(1), HOUR).await.is_err());
    }

    #[tokio::test]
    async fn test_invalid_prefix_disables_backend_without_touching_root() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("cache");
        let neighbour = DiskBackend::new(&root, "other");
        neighbour.set("key", &json!("kept"), HOUR).await.unwrap();
        fs::write(root.join("unrelated.txt"), b"keep").unwrap();
        fs::write(temp_dir.path().join("sibling.txt"), b"keep").unwrap();

        for prefix in ["", "..", ".", "a/b", "a:b"] {
            let backend = DiskBackend::new(&root, prefix);

            assert!(!backend.is_available(), "{prefix:?} should be rejected");
            assert!(!backend.stats().await.available);
            assert!(backend.clear().await.is_err());
            assert!(backend.purge_expired().await.is_err());
            assert!(backend.set("key", &json!(1), HOUR).await.is_err());
            assert_eq!(backend.get("key").await.unwrap(), None);
        }

        assert!(root.join("unrelated.txt").exists());
        assert!(temp_dir.path().join("sibling.txt").exists());
        assert!(!root.join("a").exists());
        assert_eq!(neighbour.get("key").await.unwrap(), Some(json!("kept")));
    }

    #[tokio::test]
    async fn test_stale_eviction_keeps_entry_rewritten_meanwhile() {
        let temp_dir = TempDir::new().unwrap();
        let backend = DiskBackend::new(temp_dir.path(), "test");
        backend
            .set("key", &json!("old"), Duration::from_millis(10))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        let path = backend.key_path("key");
        let stale = decode_entry(&fs::read(&path).unwrap()).unwrap();
        assert!(stale.is_expired());

        // A reader saw the expired entry; a writer replaces it before eviction
        backend.set("key", &json!("new"), HOUR).await.unwrap();

        assert!(matches!(
            evict_if_stale(&path).unwrap(),
            Recheck::Live(entry) if entry.value == json!("new")
        ));
        assert!(path.exists());
        assert_eq!(backend.get("key").await.unwrap(), Some(json!("new")));
    }

    #[test]
    fn test_stale_eviction_skips_unwritten_and_missing_files() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("entry.cache");

        assert!(matches!(evict_if_stale(&path).unwrap(), Recheck::Absent));

        fs::write(&path, b"").unwrap();
        assert!(matches!(evict_if_stale(&path).unwrap(), Recheck::Absent));
        assert!(path.exists());

        fs::write(&path, b"{not json").unwrap();
        assert!(matches!(evict_if_stale(&path).unwrap(), Recheck::Removed));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_concurrent_writes_to_same_key_stay_decodable() {
        let temp_dir = TempDir::new().unwrap();
        let backend = std::sync::Arc::new(DiskBackend::new(temp_dir.path(), "race"));

        let mut handles = Vec::new();
        for i in 0..8 {
            let backend = backend.clone();
            handles.push(tokio::spawn(async move {
                let value = json!({"writer": i, "payload": "y".repeat(512 * (i + 1))});
                backend.set("shared", &value, HOUR).await.unwrap();
                backend.get("shared").await.unwrap()
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_some());
        }
    }
}
