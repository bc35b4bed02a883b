//! Content-addressed result cache with single-flight coordination.
//!
//! Each cache namespace owns a subdirectory under the cache root; values are
//! MessagePack blobs written atomically (temp file + rename) and named by the
//! hex-encoded first 16 bytes of the SHA-256 digest of the key material. An
//! in-memory index tracks access recency for LRU eviction.
//!
//! # Single-flight
//!
//! For any cache key at most one producer runs process-wide. The first caller
//! of [`DocumentCache::begin_processing`] receives a [`ProcessingGuard`];
//! subsequent callers receive a [`CompletionEvent`] to await, then re-read.
//! The guard completes the key on drop, unwind included, so a crashed
//! producer releases its followers and one of them retries as a fresh
//! producer. No deadlock is possible.

use crate::error::{KreuzbergError, Result};
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::SystemTime;
use tokio::sync::watch;

/// Cleanup runs once per this many writes.
const CLEANUP_WRITE_INTERVAL: usize = 100;
/// Eviction drains down to this fraction of the configured bound.
const EVICTION_TARGET_RATIO: f64 = 0.8;

/// Build a deterministic cache key from key-value parts.
///
/// Pairs are sorted by key, joined as `k=v&...`, and hashed; the key is the
/// hex of the first 16 bytes of the SHA-256 digest.
pub fn generate_cache_key(parts: &[(&str, &str)]) -> String {
    let mut sorted: Vec<_> = parts.to_vec();
    sorted.sort_by_key(|(k, _)| *k);

    let mut material = String::new();
    for (i, (key, value)) in sorted.iter().enumerate() {
        if i > 0 {
            material.push('&');
        }
        material.push_str(key);
        material.push('=');
        material.push_str(value);
    }

    let digest = Sha256::digest(material.as_bytes());
    hex::encode(&digest[..16])
}

/// Hex SHA-256 prefix of a byte buffer, used for byte-content keys and image
/// identity.
pub fn content_digest(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    hex::encode(&digest[..16])
}

/// `(path, size, mtime)` fingerprint for file-based cache keys.
pub fn file_fingerprint(path: &Path) -> Result<(String, u64, u64)> {
    let metadata = fs::metadata(path)?;
    let mtime = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0);
    Ok((path.to_string_lossy().into_owned(), metadata.len(), mtime))
}

#[derive(Debug, Clone)]
struct IndexEntry {
    size: u64,
    last_access: SystemTime,
}

/// Event a follower awaits while another caller produces the value.
pub struct CompletionEvent {
    rx: watch::Receiver<bool>,
}

impl CompletionEvent {
    /// Resolves when the producer completes (successfully or not).
    pub async fn wait(mut self) {
        while !*self.rx.borrow() {
            if self.rx.changed().await.is_err() {
                break;
            }
        }
    }
}

/// RAII handle owned by the unique producer for a key.
///
/// Dropping the guard marks the key complete and wakes all followers. This
/// runs on every exit path, panics included.
pub struct ProcessingGuard<'a> {
    cache: &'a DocumentCache,
    key: String,
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.cache.mark_complete(&self.key);
    }
}

/// Outcome of attempting to become the producer for a key.
pub enum ProcessingState<'a> {
    /// This caller is the producer.
    Acquired(ProcessingGuard<'a>),
    /// Another caller is producing; await the event and re-read.
    AlreadyProcessing(CompletionEvent),
}

/// A bounded on-disk cache namespace.
pub struct DocumentCache {
    cache_dir: PathBuf,
    namespace: String,
    max_entries: usize,
    max_cache_size_mb: f64,
    index: Mutex<HashMap<String, IndexEntry>>,
    inflight: Mutex<HashMap<String, watch::Sender<bool>>>,
    write_counter: AtomicUsize,
}

/// Platform cache root for all namespaces.
pub fn default_cache_root() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("kreuzberg")
}

impl DocumentCache {
    pub fn new(
        namespace: impl Into<String>,
        cache_root: Option<PathBuf>,
        max_entries: usize,
        max_cache_size_mb: f64,
    ) -> Result<Self> {
        let namespace = namespace.into();
        let cache_dir = cache_root.unwrap_or_else(default_cache_root).join(&namespace);

        fs::create_dir_all(&cache_dir)
            .map_err(|e| KreuzbergError::cache(format!("Failed to create cache directory: {}", e)))?;

        let cache = Self {
            cache_dir,
            namespace,
            max_entries,
            max_cache_size_mb,
            index: Mutex::new(HashMap::new()),
            inflight: Mutex::new(HashMap::new()),
            write_counter: AtomicUsize::new(0),
        };
        cache.rebuild_index();
        Ok(cache)
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.msgpack", key))
    }

    fn rebuild_index(&self) {
        let Ok(read_dir) = fs::read_dir(&self.cache_dir) else {
            return;
        };

        let mut index = self.index.lock();
        for entry in read_dir.flatten() {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("msgpack") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if let Ok(metadata) = entry.metadata() {
                index.insert(
                    stem.to_string(),
                    IndexEntry {
                        size: metadata.len(),
                        last_access: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                    },
                );
            }
        }
    }

    /// Raw read. Corrupt or unreadable entries are deleted and reported as a
    /// miss.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        let path = self.entry_path(key);
        if !path.exists() {
            return None;
        }

        match fs::read(&path) {
            Ok(bytes) => {
                let mut index = self.index.lock();
                index.insert(
                    key.to_string(),
                    IndexEntry {
                        size: bytes.len() as u64,
                        last_access: SystemTime::now(),
                    },
                );
                Some(bytes)
            }
            Err(e) => {
                tracing::debug!("Removing unreadable cache entry {}: {}", path.display(), e);
                let _ = fs::remove_file(&path);
                self.index.lock().remove(key);
                None
            }
        }
    }

    /// Typed read through MessagePack.
    pub fn get_value<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let bytes = self.get(key)?;
        match rmp_serde::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!("Removing corrupt cache entry {}: {}", key, e);
                let _ = fs::remove_file(self.entry_path(key));
                self.index.lock().remove(key);
                None
            }
        }
    }

    /// Atomic write: temp file in the namespace directory, then rename.
    pub fn set(&self, key: &str, data: Vec<u8>) -> Result<()> {
        let path = self.entry_path(key);
        let temp_path = self
            .cache_dir
            .join(format!("{}.tmp.{}.{}", key, std::process::id(), uuid::Uuid::new_v4()));

        fs::write(&temp_path, &data)
            .map_err(|e| KreuzbergError::cache(format!("Failed to write cache file: {}", e)))?;
        fs::rename(&temp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            KreuzbergError::cache(format!("Failed to rename cache file: {}", e))
        })?;

        self.index.lock().insert(
            key.to_string(),
            IndexEntry {
                size: data.len() as u64,
                last_access: SystemTime::now(),
            },
        );

        let count = self.write_counter.fetch_add(1, Ordering::Relaxed);
        if count % CLEANUP_WRITE_INTERVAL == 0 {
            // Housekeeping failure never fails the write.
            self.enforce_limits();
        }

        Ok(())
    }

    pub fn set_value<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        // Named (map-based) encoding: field skipping and flattened maps in
        // the value types are not representable positionally.
        let bytes = rmp_serde::to_vec_named(value)?;
        self.set(key, bytes)
    }

    pub fn is_processing(&self, key: &str) -> bool {
        self.inflight.lock().contains_key(key)
    }

    /// Try to become the producer for `key`.
    pub fn begin_processing(&self, key: &str) -> ProcessingState<'_> {
        let mut inflight = self.inflight.lock();
        if let Some(tx) = inflight.get(key) {
            return ProcessingState::AlreadyProcessing(CompletionEvent { rx: tx.subscribe() });
        }

        let (tx, _rx) = watch::channel(false);
        inflight.insert(key.to_string(), tx);
        ProcessingState::Acquired(ProcessingGuard {
            cache: self,
            key: key.to_string(),
        })
    }

    /// Release the key and wake followers. Idempotent; called by the guard's
    /// drop.
    pub fn mark_complete(&self, key: &str) {
        if let Some(tx) = self.inflight.lock().remove(key) {
            let _ = tx.send(true);
        }
    }

    /// LRU eviction down to the configured bounds.
    fn enforce_limits(&self) {
        let snapshot: Vec<(String, IndexEntry)> = {
            let index = self.index.lock();
            index.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
        };

        let total_size: u64 = snapshot.iter().map(|(_, e)| e.size).sum();
        let max_size_bytes = (self.max_cache_size_mb * 1024.0 * 1024.0) as u64;

        if snapshot.len() <= self.max_entries && total_size <= max_size_bytes {
            return;
        }

        let mut by_age = snapshot;
        by_age.sort_by_key(|(_, e)| e.last_access);

        let target_entries = (self.max_entries as f64 * EVICTION_TARGET_RATIO) as usize;
        let target_size = (max_size_bytes as f64 * EVICTION_TARGET_RATIO) as u64;
        let mut remaining_count = by_age.len();
        let mut remaining_size = total_size;

        for (key, entry) in by_age {
            if remaining_count <= target_entries && remaining_size <= target_size {
                break;
            }
            match fs::remove_file(self.entry_path(&key)) {
                Ok(()) => {
                    remaining_count -= 1;
                    remaining_size = remaining_size.saturating_sub(entry.size);
                    self.index.lock().remove(&key);
                }
                Err(e) => {
                    tracing::debug!("Failed to evict cache entry {}: {}", key, e);
                }
            }
        }
    }

    /// Remove all entries in this namespace. Returns `(count, size_mb)`.
    pub fn clear(&self) -> Result<(usize, f64)> {
        let mut removed_count = 0usize;
        let mut removed_size = 0.0f64;

        let read_dir = fs::read_dir(&self.cache_dir)
            .map_err(|e| KreuzbergError::cache(format!("Failed to read cache directory: {}", e)))?;

        for entry in read_dir.flatten() {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("msgpack") {
                continue;
            }
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            match fs::remove_file(&path) {
                Ok(()) => {
                    removed_count += 1;
                    removed_size += size as f64 / (1024.0 * 1024.0);
                }
                Err(e) => {
                    tracing::debug!("Failed to remove {:?}: {}", path, e);
                }
            }
        }

        self.index.lock().clear();
        Ok((removed_count, removed_size))
    }

    /// `(entry_count, total_size_mb)` for this namespace.
    pub fn stats(&self) -> (usize, f64) {
        let index = self.index.lock();
        let total: u64 = index.values().map(|e| e.size).sum();
        (index.len(), total as f64 / (1024.0 * 1024.0))
    }
}
