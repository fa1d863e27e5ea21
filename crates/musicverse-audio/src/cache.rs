//! Waveform peak cache keyed by source identity.
//!
//! Two layers: a small in-memory LRU ([`PeakCache`]) and an optional
//! directory of JSON files ([`PeakStore`]). Entries expire after a TTL.
//! Disk failures are logged and never reach the caller; the memory layer
//! keeps working without it.

use crate::peaks::PeakArray;
use musicverse_core::{defaults, Result, StudioError};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Cached peaks for one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub peaks: PeakArray,
    /// Source duration in seconds.
    pub duration_secs: f64,
    /// When the peaks were computed (unix milliseconds).
    pub timestamp_ms: u64,
}

impl CacheEntry {
    /// A new entry stamped with the current time.
    pub fn new(peaks: PeakArray, duration_secs: f64) -> Self {
        Self {
            peaks,
            duration_secs,
            timestamp_ms: now_ms(),
        }
    }

    /// Index of the peak under a playback position, for progress drawing.
    pub fn index_at(&self, position_secs: f64) -> Option<usize> {
        if self.peaks.is_empty() || self.duration_secs <= 0.0 || position_secs < 0.0 {
            return None;
        }
        let ratio = (position_secs / self.duration_secs).min(1.0);
        let index = (ratio * self.peaks.len() as f64) as usize;
        Some(index.min(self.peaks.len() - 1))
    }

    fn is_expired(&self, ttl: Duration, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.timestamp_ms) > ttl.as_millis() as u64
    }
}

/// In-memory LRU of peak entries.
#[derive(Debug, Clone)]
pub struct PeakCache {
    entries: HashMap<String, CacheEntry>,
    /// Most recent first.
    order: Vec<String>,
    capacity: usize,
    ttl: Duration,
}

impl PeakCache {
    pub fn new(capacity: usize, ttl: Duration) -> Result<Self> {
        if capacity == 0 {
            return Err(StudioError::InvalidArgument(
                "peak cache capacity must be greater than zero".into(),
            ));
        }
        Ok(Self {
            entries: HashMap::new(),
            order: Vec::new(),
            capacity,
            ttl,
        })
    }

    /// Look up `key`, refreshing its recency. Expired entries are dropped.
    pub fn get(&mut self, key: &str) -> Option<CacheEntry> {
        let expired = self.entries.get(key)?.is_expired(self.ttl, now_ms());
        if expired {
            debug!(key, "Peak cache entry expired");
            self.remove(key);
            return None;
        }
        self.touch(key);
        self.entries.get(key).cloned()
    }

    /// Insert `peaks` for `key`, stamped now.
    pub fn set(&mut self, key: impl Into<String>, peaks: PeakArray, duration_secs: f64) {
        self.insert(key, CacheEntry::new(peaks, duration_secs));
    }

    /// Insert an entry as-is, keeping its timestamp.
    pub fn insert(&mut self, key: impl Into<String>, entry: CacheEntry) {
        let key = key.into();
        self.entries.insert(key.clone(), entry);
        self.touch(&key);
        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop() {
                debug!(key = %evicted, "Evicting peak cache entry");
                self.entries.remove(&evicted);
            }
        }
    }

    pub fn remove(&mut self, key: &str) {
        self.entries.remove(key);
        self.order.retain(|k| k != key);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn touch(&mut self, key: &str) {
        self.order.retain(|k| k != key);
        self.order.insert(0, key.to_string());
    }
}

impl Default for PeakCache {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            order: Vec::new(),
            capacity: defaults::PEAK_CACHE_CAPACITY,
            ttl: Duration::from_secs(defaults::PEAK_CACHE_TTL_SECS),
        }
    }
}

/// On-disk form of an entry. The key is stored to detect filename collisions.
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    key: String,
    #[serde(flatten)]
    entry: CacheEntry,
}

/// Memory cache backed by an optional directory of JSON files.
#[derive(Debug)]
pub struct PeakStore {
    memory: PeakCache,
    dir: Option<PathBuf>,
}

impl PeakStore {
    /// Memory-only store.
    pub fn in_memory(memory: PeakCache) -> Self {
        Self { memory, dir: None }
    }

    /// Store persisting entries under `dir`.
    pub fn with_dir(memory: PeakCache, dir: impl Into<PathBuf>) -> Self {
        Self {
            memory,
            dir: Some(dir.into()),
        }
    }

    /// Memory first, then disk. Disk hits are promoted with their timestamp.
    pub fn get(&mut self, key: &str) -> Option<CacheEntry> {
        if let Some(entry) = self.memory.get(key) {
            return Some(entry);
        }
        let path = self.entry_path(key)?;
        match read_entry(&path) {
            Ok(Some(stored)) if stored.key == key => {
                if stored.entry.is_expired(self.memory.ttl(), now_ms()) {
                    debug!(key, "Stored peaks expired");
                    return None;
                }
                self.memory.insert(key, stored.entry.clone());
                Some(stored.entry)
            }
            Ok(_) => None,
            Err(e) => {
                warn!(key, error = %e, "Failed to read stored peaks");
                None
            }
        }
    }

    /// Cache `peaks` for `key` and return the stored entry.
    pub fn set(&mut self, key: &str, peaks: PeakArray, duration_secs: f64) -> CacheEntry {
        let entry = CacheEntry::new(peaks, duration_secs);
        self.memory.insert(key, entry.clone());
        if let Some(path) = self.entry_path(key) {
            let stored = StoredEntry {
                key: key.to_string(),
                entry: entry.clone(),
            };
            if let Err(e) = write_entry(&path, &stored) {
                warn!(key, error = %e, "Failed to persist peaks");
            }
        }
        entry
    }

    /// Wipe memory and disk.
    pub fn clear(&mut self) {
        self.memory.clear();
        if let Some(dir) = &self.dir {
            let removed = for_each_entry_file(dir, |path| std::fs::remove_file(path).map(|_| true));
            if let Err(e) = removed {
                warn!(error = %e, "Failed to clear stored peaks");
            }
        }
    }

    /// Remove expired files. Returns how many were removed.
    pub fn clear_expired(&mut self) -> usize {
        let Some(dir) = &self.dir else {
            return 0;
        };
        let ttl = self.memory.ttl();
        let now = now_ms();
        let result = for_each_entry_file(dir, |path| {
            let expired = match read_entry(path) {
                Ok(Some(stored)) => stored.entry.is_expired(ttl, now),
                Ok(None) => false,
                // Unreadable entries are dead weight.
                Err(_) => true,
            };
            if expired {
                std::fs::remove_file(path)?;
            }
            Ok(expired)
        });
        match result {
            Ok(count) => count,
            Err(e) => {
                warn!(error = %e, "Failed to sweep stored peaks");
                0
            }
        }
    }

    pub fn memory(&self) -> &PeakCache {
        &self.memory
    }

    fn entry_path(&self, key: &str) -> Option<PathBuf> {
        let dir = self.dir.as_ref()?;
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        Some(dir.join(format!("{:016x}.json", hasher.finish())))
    }
}

fn read_entry(path: &Path) -> Result<Option<StoredEntry>> {
    if !path.exists() {
        return Ok(None);
    }
    let data = std::fs::read(path)?;
    serde_json::from_slice(&data)
        .map(Some)
        .map_err(|e| StudioError::Serialization(format!("Invalid stored peaks: {}", e)))
}

fn write_entry(path: &Path, stored: &StoredEntry) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let data = serde_json::to_vec(stored)
        .map_err(|e| StudioError::Serialization(format!("Failed to encode peaks: {}", e)))?;
    std::fs::write(path, data)?;
    Ok(())
}

/// Apply `f` to every `.json` file in `dir`, counting `true` results.
fn for_each_entry_file(
    dir: &Path,
    mut f: impl FnMut(&Path) -> std::io::Result<bool>,
) -> std::io::Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }
    let mut count = 0;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) == Some("json") && f(&path)? {
            count += 1;
        }
    }
    Ok(count)
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
