//! Content-addressed on-disk audio cache (component B).
//!
//! Grounded on the DashMap-backed registry shape used elsewhere in this
//! codebase for concurrent, per-key state (a sibling module's
//! `StreamRegistry`), plus the atomic temp-file-then-rename commit pattern a
//! sibling module uses for persisting config to disk.

pub mod fingerprint;

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use dashmap::DashMap;
use thiserror::Error;

pub use fingerprint::fingerprint_url;

/// Eviction runs until occupancy is at or below this fraction of budget, to
/// avoid evicting on every single insert right at the boundary.
const EVICTION_HYSTERESIS: f64 = 0.9;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("a download for this fingerprint is already in flight")]
    AlreadyInFlight,
}

/// A committed cache entry's bookkeeping.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub fingerprint: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub access_count: u64,
    pub created_at: SystemTime,
    pub last_accessed_at: SystemTime,
}

/// A handle to a reserved single-flight download slot. Dropping this handle
/// without calling [`FileCache::commit`] or [`FileCache::abandon`] leaks the
/// in-flight marker; callers must always resolve it one way or the other.
pub struct CacheSlot {
    fingerprint: String,
    pub tmp_path: PathBuf,
}

/// Content-addressed on-disk store with single-flight population and
/// LRU-with-hysteresis eviction under a byte budget.
pub struct FileCache {
    dir: PathBuf,
    budget_bytes: u64,
    entries: DashMap<String, CacheEntry>,
    in_flight: DashMap<String, ()>,
}

impl FileCache {
    /// Opens (creating if necessary) a cache rooted at `dir`, purging any
    /// stale in-flight downloads left over from a previous process.
    pub fn open(dir: impl Into<PathBuf>, budget_bytes: u64) -> Result<Self, CacheError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        let tmp_dir = dir.join("tmp");
        if tmp_dir.exists() {
            std::fs::remove_dir_all(&tmp_dir)?;
        }
        std::fs::create_dir_all(&tmp_dir)?;

        let cache = Self {
            dir,
            budget_bytes,
            entries: DashMap::new(),
            in_flight: DashMap::new(),
        };
        cache.load_existing_entries();
        Ok(cache)
    }

    fn load_existing_entries(&self) {
        let Ok(read_dir) = std::fs::read_dir(&self.dir) else {
            return;
        };
        for entry in read_dir.flatten() {
            let path = entry.path();
            if path.is_dir() {
                continue;
            }
            let Some(fingerprint) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Ok(metadata) = entry.metadata() else {
                // Entry without readable metadata on disk is ignored at startup.
                continue;
            };
            let now = SystemTime::now();
            let created_at = metadata.created().unwrap_or(now);
            self.entries.insert(
                fingerprint.to_string(),
                CacheEntry {
                    fingerprint: fingerprint.to_string(),
                    path,
                    size_bytes: metadata.len(),
                    access_count: 0,
                    created_at,
                    last_accessed_at: created_at,
                },
            );
        }
    }

    fn tmp_path(&self, fingerprint: &str) -> PathBuf {
        self.dir.join("tmp").join(format!("{fingerprint}.tmp"))
    }

    fn committed_path(&self, fingerprint: &str) -> PathBuf {
        self.dir.join(fingerprint)
    }

    /// Looks up a committed entry, recording a hit (`touch`).
    pub fn lookup(&self, fingerprint: &str) -> Option<PathBuf> {
        let Some(mut entry) = self.entries.get_mut(fingerprint) else {
            return None;
        };
        if !entry.path.exists() {
            // Missing file for a tracked entry: drop the entry, report a miss.
            drop(entry);
            self.entries.remove(fingerprint);
            return None;
        }
        entry.access_count += 1;
        entry.last_accessed_at = SystemTime::now();
        Some(entry.path.clone())
    }

    /// Reserves a single-flight download slot for `fingerprint`. Returns
    /// `None` if someone else is already populating it.
    pub fn acquire_slot(&self, fingerprint: &str) -> Option<CacheSlot> {
        if self.entries.contains_key(fingerprint) {
            return None;
        }
        match self.in_flight.entry(fingerprint.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => None,
            dashmap::mapref::entry::Entry::Vacant(v) => {
                v.insert(());
                Some(CacheSlot {
                    fingerprint: fingerprint.to_string(),
                    tmp_path: self.tmp_path(fingerprint),
                })
            }
        }
    }

    /// Atomically commits a populated temp path into the cache.
    pub fn commit(&self, slot: CacheSlot) -> Result<PathBuf, CacheError> {
        let committed = self.committed_path(&slot.fingerprint);
        let result = std::fs::rename(&slot.tmp_path, &committed).and_then(|_| {
            std::fs::metadata(&committed).map(|m| m.len())
        });
        self.in_flight.remove(&slot.fingerprint);

        match result {
            Ok(size) => {
                let now = SystemTime::now();
                self.entries.insert(
                    slot.fingerprint.clone(),
                    CacheEntry {
                        fingerprint: slot.fingerprint.clone(),
                        path: committed.clone(),
                        size_bytes: size,
                        access_count: 0,
                        created_at: now,
                        last_accessed_at: now,
                    },
                );
                self.evict_if_over_budget();
                Ok(committed)
            }
            Err(err) => {
                let _ = std::fs::remove_file(&slot.tmp_path);
                Err(CacheError::Io(err))
            }
        }
    }

    /// Abandons a reserved slot (e.g. background fill failed) without
    /// creating an entry. Deletes any partial file left behind.
    pub fn abandon(&self, slot: CacheSlot) {
        let _ = std::fs::remove_file(&slot.tmp_path);
        self.in_flight.remove(&slot.fingerprint);
    }

    fn total_bytes(&self) -> u64 {
        self.entries.iter().map(|e| e.size_bytes).sum()
    }

    /// Non-blocking: if total committed bytes exceed the budget, deletes
    /// least-recently-accessed entries (ties broken by lowest access count)
    /// until occupancy is at or below `budget * 0.9`.
    pub fn evict_if_over_budget(&self) {
        if self.total_bytes() <= self.budget_bytes {
            return;
        }
        let target = (self.budget_bytes as f64 * EVICTION_HYSTERESIS) as u64;

        let mut candidates: Vec<CacheEntry> =
            self.entries.iter().map(|e| e.value().clone()).collect();
        candidates.sort_by(|a, b| {
            a.last_accessed_at
                .cmp(&b.last_accessed_at)
                .then(a.access_count.cmp(&b.access_count))
        });

        let mut occupied = self.total_bytes();
        for entry in candidates {
            if occupied <= target {
                break;
            }
            if std::fs::remove_file(&entry.path).is_ok() || !entry.path.exists() {
                self.entries.remove(&entry.fingerprint);
                occupied = occupied.saturating_sub(entry.size_bytes);
            }
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[cfg(test)]
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_committed(cache: &FileCache, fingerprint: &str, bytes: &[u8]) {
        let slot = cache.acquire_slot(fingerprint).expect("slot available");
        let mut f = std::fs::File::create(&slot.tmp_path).unwrap();
        f.write_all(bytes).unwrap();
        cache.commit(slot).unwrap();
    }

    #[test]
    fn single_flight_blocks_second_caller() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::open(dir.path(), 1_000_000).unwrap();
        let slot_a = cache.acquire_slot("fp1");
        assert!(slot_a.is_some());
        let slot_b = cache.acquire_slot("fp1");
        assert!(slot_b.is_none());
    }

    #[test]
    fn commit_then_lookup_hits() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::open(dir.path(), 1_000_000).unwrap();
        write_committed(&cache, "fp1", b"hello");
        assert!(cache.lookup("fp1").is_some());
        assert!(cache.acquire_slot("fp1").is_none());
    }

    #[test]
    fn eviction_respects_hysteresis_budget() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::open(dir.path(), 10).unwrap();
        write_committed(&cache, "fp1", b"12345"); // 5 bytes
        write_committed(&cache, "fp2", b"12345"); // 5 bytes, total 10 == budget
        write_committed(&cache, "fp3", b"12345"); // triggers eviction
        assert!(cache.total_bytes() <= 9); // <= 10 * 0.9
    }

    #[test]
    fn missing_file_on_disk_reports_miss_and_drops_entry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::open(dir.path(), 1_000_000).unwrap();
        write_committed(&cache, "fp1", b"hello");
        std::fs::remove_file(cache.dir().join("fp1")).unwrap();
        assert!(cache.lookup("fp1").is_none());
        assert_eq!(cache.entry_count(), 0);
    }

    #[test]
    fn startup_purges_tmp_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("tmp")).unwrap();
        std::fs::write(dir.path().join("tmp").join("stale.tmp"), b"x").unwrap();
        let _cache = FileCache::open(dir.path(), 1_000_000).unwrap();
        assert_eq!(
            std::fs::read_dir(dir.path().join("tmp")).unwrap().count(),
            0
        );
    }
}
