use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Recorded mtime/size for a single scanned file, used to decide whether a
/// re-scan is necessary without hashing file content (spec.md §4.2
/// "on-disk cache keyed by (mtime, size)"; a pure content hash was rejected
/// there because hashing every translation unit on every run defeats the
/// point of caching). Grounded on `boundary-core::cache.rs::AnalysisCache`,
/// generalized from a content-hash key to an mtime+size key.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub mtime_secs: u64,
    pub mtime_nanos: u32,
    pub size: u64,
}

impl CacheEntry {
    fn from_metadata(meta: &std::fs::Metadata) -> Result<Self> {
        let modified = meta.modified().context("file system does not report mtime")?;
        let since_epoch = modified
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default();
        Ok(CacheEntry {
            mtime_secs: since_epoch.as_secs(),
            mtime_nanos: since_epoch.subsec_nanos(),
            size: meta.len(),
        })
    }
}

const CACHE_DIR: &str = ".depcheck";
const CACHE_FILE: &str = "cache.json";

/// On-disk cache of per-file (mtime, size) pairs, keyed by absolute path
/// (spec.md §4.2). A path is "stale" when it is missing from the cache, or
/// its current (mtime, size) differs from the recorded one; ties on mtime
/// alone fall back to size, per spec.md §9's clock-skew note ("two distinct
/// contents can share a one-second-resolution mtime on some filesystems;
/// comparing size too catches that case without requiring a content hash").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisCache {
    pub entries: BTreeMap<PathBuf, CacheEntry>,
}

impl AnalysisCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `<build_directory>/.depcheck/cache.json`, or an empty cache if
    /// absent or unreadable.
    pub fn load(build_directory: &Path) -> Self {
        let path = cache_path(build_directory);
        match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
            Err(_) => Self::new(),
        }
    }

    pub fn save(&self, build_directory: &Path) -> Result<()> {
        let dir = build_directory.join(CACHE_DIR);
        std::fs::create_dir_all(&dir).context("failed to create cache directory")?;
        let content = serde_json::to_string_pretty(self).context("failed to serialize cache")?;
        std::fs::write(cache_path(build_directory), content).context("failed to write cache")?;
        Ok(())
    }

    /// True if `path` is absent from the cache, unreadable, or its
    /// (mtime, size) differs from the recorded entry.
    pub fn is_stale(&self, path: &Path) -> bool {
        let meta = match std::fs::metadata(path) {
            Ok(meta) => meta,
            Err(_) => return true,
        };
        let current = match CacheEntry::from_metadata(&meta) {
            Ok(entry) => entry,
            Err(_) => return true,
        };
        match self.entries.get(path) {
            Some(recorded) => *recorded != current,
            None => true,
        }
    }

    /// Record the current (mtime, size) of `path`. No-op if the file
    /// cannot be stat'd (e.g. it was removed between scan and cache-write).
    pub fn record(&mut self, path: &Path) {
        if let Ok(meta) = std::fs::metadata(path) {
            if let Ok(entry) = CacheEntry::from_metadata(&meta) {
                self.entries.insert(path.to_path_buf(), entry);
            }
        }
    }

    /// Drop entries for paths no longer present in `current_paths`, so the
    /// cache does not grow unboundedly as source files are renamed/removed.
    pub fn prune(&mut self, current_paths: &std::collections::BTreeSet<PathBuf>) {
        self.entries.retain(|path, _| current_paths.contains(path));
    }
}

fn cache_path(build_directory: &Path) -> PathBuf {
    build_directory.join(CACHE_DIR).join(CACHE_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::io::Write;

    #[test]
    fn test_missing_path_is_stale() {
        let cache = AnalysisCache::new();
        assert!(cache.is_stale(Path::new("/nonexistent/path.h")));
    }

    #[test]
    fn test_record_then_not_stale() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.h");
        std::fs::write(&file, b"content").unwrap();

        let mut cache = AnalysisCache::new();
        cache.record(&file);
        assert!(!cache.is_stale(&file));
    }

    #[test]
    fn test_size_change_is_stale() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.h");
        std::fs::write(&file, b"content").unwrap();

        let mut cache = AnalysisCache::new();
        cache.record(&file);

        let mut f = std::fs::OpenOptions::new().append(true).open(&file).unwrap();
        f.write_all(b"more").unwrap();
        drop(f);

        assert!(cache.is_stale(&file));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let build_dir = dir.path().join("build");
        std::fs::create_dir_all(&build_dir).unwrap();
        let file = build_dir.join("a.h");
        std::fs::write(&file, b"content").unwrap();

        let mut cache = AnalysisCache::new();
        cache.record(&file);
        cache.save(&build_dir).unwrap();

        let loaded = AnalysisCache::load(&build_dir);
        assert!(!loaded.is_stale(&file));
    }

    #[test]
    fn test_load_missing_cache_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AnalysisCache::load(dir.path());
        assert!(cache.entries.is_empty());
    }

    #[test]
    fn test_prune_drops_removed_paths() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.h");
        let b = dir.path().join("b.h");
        std::fs::write(&a, b"a").unwrap();
        std::fs::write(&b, b"b").unwrap();

        let mut cache = AnalysisCache::new();
        cache.record(&a);
        cache.record(&b);

        let mut current: BTreeSet<PathBuf> = BTreeSet::new();
        current.insert(a.clone());
        cache.prune(&current);

        assert!(cache.entries.contains_key(&a));
        assert!(!cache.entries.contains_key(&b));
    }
}
