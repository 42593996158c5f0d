//! Persisted identity cache.
//!
//! Holds the last known identity snapshot across process restarts under a
//! single key. Reads never fail: a missing, unreadable or unparseable entry
//! is reported as absent, so a damaged cache degrades to "not signed in"
//! and never to a made-up identity.
//!
//! # Storage Layout
//!
//! ```text
//! ~/.local/share/homekeep/
//! └── identity.json      # serialized IdentitySnapshot
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::identity::IdentitySnapshot;

/// File name of the cached snapshot inside the data directory.
pub const IDENTITY_FILE: &str = "identity.json";

/// Errors that can occur while writing the cache.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// I/O error writing or removing the cache file.
    #[error("I/O error for {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Snapshot could not be serialized.
    #[error("Failed to serialize identity snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Durable single-entry store for the current identity snapshot.
pub trait IdentityCache: Send + Sync {
    /// Load the cached snapshot. Corrupt or missing entries are `None`.
    fn get(&self) -> Option<IdentitySnapshot>;

    /// True if an entry is stored at all, parseable or not.
    fn has_entry(&self) -> bool;

    /// Replace the cached snapshot.
    fn set(&self, snapshot: &IdentitySnapshot) -> Result<(), CacheError>;

    /// Remove the cached snapshot. Clearing an empty cache is not an error.
    fn clear(&self) -> Result<(), CacheError>;
}

fn decode(raw: &[u8], origin: &str) -> Option<IdentitySnapshot> {
    match serde_json::from_slice(raw) {
        Ok(snapshot) => Some(snapshot),
        Err(e) => {
            tracing::warn!("Ignoring unreadable identity cache at {}: {}", origin, e);
            None
        }
    }
}

/// Identity cache backed by a JSON file in the data directory.
#[derive(Debug, Clone)]
pub struct FileIdentityCache {
    data_dir: PathBuf,
}

impl FileIdentityCache {
    /// Creates a cache rooted at the given data directory.
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    /// Returns the data directory path.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Returns the full path of the cache file.
    pub fn path(&self) -> PathBuf {
        self.data_dir.join(IDENTITY_FILE)
    }
}

impl IdentityCache for FileIdentityCache {
    fn get(&self) -> Option<IdentitySnapshot> {
        let path = self.path();

        match fs::read(&path) {
            Ok(bytes) => decode(&bytes, &path.display().to_string()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!("Failed to read identity cache {}: {}", path.display(), e);
                None
            }
        }
    }

    fn has_entry(&self) -> bool {
        self.path().exists()
    }

    /// Writes to a temporary file and renames it over the old entry so a
    /// crash mid-write leaves either the old or the new snapshot.
    fn set(&self, snapshot: &IdentitySnapshot) -> Result<(), CacheError> {
        fs::create_dir_all(&self.data_dir).map_err(|e| CacheError::Io {
            path: self.data_dir.clone(),
            source: e,
        })?;

        let bytes = serde_json::to_vec_pretty(snapshot)?;
        let path = self.path();
        let tmp_path = path.with_extension("json.tmp");

        fs::write(&tmp_path, bytes).map_err(|e| CacheError::Io {
            path: tmp_path.clone(),
            source: e,
        })?;
        fs::rename(&tmp_path, &path).map_err(|e| CacheError::Io { path, source: e })?;

        Ok(())
    }

    fn clear(&self) -> Result<(), CacheError> {
        let path = self.path();

        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::Io { path, source: e }),
        }
    }
}

/// In-process identity cache.
///
/// Stores the serialized form so it exercises the same decode path as the
/// file cache.
#[derive(Debug, Default)]
pub struct MemoryIdentityCache {
    entry: Mutex<Option<String>>,
}

impl MemoryIdentityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a cache already holding the given snapshot.
    pub fn with_snapshot(snapshot: &IdentitySnapshot) -> Result<Self, CacheError> {
        let cache = Self::new();
        cache.set(snapshot)?;
        Ok(cache)
    }

    /// Creates a cache holding an arbitrary raw entry.
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            entry: Mutex::new(Some(raw.into())),
        }
    }

    fn entry(&self) -> MutexGuard<'_, Option<String>> {
        self.entry.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl IdentityCache for MemoryIdentityCache {
    fn get(&self) -> Option<IdentitySnapshot> {
        self.entry()
            .as_deref()
            .and_then(|raw| decode(raw.as_bytes(), "memory"))
    }

    fn has_entry(&self) -> bool {
        self.entry().is_some()
    }

    fn set(&self, snapshot: &IdentitySnapshot) -> Result<(), CacheError> {
        let raw = serde_json::to_string(snapshot)?;
        *self.entry() = Some(raw);
        Ok(())
    }

    fn clear(&self) -> Result<(), CacheError> {
        *self.entry() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{HouseholdMembership, HouseholdRole, UserProfile};
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn test_cache() -> (FileIdentityCache, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let cache = FileIdentityCache::new(temp_dir.path().to_path_buf());
        (cache, temp_dir)
    }

    fn full_snapshot() -> IdentitySnapshot {
        let joined = Utc.with_ymd_and_hms(2024, 1, 15, 8, 30, 0).unwrap();
        IdentitySnapshot::new(
            "u1",
            "a@x.com",
            UserProfile::new(Some("Ada".to_string()), None),
            vec![
                HouseholdMembership::joined_at("h1", "Home", HouseholdRole::Admin, joined),
                HouseholdMembership::joined_at("h2", "Cabin", HouseholdRole::Member, joined),
            ],
        )
    }

    #[test]
    fn test_cache_path() {
        let (cache, _temp) = test_cache();
        assert!(cache.path().ends_with("identity.json"));
    }

    #[test]
    fn test_get_missing_returns_none() {
        let (cache, _temp) = test_cache();
        assert!(cache.get().is_none());
        assert!(!cache.has_entry());
    }

    #[test]
    fn test_set_and_get_roundtrip() {
        let (cache, _temp) = test_cache();
        let snapshot = full_snapshot();

        cache.set(&snapshot).unwrap();

        assert_eq!(cache.get(), Some(snapshot));
        assert!(cache.has_entry());
    }

    #[test]
    fn test_set_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let nested_dir = temp_dir.path().join("nested").join("data");
        let cache = FileIdentityCache::new(nested_dir.clone());

        cache.set(&IdentitySnapshot::minimal("u1", "a@x.com")).unwrap();

        assert!(nested_dir.exists());
        assert!(cache.has_entry());
    }

    #[test]
    fn test_set_overwrites_previous_entry() {
        let (cache, _temp) = test_cache();

        cache.set(&IdentitySnapshot::minimal("u1", "a@x.com")).unwrap();
        cache.set(&full_snapshot()).unwrap();

        assert_eq!(cache.get().unwrap().households.len(), 2);
        assert!(!cache.path().with_extension("json.tmp").exists());
    }

    #[test]
    fn test_corrupt_entry_reads_as_absent() {
        let (cache, _temp) = test_cache();
        fs::write(cache.path(), b"{not json").unwrap();

        assert!(cache.get().is_none());
        // The raw entry still exists.
        assert!(cache.has_entry());
    }

    #[test]
    fn test_clear() {
        let (cache, _temp) = test_cache();
        cache.set(&full_snapshot()).unwrap();

        cache.clear().unwrap();

        assert!(cache.get().is_none());
        assert!(!cache.has_entry());
    }

    #[test]
    fn test_clear_missing_is_ok() {
        let (cache, _temp) = test_cache();
        assert!(cache.clear().is_ok());
    }

    #[test]
    fn test_memory_cache_roundtrip() {
        let cache = MemoryIdentityCache::new();
        assert!(!cache.has_entry());

        cache.set(&full_snapshot()).unwrap();
        assert_eq!(cache.get(), Some(full_snapshot()));

        cache.clear().unwrap();
        assert!(cache.get().is_none());
    }

    #[test]
    fn test_memory_cache_corrupt_entry() {
        let cache = MemoryIdentityCache::with_raw("garbage");

        assert!(cache.has_entry());
        assert!(cache.get().is_none());
    }
}
