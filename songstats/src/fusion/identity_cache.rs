//! Identity cache
//!
//! Memo of resolved identities keyed by (source, normalized artist,
//! normalized title). Saves a search round trip on re-runs; only confident
//! matches are stored. Optionally persisted as a JSON file.

use super::normalize::normalize;
use crate::types::{CanonicalIdentity, SongQuery, Source};
use songstats_common::fs_util::write_atomic;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    source: Source,
    artist: String,
    title: String,
}

impl CacheKey {
    fn new(source: Source, query: &SongQuery) -> Self {
        Self {
            source,
            artist: normalize(&query.artist),
            title: normalize(&query.title),
        }
    }

    /// Flat key for the JSON file; normalized text never contains `|`
    fn to_file_key(&self) -> String {
        format!("{}|{}|{}", self.source, self.artist, self.title)
    }

    fn from_file_key(key: &str) -> Option<Self> {
        let mut parts = key.splitn(3, '|');
        let source = parts.next()?.parse().ok()?;
        let artist = parts.next()?.to_string();
        let title = parts.next()?.to_string();
        Some(Self {
            source,
            artist,
            title,
        })
    }
}

/// Resolved identities, shared across the rows of a run
#[derive(Debug, Default)]
pub struct IdentityCache {
    entries: RwLock<HashMap<CacheKey, CanonicalIdentity>>,
    path: Option<PathBuf>,
    dirty: AtomicBool,
}

impl IdentityCache {
    /// Cache that lives for one run only
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load a persisted cache; a missing file starts empty
    pub fn load(path: &Path) -> songstats_common::Result<Self> {
        let mut entries = HashMap::new();

        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let file: BTreeMap<String, CanonicalIdentity> = serde_json::from_str(&contents)?;
            for (key, identity) in file {
                match CacheKey::from_file_key(&key) {
                    Some(k) if k.source == identity.source => {
                        entries.insert(k, identity);
                    }
                    _ => debug!(key = %key, "Ignoring malformed identity cache entry"),
                }
            }
            info!(path = %path.display(), entries = entries.len(), "Loaded identity cache");
        }

        Ok(Self {
            entries: RwLock::new(entries),
            path: Some(path.to_path_buf()),
            dirty: AtomicBool::new(false),
        })
    }

    /// Empty cache that will replace the file at `path` when saved
    pub fn load_fresh(path: &Path) -> Self {
        Self {
            path: Some(path.to_path_buf()),
            ..Self::default()
        }
    }

    pub fn get(&self, source: Source, query: &SongQuery) -> Option<CanonicalIdentity> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(&CacheKey::new(source, query)).cloned()
    }

    pub fn insert(&self, query: &SongQuery, identity: CanonicalIdentity) {
        let key = CacheKey::new(identity.source, query);
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key, identity);
        self.dirty.store(true, Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write the cache to its file, if it has one and anything changed
    pub fn save(&self) -> songstats_common::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if !self.dirty.swap(false, Ordering::Relaxed) {
            return Ok(());
        }

        let file: BTreeMap<String, CanonicalIdentity> = {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            entries
                .iter()
                .map(|(k, v)| (k.to_file_key(), v.clone()))
                .collect()
        };

        let json = serde_json::to_vec_pretty(&file)?;
        write_atomic(path, &json)?;
        info!(path = %path.display(), entries = file.len(), "Saved identity cache");
        Ok(())
    }
}
