use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::trace;

use crate::types::RevisionId;

/// Default number of (file, revision) contents kept
pub const DEFAULT_CONTENT_CACHE_CAPACITY: usize = 256;

type ContentKey = (PathBuf, RevisionId);

#[derive(Default)]
struct Entries {
    map: HashMap<ContentKey, Arc<[u8]>>,
    /// Insertion order, oldest first
    order: VecDeque<ContentKey>,
}

/// Base file contents keyed by path and revision.
///
/// A revision's content never changes, so entries need no expiry. The cache
/// holds at most `capacity` entries and evicts the oldest insert first.
pub struct ContentCache {
    capacity: usize,
    entries: Mutex<Entries>,
}

impl std::fmt::Debug for ContentCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentCache")
            .field("capacity", &self.capacity)
            .field("entries", &self.len())
            .finish()
    }
}

impl Default for ContentCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CONTENT_CACHE_CAPACITY)
    }

    /// A capacity of zero disables caching
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(Entries::default()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, file: &Path, revision: &RevisionId) -> Option<Arc<[u8]>> {
        let key = (file.to_path_buf(), revision.clone());
        self.entries().map.get(&key).cloned()
    }

    pub fn insert(&self, file: &Path, revision: &RevisionId, content: Arc<[u8]>) {
        if self.capacity == 0 {
            return;
        }

        let key = (file.to_path_buf(), revision.clone());
        let mut entries = self.entries();

        if entries.map.insert(key.clone(), content).is_none() {
            entries.order.push_back(key);
        }
        while entries.map.len() > self.capacity {
            let Some(oldest) = entries.order.pop_front() else {
                break;
            };
            entries.map.remove(&oldest);
            trace!(file = %oldest.0.display(), revision = %oldest.1, "Evicted base content");
        }
    }

    /// Cached content, or the result of `load` stored for next time.
    ///
    /// Errors from `load` are returned as-is and nothing is cached. The lock
    /// is not held while `load` runs.
    pub fn get_or_load<E, F>(
        &self,
        file: &Path,
        revision: &RevisionId,
        load: F,
    ) -> Result<Arc<[u8]>, E>
    where
        F: FnOnce() -> Result<Vec<u8>, E>,
    {
        if let Some(content) = self.get(file, revision) {
            trace!(file = %file.display(), revision = %revision, "Base content cache hit");
            return Ok(content);
        }

        let content: Arc<[u8]> = load()?.into();
        self.insert(file, revision, content.clone());
        Ok(content)
    }

    pub fn clear(&self) {
        let mut entries = self.entries();
        entries.map.clear();
        entries.order.clear();
    }

    pub fn len(&self) -> usize {
        self.entries().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
