use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

use crate::clock::{Clock, SystemClock};

/// How long a root answer stays valid after its last access
pub const DEFAULT_ROOT_CACHE_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    is_root: bool,
    expires_at: Instant,
}

/// Memoized "is this directory a VCS root" answers.
///
/// Running the tool is slow, so every miss caches the answer for the whole
/// path walked from the queried directory up to the resolved root. Entries
/// use sliding expiry: each hit pushes `expires_at` forward by the TTL.
///
/// Safe to share between threads. The lock is never held while the
/// resolver runs, so concurrent misses may resolve the same directory twice.
pub struct RootCache {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<PathBuf, CacheEntry>>,
}

impl std::fmt::Debug for RootCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RootCache")
            .field("ttl", &self.ttl)
            .field("entries", &self.len())
            .finish()
    }
}

impl Default for RootCache {
    fn default() -> Self {
        Self::new()
    }
}

impl RootCache {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_ROOT_CACHE_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            clock: Arc::new(SystemClock),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<PathBuf, CacheEntry>> {
        // Entries are plain values; a panicking holder cannot leave one half-written
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cached answer for `dir`, if present and not expired.
    ///
    /// A hit refreshes the entry's expiry. An expired entry is dropped.
    pub fn get(&self, dir: &Path) -> Option<bool> {
        let now = self.clock.now();
        let mut entries = self.entries();

        match entries.get_mut(dir) {
            Some(entry) if entry.expires_at > now => {
                entry.expires_at = now + self.ttl;
                Some(entry.is_root)
            }
            Some(_) => {
                entries.remove(dir);
                trace!(dir = %dir.display(), "Root cache entry expired");
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, dir: &Path, is_root: bool) {
        let expires_at = self.clock.now() + self.ttl;
        self.entries()
            .insert(dir.to_path_buf(), CacheEntry { is_root, expires_at });
    }

    /// Check whether `dir` is a VCS root, consulting `resolve` on a miss.
    ///
    /// `resolve` is called at most once, for `dir` only, and returns the
    /// root that contains `dir` (or `None`). The answer is then written for
    /// every directory from `dir` up to that root: `false` below it, `true`
    /// for the root itself. Without a containing root, `dir` and all its
    /// ancestors are cached as `false`.
    pub fn is_root<F>(&self, dir: &Path, resolve: F) -> bool
    where
        F: FnOnce(&Path) -> Option<PathBuf>,
    {
        if let Some(cached) = self.get(dir) {
            trace!(dir = %dir.display(), is_root = cached, "Root cache hit");
            return cached;
        }

        let resolved = resolve(dir);
        debug!(
            dir = %dir.display(),
            root = ?resolved,
            "Root cache miss, resolved VCS root"
        );

        // Relative paths end their ancestor chain with "", which is not a directory
        let ancestors = dir.ancestors().filter(|p| !p.as_os_str().is_empty());

        if let Some(root) = resolved {
            for ancestor in ancestors {
                let is_root = ancestor == root.as_path();
                self.insert(ancestor, is_root);
                if is_root {
                    return true;
                }
            }
            warn!(
                dir = %dir.display(),
                root = %root.display(),
                "Resolved root does not contain the queried directory"
            );
            return false;
        }

        for ancestor in ancestors {
            self.insert(ancestor, false);
        }
        false
    }

    /// Forget the answer for one directory
    pub fn invalidate(&self, dir: &Path) -> bool {
        self.entries().remove(dir).is_some()
    }

    pub fn clear(&self) {
        self.entries().clear();
    }

    /// Number of stored entries, expired ones included until purged
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn cache_with_clock(ttl: Duration) -> (RootCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let cache = RootCache::with_ttl(ttl).with_clock(clock.clone());
        (cache, clock)
    }

    #[test]
    fn test_hit_skips_resolver() {
        let (cache, _clock) = cache_with_clock(DEFAULT_ROOT_CACHE_TTL);
        let calls = AtomicUsize::new(0);
        let resolve = |_: &Path| {
            calls.fetch_add(1, Ordering::SeqCst);
            Some(PathBuf::from("/repo"))
        };

        assert!(cache.is_root(Path::new("/repo"), resolve));
        assert!(cache.is_root(Path::new("/repo"), resolve));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_expired_entry_resolves_again_once() {
        let (cache, clock) = cache_with_clock(Duration::from_secs(60));
        let calls = AtomicUsize::new(0);
        let resolve = |_: &Path| {
            calls.fetch_add(1, Ordering::SeqCst);
            Some(PathBuf::from("/repo"))
        };

        cache.is_root(Path::new("/repo"), resolve);
        clock.advance(Duration::from_secs(61));
        cache.is_root(Path::new("/repo"), resolve);
        cache.is_root(Path::new("/repo"), resolve);

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_access_slides_expiry() {
        let (cache, clock) = cache_with_clock(Duration::from_secs(60));
        cache.insert(Path::new("/repo"), true);

        clock.advance(Duration::from_secs(40));
        assert_eq!(cache.get(Path::new("/repo")), Some(true));

        // 80s after insert, but only 40s after last access
        clock.advance(Duration::from_secs(40));
        assert_eq!(cache.get(Path::new("/repo")), Some(true));

        clock.advance(Duration::from_secs(61));
        assert_eq!(cache.get(Path::new("/repo")), None);
    }

    #[test]
    fn test_miss_populates_path_up_to_root() {
        let (cache, _clock) = cache_with_clock(DEFAULT_ROOT_CACHE_TTL);

        let is_root = cache.is_root(Path::new("/work/repo/src/module"), |_| {
            Some(PathBuf::from("/work/repo"))
        });

        assert!(!is_root);
        assert_eq!(cache.get(Path::new("/work/repo/src/module")), Some(false));
        assert_eq!(cache.get(Path::new("/work/repo/src")), Some(false));
        assert_eq!(cache.get(Path::new("/work/repo")), Some(true));
        // The walk stops at the root; an outer checkout may still own /work
        assert_eq!(cache.get(Path::new("/work")), None);
    }

    #[test]
    fn test_sibling_query_hits_populated_root() {
        let (cache, _clock) = cache_with_clock(DEFAULT_ROOT_CACHE_TTL);
        let calls = AtomicUsize::new(0);
        let resolve = |_: &Path| {
            calls.fetch_add(1, Ordering::SeqCst);
            Some(PathBuf::from("/work/repo"))
        };

        cache.is_root(Path::new("/work/repo/src"), resolve);
        assert!(cache.is_root(Path::new("/work/repo"), resolve));
        assert!(!cache.is_root(Path::new("/work/repo/src"), resolve));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_no_root_caches_all_ancestors_false() {
        let (cache, _clock) = cache_with_clock(DEFAULT_ROOT_CACHE_TTL);

        assert!(!cache.is_root(Path::new("/tmp/scratch/dir"), |_| None));

        assert_eq!(cache.get(Path::new("/tmp/scratch/dir")), Some(false));
        assert_eq!(cache.get(Path::new("/tmp/scratch")), Some(false));
        assert_eq!(cache.get(Path::new("/tmp")), Some(false));
        assert_eq!(cache.get(Path::new("/")), Some(false));
    }

    #[test]
    fn test_unrelated_root_is_not_a_hit() {
        let (cache, _clock) = cache_with_clock(DEFAULT_ROOT_CACHE_TTL);

        assert!(!cache.is_root(Path::new("/a/b"), |_| Some(PathBuf::from("/elsewhere"))));
        assert_eq!(cache.get(Path::new("/a/b")), Some(false));
        assert_eq!(cache.get(Path::new("/elsewhere")), None);
    }

    #[test]
    fn test_walk_overwrites_stale_ancestor_answers() {
        let (cache, _clock) = cache_with_clock(DEFAULT_ROOT_CACHE_TTL);
        cache.insert(Path::new("/work/repo/src"), true);

        cache.is_root(Path::new("/work/repo/src/deep"), |_| {
            Some(PathBuf::from("/work/repo"))
        });

        assert_eq!(cache.get(Path::new("/work/repo/src")), Some(false));
        assert_eq!(cache.get(Path::new("/work/repo")), Some(true));
    }

    #[test]
    fn test_relative_paths_skip_empty_ancestor() {
        let (cache, _clock) = cache_with_clock(DEFAULT_ROOT_CACHE_TTL);
        cache.is_root(Path::new("rel/dir"), |_| None);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_invalidate_and_purge() {
        let (cache, clock) = cache_with_clock(Duration::from_secs(10));
        cache.insert(Path::new("/a"), true);
        cache.insert(Path::new("/b"), false);

        assert!(cache.invalidate(Path::new("/a")));
        assert!(!cache.invalidate(Path::new("/a")));
        assert_eq!(cache.len(), 1);

        clock.advance(Duration::from_secs(11));
        assert_eq!(cache.purge_expired(), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_access() {
        let cache = Arc::new(RootCache::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = cache.clone();
                let calls = calls.clone();
                std::thread::spawn(move || {
                    let dir = PathBuf::from(format!("/repo/dir{}", i % 2));
                    for _ in 0..50 {
                        let is_root = cache.is_root(&dir, |_| {
                            calls.fetch_add(1, Ordering::SeqCst);
                            Some(PathBuf::from("/repo"))
                        });
                        assert!(!is_root);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.get(Path::new("/repo")), Some(true));
        // Racing misses may duplicate work, but never per repeated query
        assert!(calls.load(Ordering::SeqCst) <= 8);
    }
}
