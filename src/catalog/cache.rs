//! # Bounded catalog cache
//!
//! Every task of a run measures the same catalog, so parsing it once per task
//! would dominate the cost of small frames. [`CatalogCache`] memoizes parsed
//! catalogs by path in a bounded key-value store with **least-recently-used**
//! eviction.
//!
//! ## Sharing model
//! -----------------
//! Workers are tasks of a single process, so one cache instance is shared by
//! all of them (through an `Arc`). The store sits behind a
//! [`parking_lot::Mutex`] rather than a read/write lock because a hit must
//! also refresh the entry's recency. The file is parsed **outside** the lock:
//! two workers racing on the first load of the same path may both read the
//! file, and the first inserted value wins so every caller still observes one
//! stable `Arc`.
//!
//! ## Guarantees
//! -----------------
//! * Within the capacity bound, a path loaded once is never read again from
//!   storage, and every call returns a clone of the **same** `Arc`
//!   (`Arc::ptr_eq` holds) for the remaining lifetime of the cache.
//! * Beyond the bound, the least-recently-used path is evicted; loading it
//!   again re-reads the file.
//! * Failed loads are not cached.
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use ahash::RandomState;
use parking_lot::Mutex;

use crate::{
    catalog::{load_catalog_file, CatalogEntry},
    constants::DEFAULT_CATALOG_CACHE_CAPACITY,
    ffiphot_errors::FfiphotError,
};

pub type SharedCatalog = Arc<Vec<CatalogEntry>>;

struct CacheSlot {
    catalog: SharedCatalog,
    last_used: u64,
}

struct LruStore {
    slots: HashMap<PathBuf, CacheSlot, RandomState>,
    clock: u64,
}

impl LruStore {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn get(&mut self, path: &Path) -> Option<SharedCatalog> {
        let now = self.tick();
        self.slots.get_mut(path).map(|slot| {
            slot.last_used = now;
            slot.catalog.clone()
        })
    }

    fn evict_lru(&mut self) {
        let oldest = self
            .slots
            .iter()
            .min_by_key(|(_, slot)| slot.last_used)
            .map(|(path, _)| path.clone());
        if let Some(path) = oldest {
            self.slots.remove(&path);
        }
    }
}

/// Memoizing, capacity-bounded catalog loader.
pub struct CatalogCache {
    capacity: usize,
    store: Mutex<LruStore>,
}

impl Default for CatalogCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogCache {
    /// Create a cache retaining up to [`DEFAULT_CATALOG_CACHE_CAPACITY`] catalogs.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CATALOG_CACHE_CAPACITY)
    }

    /// Create a cache retaining up to `capacity` catalogs (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        CatalogCache {
            capacity: capacity.max(1),
            store: Mutex::new(LruStore {
                slots: HashMap::default(),
                clock: 0,
            }),
        }
    }

    /// Load the catalog stored at `path`, reading the file only on a cache miss.
    ///
    /// Arguments
    /// -----------------
    /// * `path`: Catalog CSV path; the path as given is the cache key.
    ///
    /// Return
    /// ----------
    /// * The shared catalog rows, or [`FfiphotError::CatalogLoad`] on a failed miss.
    ///
    /// See also
    /// ------------
    /// * [`load_catalog_file`] – Underlying uncached reader.
    pub fn load(&self, path: &Path) -> Result<SharedCatalog, FfiphotError> {
        if let Some(catalog) = self.store.lock().get(path) {
            return Ok(catalog);
        }

        let loaded = Arc::new(load_catalog_file(path)?);

        let mut store = self.store.lock();
        if let Some(catalog) = store.get(path) {
            return Ok(catalog);
        }
        if store.slots.len() >= self.capacity {
            store.evict_lru();
        }
        let now = store.tick();
        store.slots.insert(
            path.to_path_buf(),
            CacheSlot {
                catalog: loaded.clone(),
                last_used: now,
            },
        );
        Ok(loaded)
    }

    /// Whether `path` is currently retained.
    pub fn contains(&self, path: &Path) -> bool {
        self.store.lock().slots.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.store.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod cache_test {
    use super::*;
    use std::fs;

    fn write_catalog(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, "ra,dec,source_id\n10.0,20.0,1\n").unwrap();
        path
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_catalog(dir.path(), "a.csv");
        let b = write_catalog(dir.path(), "b.csv");
        let c = write_catalog(dir.path(), "c.csv");

        let cache = CatalogCache::with_capacity(2);
        cache.load(&a).unwrap();
        cache.load(&b).unwrap();
        // refresh a, so b becomes the eviction candidate
        cache.load(&a).unwrap();
        cache.load(&c).unwrap();

        assert_eq!(cache.len(), 2);
        assert!(cache.contains(&a));
        assert!(!cache.contains(&b));
        assert!(cache.contains(&c));
    }

    #[test]
    fn test_failed_load_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("late.csv");
        let cache = CatalogCache::new();

        assert!(cache.load(&path).is_err());
        assert!(cache.is_empty());

        write_catalog(dir.path(), "late.csv");
        assert_eq!(cache.load(&path).unwrap().len(), 1);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        assert_eq!(CatalogCache::with_capacity(0).capacity(), 1);
    }
}
