use lru::LruCache;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::{ErrorKind, StrataError, StrataResult};

type Entry = Arc<dyn Any + Send + Sync>;

/// How a cached entry may be reclaimed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CachePolicy {
    /// Dropped least-recently-used first once the catalog is over capacity.
    Evictable,
    /// Kept until explicitly unpersisted.
    Pinned,
}

/// Name-tagged cache of materialized results shared by a session.
///
/// The catalog is cheaply cloneable; clones share the same entries.
#[derive(Clone)]
pub struct CacheCatalog {
    inner: Arc<CatalogInner>,
}

struct CatalogInner {
    capacity: usize,
    state: Mutex<CatalogState>,
}

struct CatalogState {
    evictable: LruCache<String, Entry>,
    pinned: HashMap<String, Entry>,
}

impl CacheCatalog {
    pub fn new(capacity: usize) -> CacheCatalog {
        CacheCatalog {
            inner: Arc::new(CatalogInner {
                capacity: capacity.max(1),
                state: Mutex::new(CatalogState {
                    evictable: LruCache::unbounded(),
                    pinned: HashMap::new(),
                }),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Stores `value` under `name`, replacing any previous entry of that name.
    pub fn persist<V>(&self, name: &str, value: V, policy: CachePolicy)
    where
        V: Any + Send + Sync,
    {
        let entry: Entry = Arc::new(value);
        let mut state = self.inner.state.lock();
        state.evictable.pop(name);
        state.pinned.remove(name);
        match policy {
            CachePolicy::Evictable => {
                state.evictable.put(name.to_string(), entry);
            }
            CachePolicy::Pinned => {
                state.pinned.insert(name.to_string(), entry);
            }
        }

        while state.evictable.len() + state.pinned.len() > self.inner.capacity {
            match state.evictable.pop_lru() {
                Some((evicted, _)) => log::debug!("Evicted {} from cache", evicted),
                None => {
                    log::warn!(
                        "Cache holds {} pinned entries, above its capacity of {}",
                        state.pinned.len(),
                        self.inner.capacity
                    );
                    break;
                }
            }
        }
    }

    /// Returns a clone of the entry under `name`, or `None` if it is absent or
    /// holds a different type.
    pub fn get<V>(&self, name: &str) -> Option<V>
    where
        V: Any + Clone,
    {
        let entry = self.entry(name)?;
        let value = entry.downcast_ref::<V>().cloned();
        if value.is_none() {
            log::warn!("Cache entry {} does not hold the requested type", name);
        }
        value
    }

    /// Like [`CacheCatalog::get`] but reports a miss as a `CacheError`.
    pub fn fetch<V>(&self, name: &str) -> StrataResult<V>
    where
        V: Any + Clone,
    {
        let entry = self.entry(name).ok_or_else(|| {
            StrataError::new(
                &format!("No cache entry named {}", name),
                ErrorKind::CacheError,
            )
        })?;
        entry.downcast_ref::<V>().cloned().ok_or_else(|| {
            StrataError::new(
                &format!("Cache entry {} does not hold the requested type", name),
                ErrorKind::CacheError,
            )
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        let state = self.inner.state.lock();
        state.pinned.contains_key(name) || state.evictable.contains(name)
    }

    /// Removes the entry under `name`; returns whether one existed.
    pub fn unpersist(&self, name: &str) -> bool {
        let mut state = self.inner.state.lock();
        let pinned = state.pinned.remove(name).is_some();
        let evictable = state.evictable.pop(name).is_some();
        pinned || evictable
    }

    /// Names of all entries, sorted.
    pub fn names(&self) -> Vec<String> {
        let state = self.inner.state.lock();
        let mut names: Vec<String> = state
            .pinned
            .keys()
            .cloned()
            .chain(state.evictable.iter().map(|(k, _)| k.clone()))
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        let state = self.inner.state.lock();
        state.pinned.len() + state.evictable.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut state = self.inner.state.lock();
        state.pinned.clear();
        state.evictable.clear();
    }

    fn entry(&self, name: &str) -> Option<Entry> {
        let mut state = self.inner.state.lock();
        if let Some(entry) = state.pinned.get(name) {
            return Some(entry.clone());
        }
        state.evictable.get(name).cloned()
    }
}

impl std::fmt::Debug for CacheCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheCatalog")
            .field("capacity", &self.inner.capacity)
            .field("entries", &self.names())
            .finish()
    }
}
