use std::{
    collections::HashMap,
    hash::Hash,
    sync::{Arc, RwLock, RwLockWriteGuard},
};

use crate::{error::DbError, utils::HandyRwLock};

// Type alias, not a new type, cannot define methods on it
pub type Pod<T> = Arc<RwLock<T>>;

pub type ResultPod<T> = Result<Pod<T>, DbError>;
pub type DbResult = Result<(), DbError>;

/// A `HashMap` behind a `RwLock`.
///
/// Point lookups and single-key updates go through the helper methods;
/// compound operations (e.g. "evict then insert") take the inner lock
/// directly so they stay atomic.
pub struct ConcurrentHashMap<K, V> {
    inner: RwLock<HashMap<K, V>>,
}

impl<K: Eq + Hash + Clone, V: Clone> ConcurrentHashMap<K, V> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Hand out the inner write guard for compound operations that
    /// must stay atomic (lookup-evict-install in the page cache).
    pub fn get_inner_wl(&self) -> RwLockWriteGuard<'_, HashMap<K, V>> {
        self.inner.wl()
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.rl().get(key).cloned()
    }

    pub fn insert(&self, key: K, value: V) {
        self.inner.wl().insert(key, value);
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.inner.wl().remove(key)
    }

    pub fn clear(&self) {
        self.inner.wl().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.rl().len()
    }

    pub fn keys(&self) -> Vec<K> {
        self.inner.rl().keys().cloned().collect()
    }
}
