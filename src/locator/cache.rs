//! Load-once caching of template groups
//!
//! Every key owns a slot behind its own lock. Hits share the lock for reading.
//! The first caller for an empty key holds the slot for writing while it
//! loads, so concurrent callers for the same key wait for that load instead
//! of repeating it, and callers for other keys never wait at all. Only
//! successful loads are stored; a failed load discards its slot.

use std::fmt;
use std::hash::Hash;
use std::sync::{
    Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, TryLockError,
};

use dashmap::DashMap;

use super::identity::Locator;
use crate::template::TemplateGroup;

type Slot<V> = Arc<RwLock<Option<Arc<V>>>>;

/// Concurrent map whose values are produced at most once per key
pub struct LoadOnceMap<K, V> {
    slots: DashMap<K, Slot<V>>,
}

/// Cache of parsed template groups keyed by where they were loaded from
pub type GroupCache = LoadOnceMap<Locator, TemplateGroup>;

impl<K, V> LoadOnceMap<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    /// Get the value for `key`, running `load` if there is none yet
    ///
    /// With `use_cache` off, `load` runs on every call and nothing is stored.
    /// A failed or panicking load leaves the key empty, so the next call
    /// tries again.
    pub fn get_or_load<E, F>(&self, key: &K, use_cache: bool, load: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if !use_cache {
            tracing::debug!(?key, "cache bypassed, loading");
            return load().map(Arc::new);
        }

        loop {
            // Clone the slot out so the map shard is unlocked while loading
            let slot = self.slots.entry(key.clone()).or_default().value().clone();

            if let Some(value) = read(&slot).as_ref() {
                tracing::trace!(?key, "cache hit");
                return Ok(Arc::clone(value));
            }

            let mut guard = write(&slot);
            if let Some(value) = guard.as_ref() {
                tracing::trace!(?key, "cache hit after wait");
                return Ok(Arc::clone(value));
            }
            // a failed load removed this slot while we waited for it
            if !self.is_current(key, &slot) {
                continue;
            }

            tracing::debug!(?key, "cache miss, loading");
            return match load() {
                Ok(value) => {
                    let value = Arc::new(value);
                    *guard = Some(Arc::clone(&value));
                    Ok(value)
                }
                Err(err) => {
                    self.slots
                        .remove_if(key, |_, current| Arc::ptr_eq(current, &slot));
                    Err(err)
                }
            };
        }
    }

    /// Cached value for `key`, waiting for a load in progress
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        let slot = self.slots.get(key).map(|slot| slot.value().clone())?;
        let guard = read(&slot);
        guard.as_ref().map(Arc::clone)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Number of loaded values; loads still in progress are not counted
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|entry| is_filled(entry.value()))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_current(&self, key: &K, slot: &Slot<V>) -> bool {
        self.slots
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current.value(), slot))
    }
}

fn is_filled<V>(slot: &RwLock<Option<Arc<V>>>) -> bool {
    // only a load holds the write lock, and a slot being loaded is empty
    match slot.try_read() {
        Ok(guard) => guard.is_some(),
        Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().is_some(),
        Err(TryLockError::WouldBlock) => false,
    }
}

// A panicking loader never stores a value, so a poisoned slot is still consistent
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl<K, V> Default for LoadOnceMap<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for LoadOnceMap<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadOnceMap")
            .field("len", &self.len())
            .finish()
    }
}
