use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Thread-safe map from a key to an ordered, append-only sequence of values.
///
/// Each `put` holds the write lock for exactly one append, so a concurrent
/// `get` sees either the whole append or none of it. Values under one key keep
/// the order in which their `put` calls acquired the lock.
#[derive(Debug)]
pub struct ConcurrentMultiMap<K, V> {
    inner: RwLock<HashMap<K, Vec<V>>>,
}

impl<K, V> Default for ConcurrentMultiMap<K, V> {
    fn default() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> ConcurrentMultiMap<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the values under `key`, or `None` if nothing was ever put there
    pub fn get(&self, key: &K) -> Option<Vec<V>> {
        self.read().get(key).cloned()
    }

    /// Append `value` to the sequence under `key`, creating it if absent
    pub fn put(&self, key: K, value: V) {
        self.write().entry(key).or_default().push(value);
    }

    /// Append all `values` under `key` inside one critical section
    pub fn put_all<I>(&self, key: K, values: I)
    where
        I: IntoIterator<Item = V>,
    {
        self.write().entry(key).or_default().extend(values);
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.read().contains_key(key)
    }

    /// Number of values stored under `key`
    pub fn len_of(&self, key: &K) -> usize {
        self.read().get(key).map_or(0, Vec::len)
    }

    /// Number of distinct keys
    pub fn key_count(&self) -> usize {
        self.read().len()
    }

    // Every critical section is a single append or clone, so a panic while
    // holding the lock cannot leave a half-written sequence behind.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<K, Vec<V>>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<K, Vec<V>>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}
