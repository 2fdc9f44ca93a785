//! Process-wide state shared by every scoring context.

use std::fmt;
use std::sync::OnceLock;

use moka::sync::Cache;

use crate::expression::Value;

/// Default number of entries kept by a [`GlobalStateStore`].
pub const DEFAULT_GLOBAL_STATE_CAPACITY: u64 = 100_000;

/// Bounded concurrent key/value store. Concurrent writers to one key resolve
/// last-write-wins; entries beyond the capacity are evicted.
#[derive(Clone)]
pub struct GlobalStateStore {
    entries: Cache<String, Value>,
    capacity: u64,
}

impl GlobalStateStore {
    /// Create a store holding at most `capacity` entries.
    pub fn new(capacity: u64) -> Self {
        GlobalStateStore {
            entries: Cache::new(capacity),
            capacity,
        }
    }

    /// Process-wide store used by queries that are not given their own.
    pub fn shared() -> GlobalStateStore {
        static STORE: OnceLock<GlobalStateStore> = OnceLock::new();
        STORE.get_or_init(GlobalStateStore::default).clone()
    }

    /// Get a value.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.get(key)
    }

    /// Set a value.
    pub fn set<S: Into<String>>(&self, key: S, value: Value) {
        self.entries.insert(key.into(), value);
    }

    /// Remove a value.
    pub fn remove(&self, key: &str) {
        self.entries.invalidate(key);
    }

    /// Remove every value.
    pub fn clear(&self) {
        self.entries.invalidate_all();
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Approximate number of entries.
    pub fn len(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }

    /// Check if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for GlobalStateStore {
    fn default() -> Self {
        Self::new(DEFAULT_GLOBAL_STATE_CAPACITY)
    }
}

impl fmt::Debug for GlobalStateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalStateStore")
            .field("capacity", &self.capacity)
            .field("entries", &self.entries.entry_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get() {
        let store = GlobalStateStore::default();
        assert_eq!(store.capacity(), DEFAULT_GLOBAL_STATE_CAPACITY);
        assert!(store.get("k").is_none());

        store.set("k", Value::Int(1));
        store.set("k", Value::Int(2));
        assert_eq!(store.get("k"), Some(Value::Int(2)));
        assert_eq!(store.len(), 1);

        store.remove("k");
        assert!(store.get("k").is_none());
    }

    #[test]
    fn test_clones_share_entries() {
        let store = GlobalStateStore::new(16);
        let other = store.clone();
        other.set("shared", Value::from("yes"));
        assert_eq!(store.get("shared"), Some(Value::from("yes")));
    }

    #[test]
    fn test_capacity_bound() {
        let store = GlobalStateStore::new(8);
        for i in 0..100 {
            store.set(format!("k{i}"), Value::Int(i));
        }
        assert!(store.len() <= 8);
    }

    #[test]
    fn test_shared_store() {
        GlobalStateStore::shared().set("shared_store_key", Value::Int(7));
        assert_eq!(
            GlobalStateStore::shared().get("shared_store_key"),
            Some(Value::Int(7))
        );
    }
}
