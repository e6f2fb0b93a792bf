//! Request-scoped key/value store
//!
//! Each in-flight request that entered a scope owns one map of string keys to
//! arbitrary values, keyed by its [`RequestId`]. The scope exists only
//! between [`SharedDataStore::init`] and [`SharedDataStore::drop_scope`].
//! [`ScopeGuard`] ties the two together so the scope is released on every
//! exit path, panics and dropped futures included.
//!
//! Scopes live in one or more independently locked shards. A single shard
//! is one global lock over every request.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Value stored in a request scope
pub type SharedValue = Arc<dyn Any + Send + Sync>;

type Scope = HashMap<String, SharedValue>;
type Shard = Mutex<HashMap<RequestId, Scope>>;

/// Owned identity of an in-flight request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Concurrency-safe container of per-request scopes
#[derive(Clone)]
pub struct SharedDataStore {
    shards: Arc<Vec<Shard>>,
}

impl SharedDataStore {
    /// Create a store guarded by a single lock
    pub fn new() -> Self {
        Self::with_shards(1)
    }

    /// Create a store split into `count` independently locked shards
    pub fn with_shards(count: usize) -> Self {
        let shards = (0..count.max(1)).map(|_| Mutex::new(HashMap::new())).collect();
        Self {
            shards: Arc::new(shards),
        }
    }

    fn shard(&self, id: &RequestId) -> &Shard {
        let index = (id.0.as_u128() % self.shards.len() as u128) as usize;
        &self.shards[index]
    }

    /// Open an empty scope for `id`, a no-op if one is already active
    pub fn init(&self, id: RequestId) {
        self.shard(&id).lock().entry(id).or_default();
    }

    /// Open a scope for a fresh request id, released when the guard drops
    pub fn enter(&self) -> ScopeGuard {
        let id = RequestId::new();
        self.init(id);
        ScopeGuard {
            store: self.clone(),
            id,
        }
    }

    /// Store `value` under `key`.
    ///
    /// # Panics
    ///
    /// Panics when no scope is active for `id`. Inserting outside a scope
    /// means the handler chain is missing its `with_shared_data` layer.
    pub fn insert<T>(&self, id: RequestId, key: impl Into<String>, value: T)
    where
        T: Any + Send + Sync,
    {
        self.insert_shared(id, key, Arc::new(value));
    }

    /// Store an already shared value under `key`, panics like [`Self::insert`]
    pub fn insert_shared(&self, id: RequestId, key: impl Into<String>, value: SharedValue) {
        let key = key.into();
        let mut shard = self.shard(&id).lock();
        if let Some(scope) = shard.get_mut(&id) {
            scope.insert(key, value);
            return;
        }
        drop(shard);
        panic!(
            "shared data insert of '{}' for request {} before init, \
             the handler chain is missing with_shared_data",
            key, id
        );
    }

    /// Look up `key`, `None` if it is absent or no scope is active
    pub fn get(&self, id: RequestId, key: &str) -> Option<SharedValue> {
        self.shard(&id)
            .lock()
            .get(&id)
            .and_then(|scope| scope.get(key))
            .cloned()
    }

    /// Look up `key` and downcast it, `None` on a type mismatch too
    pub fn get_as<T>(&self, id: RequestId, key: &str) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        self.get(id, key)?.downcast::<T>().ok()
    }

    /// Remove `key`, returning the value it held.
    ///
    /// A missing scope is reported as `Error::ScopeNotFound` and leaves the
    /// store untouched.
    pub fn delete(&self, id: RequestId, key: &str) -> Result<SharedValue> {
        let mut shard = self.shard(&id).lock();
        let scope = shard
            .get_mut(&id)
            .ok_or_else(|| Error::ScopeNotFound(id.to_string()))?;
        scope
            .remove(key)
            .ok_or_else(|| Error::KeyNotFound(key.to_string()))
    }

    /// Close the scope for `id`, returns whether one was active
    pub fn drop_scope(&self, id: RequestId) -> bool {
        self.shard(&id).lock().remove(&id).is_some()
    }

    pub fn contains_scope(&self, id: RequestId) -> bool {
        self.shard(&id).lock().contains_key(&id)
    }

    /// Number of scopes currently open across all shards
    pub fn active_scopes(&self) -> usize {
        self.shards.iter().map(|shard| shard.lock().len()).sum()
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }
}

impl Default for SharedDataStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SharedDataStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedDataStore")
            .field("shards", &self.shards.len())
            .field("active_scopes", &self.active_scopes())
            .finish()
    }
}

/// Closes its request scope when dropped
#[must_use = "the scope closes as soon as the guard is dropped"]
pub struct ScopeGuard {
    store: SharedDataStore,
    id: RequestId,
}

impl ScopeGuard {
    pub fn id(&self) -> RequestId {
        self.id
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        self.store.drop_scope(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get_within_scope() {
        let store = SharedDataStore::new();
        let id = RequestId::new();
        store.init(id);

        store.insert(id, "x", 1i32);
        assert_eq!(store.get_as::<i32>(id, "x").as_deref(), Some(&1));
        assert!(store.get(id, "y").is_none());
    }

    #[test]
    #[should_panic(expected = "before init")]
    fn test_insert_before_init_panics() {
        let store = SharedDataStore::new();
        store.insert(RequestId::new(), "x", 1i32);
    }

    #[test]
    fn test_get_without_scope() {
        let store = SharedDataStore::new();
        assert!(store.get(RequestId::new(), "x").is_none());
    }

    #[test]
    fn test_get_as_wrong_type() {
        let store = SharedDataStore::new();
        let id = RequestId::new();
        store.init(id);
        store.insert(id, "x", "text".to_string());
        assert!(store.get_as::<i32>(id, "x").is_none());
        assert_eq!(store.get_as::<String>(id, "x").as_deref().map(String::as_str), Some("text"));
    }

    #[test]
    fn test_delete_key() {
        let store = SharedDataStore::new();
        let id = RequestId::new();
        store.init(id);
        store.insert(id, "x", 1i32);

        let removed = store.delete(id, "x").unwrap();
        assert_eq!(removed.downcast_ref::<i32>(), Some(&1));
        assert!(matches!(store.delete(id, "x"), Err(Error::KeyNotFound(_))));
        assert!(store.contains_scope(id));
    }

    #[test]
    fn test_delete_without_scope_does_not_create_one() {
        let store = SharedDataStore::new();
        let id = RequestId::new();

        let err = store.delete(id, "x").unwrap_err();
        assert!(matches!(err, Error::ScopeNotFound(_)));
        assert!(err.is_not_found());
        assert!(!store.contains_scope(id));
        assert_eq!(store.active_scopes(), 0);
    }

    #[test]
    fn test_drop_scope_is_idempotent() {
        let store = SharedDataStore::new();
        let id = RequestId::new();
        store.init(id);
        store.insert(id, "x", 1i32);

        assert!(store.drop_scope(id));
        assert!(!store.drop_scope(id));
        assert!(store.get(id, "x").is_none());
    }

    #[test]
    fn test_init_keeps_existing_values() {
        let store = SharedDataStore::new();
        let id = RequestId::new();
        store.init(id);
        store.insert(id, "x", 1i32);
        store.init(id);
        assert!(store.get(id, "x").is_some());
    }

    #[test]
    fn test_guard_releases_scope() {
        let store = SharedDataStore::new();
        let id = {
            let guard = store.enter();
            store.insert(guard.id(), "x", 1i32);
            assert_eq!(store.active_scopes(), 1);
            guard.id()
        };
        assert!(!store.contains_scope(id));
        assert_eq!(store.active_scopes(), 0);
    }

    #[test]
    fn test_guard_releases_scope_on_panic() {
        let store = SharedDataStore::new();
        let inner = store.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let guard = inner.enter();
            inner.insert(guard.id(), "x", 1i32);
            panic!("handler failed");
        }));
        assert!(result.is_err());
        assert_eq!(store.active_scopes(), 0);
    }

    #[test]
    fn test_scopes_are_isolated() {
        let store = SharedDataStore::with_shards(4);
        let a = store.enter();
        let b = store.enter();
        store.insert(a.id(), "x", 1i32);
        assert!(store.get(b.id(), "x").is_none());
        assert_eq!(store.active_scopes(), 2);
    }

    #[test]
    fn test_zero_shards_rounds_up() {
        assert_eq!(SharedDataStore::with_shards(0).shard_count(), 1);
        assert_eq!(SharedDataStore::with_shards(8).shard_count(), 8);
    }
}
