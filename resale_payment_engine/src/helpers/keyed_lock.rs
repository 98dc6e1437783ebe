//! An in-process async mutex per string key.
//!
//! Reconciliation of a gateway payment must be serialized per `(provider, external id)`. Database constraints keep
//! concurrent writers from corrupting state, but waiting on a key-specific lock first means duplicate deliveries of
//! the same notification queue up behind each other instead of fighting over the database write lock.
//!
//! Entries are removed as soon as nobody holds or waits on them, so the map only grows with the number of keys that
//! are in flight. A waiter that gives up (its future is dropped) after the holder has released can leave its entry
//! behind. Such entries are swept on the next call to [`KeyedLock::lock`].
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Default)]
pub struct KeyedLock {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

/// Holds the lock for a key until dropped.
#[derive(Debug)]
pub struct KeyedLockGuard {
    key: String,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl KeyedLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no one else holds the lock for `key`, then takes it.
    pub async fn lock(&self, key: &str) -> KeyedLockGuard {
        self.locks.retain(|_, mutex| Arc::strong_count(mutex) > 1);
        let mutex = Arc::clone(&self.locks.entry(key.to_string()).or_default());
        let guard = mutex.lock_owned().await;
        KeyedLockGuard { key: key.to_string(), locks: Arc::clone(&self.locks), guard: Some(guard) }
    }

    /// The number of keys currently held or waited on.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl Drop for KeyedLockGuard {
    fn drop(&mut self) {
        // Release first, so that the map holds the only remaining reference if there are no waiters
        drop(self.guard.take());
        self.locks.remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
