//! Per-key lock registry for the local backend.
//!
//! Each `(category, filename)` key maps to an exclusive async lock plus the
//! number of operations currently holding or waiting for it. Entries are
//! created on first use and removed when that count drops to zero, so the
//! registry only ever holds keys with in-flight operations. The map itself is
//! guarded by a short-held synchronous mutex that is never held across an
//! `.await`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

struct LockEntry {
    lock: Arc<AsyncMutex<()>>,
    holders: usize,
}

#[derive(Default)]
pub struct KeyLockRegistry {
    entries: Mutex<HashMap<String, LockEntry>>,
}

impl KeyLockRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, LockEntry>> {
        // The map is always left consistent, so a poisoned guard is still usable.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait for exclusive access to `key`.
    ///
    /// Dropping the returned guard releases the key. Cancelling the returned
    /// future while it waits also releases its claim on the registry entry.
    pub async fn acquire(self: &Arc<Self>, key: &str) -> KeyGuard {
        let (lock, lease) = {
            let mut entries = self.entries();
            let entry = entries.entry(key.to_string()).or_insert_with(|| LockEntry {
                lock: Arc::new(AsyncMutex::new(())),
                holders: 0,
            });
            entry.holders += 1;
            (
                entry.lock.clone(),
                Lease {
                    registry: self.clone(),
                    key: key.to_string(),
                },
            )
        };

        let guard = lock.lock_owned().await;
        KeyGuard {
            _guard: guard,
            _lease: lease,
        }
    }

    /// Number of keys with at least one in-flight operation.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn release(&self, key: &str) {
        let mut entries = self.entries();
        if let Some(entry) = entries.get_mut(key) {
            entry.holders -= 1;
            if entry.holders == 0 {
                entries.remove(key);
            }
        }
    }
}

/// A registered interest in a key; released on drop.
struct Lease {
    registry: Arc<KeyLockRegistry>,
    key: String,
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.registry.release(&self.key);
    }
}

/// Exclusive access to one key. Fields drop in order: unlock, then release.
pub struct KeyGuard {
    _guard: OwnedMutexGuard<()>,
    _lease: Lease,
}
