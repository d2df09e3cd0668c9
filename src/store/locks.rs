//! Per-key async locks
//!
//! Services take the lock for a member key before reading it and hold it until the
//! write lands, so two commands for the same member never interleave.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Lazily created mutex per key
#[derive(Clone, Default)]
pub struct KeyLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl KeyLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        // Clone the Arc out so the map shard is released before awaiting.
        let mutex = Arc::clone(&self.locks.entry(key.to_string()).or_default());
        mutex.lock_owned().await
    }

    /// Number of keys that have ever been locked
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
