//! Per-record exclusive locks serialising writes to the same target.
//!
//! The registry lives in process memory. Entries are created on first use and
//! removed when the last guard or waiter for a target goes away, so the map
//! only holds records that are currently being written.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::domain::TargetRef;

type LockMap = HashMap<TargetRef, Arc<AsyncMutex<()>>>;

/// Registry of per-target locks shared by intake and moderation.
#[derive(Debug, Clone, Default)]
pub struct TargetLocks {
    entries: Arc<Mutex<LockMap>>,
}

impl TargetLocks {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `target`.
    pub async fn acquire(&self, target: &TargetRef) -> TargetGuard {
        let lock = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(entries.entry(target.clone()).or_default())
        };
        let guard = lock.lock_owned().await;
        TargetGuard {
            target: target.clone(),
            entries: Arc::clone(&self.entries),
            guard: Some(guard),
        }
    }

    /// Number of targets with a live holder or waiter.
    #[must_use]
    pub fn active(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Exclusive hold on one target; released on drop.
#[derive(Debug)]
pub struct TargetGuard {
    target: TargetRef,
    entries: Arc<Mutex<LockMap>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl TargetGuard {
    /// Target this guard protects.
    #[must_use]
    pub const fn target(&self) -> &TargetRef {
        &self.target
    }
}

impl Drop for TargetGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let idle = entries
            .get(&self.target)
            .is_some_and(|lock| Arc::strong_count(lock) == 1);
        if idle {
            entries.remove(&self.target);
        }
    }
}
