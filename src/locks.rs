//! Process-local mutual exclusion keyed by website id.
//!
//! Teardown and subscription updates for the same website take the same lock,
//! so they never interleave inside this process. Entries are dropped once the
//! last holder or waiter lets go.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

type LockMap = HashMap<Uuid, Arc<AsyncMutex<()>>>;

#[derive(Clone, Default)]
pub struct TenantLocks {
    inner: Arc<Mutex<LockMap>>,
}

pub struct TenantGuard {
    website_id: Uuid,
    lock: Arc<AsyncMutex<()>>,
    registry: Arc<Mutex<LockMap>>,
    _guard: OwnedMutexGuard<()>,
}

impl TenantLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, website_id: Uuid) -> TenantGuard {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            map.entry(website_id).or_default().clone()
        };
        let guard = lock.clone().lock_owned().await;
        TenantGuard {
            website_id,
            lock,
            registry: self.inner.clone(),
            _guard: guard,
        }
    }

    #[cfg(test)]
    fn try_lock(&self, website_id: Uuid) -> Option<TenantGuard> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            map.entry(website_id).or_default().clone()
        };
        let guard = lock.clone().try_lock_owned().ok()?;
        Some(TenantGuard {
            website_id,
            lock,
            registry: self.inner.clone(),
            _guard: guard,
        })
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Drop for TenantGuard {
    fn drop(&mut self) {
        let mut map = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        // Map entry, our handle, and the handle inside the owned guard.
        if Arc::strong_count(&self.lock) <= 3 {
            map.remove(&self.website_id);
        }
    }
}
