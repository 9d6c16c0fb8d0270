use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// A set of async mutexes addressed by string key, created on first use.
///
/// Used to serialize work per watched account (polling) and per asset
/// (trust establishment).
#[derive(Default, Clone)]
pub struct KeyedLocks {
    inner: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        map.entry(key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Waits until the lock for `key` is free.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        self.slot(key).lock_owned().await
    }

    /// Returns `None` when another task holds the lock for `key`.
    pub fn try_lock(&self, key: &str) -> Option<OwnedMutexGuard<()>> {
        self.slot(key).try_lock_owned().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let locks = KeyedLocks::new();
        let guard = locks.lock("GACCOUNT").await;
        assert!(locks.try_lock("GACCOUNT").is_none());
        assert!(locks.try_lock("GOTHER").is_some());
        drop(guard);
        assert!(locks.try_lock("GACCOUNT").is_some());
    }

    #[tokio::test]
    async fn test_clones_share_locks() {
        let locks = KeyedLocks::new();
        let other = locks.clone();
        let _guard = locks.lock("USD").await;
        assert!(other.try_lock("USD").is_none());
    }
}
