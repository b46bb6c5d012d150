use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Weak};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async mutex per key, created on demand.
///
/// Entries are held weakly; a key's mutex lives as long as someone holds or
/// waits for it.
pub struct KeyedLocks<K> {
    locks: Mutex<HashMap<K, Weak<AsyncMutex<()>>>>,
}

impl<K> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash> KeyedLocks<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, key: K) -> OwnedMutexGuard<()> {
        self.entry(key).lock_owned().await
    }

    fn entry(&self, key: K) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock();

        if locks.len() > 128 {
            locks.retain(|_, weak| weak.strong_count() > 0);
        }

        if let Some(existing) = locks.get(&key).and_then(Weak::upgrade) {
            return existing;
        }

        let lock = Arc::new(AsyncMutex::new(()));
        locks.insert(key, Arc::downgrade(&lock));
        lock
    }

    /// Number of keys currently locked or awaited.
    pub fn live_keys(&self) -> usize {
        self.locks
            .lock()
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(user: &str, card: &str) -> (String, String) {
        (user.to_string(), card.to_string())
    }

    #[tokio::test]
    async fn same_key_shares_one_mutex() {
        let locks = KeyedLocks::new();
        let guard = locks.lock(key("u", "a")).await;
        assert!(locks.entry(key("u", "a")).try_lock().is_err());
        assert!(locks.entry(key("u", "b")).try_lock().is_ok());
        drop(guard);
        assert!(locks.entry(key("u", "a")).try_lock().is_ok());
    }

    #[tokio::test]
    async fn ids_containing_slashes_do_not_collide() {
        let locks = KeyedLocks::new();
        let _guard = locks.lock(key("a/b", "c")).await;
        assert!(locks.entry(key("a", "b/c")).try_lock().is_ok());
        assert!(locks.entry(key("a/b", "c")).try_lock().is_err());
    }

    #[tokio::test]
    async fn released_keys_are_not_live() {
        let locks = KeyedLocks::new();
        {
            let _g = locks.lock("k").await;
            assert_eq!(locks.live_keys(), 1);
        }
        assert_eq!(locks.live_keys(), 0);
    }
}
