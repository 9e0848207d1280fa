//! Cross-instance sync lock stored in the session store.
//!
//! One record `{timestamp, instanceId}` under `sync_lock`. A record older than
//! the timeout is stale and may be seized by anyone.

use std::sync::Arc;
use std::time::Duration;

use hsync_core::{now_millis, HsyncError, HsyncResult};
use hsync_storage::{keys, KvStore, KvStoreExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Default staleness timeout (5 minutes)
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(300_000);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockRecord {
    pub timestamp: i64,
    pub instance_id: String,
}

#[derive(Clone)]
pub struct SyncLock {
    store: Arc<dyn KvStore>,
    instance_id: String,
    timeout: Duration,
}

impl SyncLock {
    /// New lock handle with a random instance id.
    pub fn new(store: Arc<dyn KvStore>, timeout: Duration) -> Self {
        Self::with_instance_id(store, uuid::Uuid::new_v4().to_string(), timeout)
    }

    pub fn with_instance_id(
        store: Arc<dyn KvStore>,
        instance_id: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            instance_id: instance_id.into(),
            timeout,
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    fn is_stale(&self, record: &LockRecord, now: i64) -> bool {
        now.saturating_sub(record.timestamp) >= self.timeout.as_millis() as i64
    }

    /// The stored record. One that does not parse is reported as expired.
    async fn load(&self) -> HsyncResult<Option<LockRecord>> {
        match self.store.get_json::<LockRecord>(keys::SYNC_LOCK).await {
            Err(HsyncError::Format(msg)) => {
                warn!(error = %msg, "unreadable sync lock record; treating as stale");
                Ok(Some(LockRecord {
                    timestamp: 0,
                    instance_id: String::new(),
                }))
            }
            other => other,
        }
    }

    async fn read(&self) -> Option<LockRecord> {
        match self.load().await {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "sync lock read failed; treating as absent");
                None
            }
        }
    }

    /// Try to take the lock. Re-acquiring a lock this instance holds succeeds
    /// and refreshes it. Storage failures report `false`.
    pub async fn acquire(&self) -> bool {
        let now = now_millis();
        let current = match self.load().await {
            Ok(current) => current,
            Err(e) => {
                warn!(error = %e, "sync lock read failed");
                return false;
            }
        };

        if let Some(held) = &current {
            if !self.is_stale(held, now) && held.instance_id != self.instance_id {
                debug!(holder = %held.instance_id, "sync lock held by another instance");
                return false;
            }
            if self.is_stale(held, now) && held.instance_id != self.instance_id {
                warn!(
                    holder = %held.instance_id,
                    age_ms = now - held.timestamp,
                    "seizing stale sync lock"
                );
            }
        }

        let record = LockRecord {
            timestamp: now,
            instance_id: self.instance_id.clone(),
        };
        match self.store.set_json(keys::SYNC_LOCK, &record).await {
            Ok(()) => {
                debug!(instance = %self.instance_id, "sync lock acquired");
                true
            }
            Err(e) => {
                warn!(error = %e, "sync lock write failed");
                false
            }
        }
    }

    /// Release the lock if this instance holds it.
    pub async fn release(&self) {
        match self.read().await {
            Some(held) if held.instance_id == self.instance_id => {
                if let Err(e) = self.store.remove(keys::SYNC_LOCK).await {
                    warn!(error = %e, "sync lock release failed");
                } else {
                    debug!(instance = %self.instance_id, "sync lock released");
                }
            }
            Some(held) => {
                debug!(holder = %held.instance_id, "not releasing a lock held by another instance");
            }
            None => {}
        }
    }

    /// Whether a non-expired lock exists. An expired or unreadable record is
    /// deleted.
    pub async fn is_locked(&self) -> bool {
        let Some(held) = self.read().await else {
            return false;
        };
        if self.is_stale(&held, now_millis()) {
            if let Err(e) = self.store.remove(keys::SYNC_LOCK).await {
                warn!(error = %e, "failed to remove expired sync lock");
            }
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hsync_storage::OpendalStore;

    fn store() -> Arc<dyn KvStore> {
        Arc::new(OpendalStore::memory().unwrap())
    }

    #[tokio::test]
    async fn test_acquire_is_reentrant() {
        let lock = SyncLock::new(store(), DEFAULT_LOCK_TIMEOUT);
        assert!(lock.acquire().await);
        assert!(lock.acquire().await);
        assert!(lock.is_locked().await);
    }

    #[tokio::test]
    async fn test_contention_between_instances() {
        let shared = store();
        let a = SyncLock::with_instance_id(Arc::clone(&shared), "a", DEFAULT_LOCK_TIMEOUT);
        let b = SyncLock::with_instance_id(Arc::clone(&shared), "b", DEFAULT_LOCK_TIMEOUT);

        assert!(a.acquire().await);
        assert!(!b.acquire().await);

        // Only the owner can release
        b.release().await;
        assert!(a.is_locked().await);

        a.release().await;
        assert!(!a.is_locked().await);
        assert!(b.acquire().await);
    }

    #[tokio::test]
    async fn test_stale_lock_is_seized() {
        let shared = store();
        let stale = LockRecord {
            timestamp: now_millis() - 300_001,
            instance_id: "crashed".into(),
        };
        shared.set_json(keys::SYNC_LOCK, &stale).await.unwrap();

        let lock = SyncLock::with_instance_id(Arc::clone(&shared), "fresh", DEFAULT_LOCK_TIMEOUT);
        assert!(lock.acquire().await);
        let record: LockRecord = shared.get_json(keys::SYNC_LOCK).await.unwrap().unwrap();
        assert_eq!(record.instance_id, "fresh");
    }

    #[tokio::test]
    async fn test_is_locked_removes_expired_record() {
        let shared = store();
        let stale = LockRecord {
            timestamp: 0,
            instance_id: "old".into(),
        };
        shared.set_json(keys::SYNC_LOCK, &stale).await.unwrap();

        let lock = SyncLock::new(Arc::clone(&shared), DEFAULT_LOCK_TIMEOUT);
        assert!(!lock.is_locked().await);
        assert_eq!(shared.get(keys::SYNC_LOCK).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unreadable_record_is_seized() {
        let shared = store();
        shared.set(keys::SYNC_LOCK, b"garbage".to_vec()).await.unwrap();

        let lock = SyncLock::with_instance_id(Arc::clone(&shared), "fresh", DEFAULT_LOCK_TIMEOUT);
        assert!(lock.acquire().await);
        let record: LockRecord = shared.get_json(keys::SYNC_LOCK).await.unwrap().unwrap();
        assert_eq!(record.instance_id, "fresh");

        lock.release().await;
        assert_eq!(shared.get(keys::SYNC_LOCK).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_is_locked_removes_unreadable_record() {
        let shared = store();
        shared.set(keys::SYNC_LOCK, b"{not json".to_vec()).await.unwrap();

        let lock = SyncLock::new(Arc::clone(&shared), DEFAULT_LOCK_TIMEOUT);
        assert!(!lock.is_locked().await);
        assert_eq!(shared.get(keys::SYNC_LOCK).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_short_timeout_expires() {
        let shared = store();
        let a = SyncLock::with_instance_id(Arc::clone(&shared), "a", Duration::from_millis(20));
        let b = SyncLock::with_instance_id(Arc::clone(&shared), "b", Duration::from_millis(20));
        assert!(a.acquire().await);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(b.acquire().await);
    }

    #[tokio::test]
    async fn test_instance_ids_are_unique() {
        let s = store();
        let a = SyncLock::new(Arc::clone(&s), DEFAULT_LOCK_TIMEOUT);
        let b = SyncLock::new(s, DEFAULT_LOCK_TIMEOUT);
        assert_ne!(a.instance_id(), b.instance_id());
    }
}
