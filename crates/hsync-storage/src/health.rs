//! Store health check

use hsync_core::{HsyncError, HsyncResult};

use crate::kv::KvStore;

const PROBE_KEY: &str = ".hsync-health";

/// Verify a store accepts a write, returns it, and deletes it
pub async fn check_health(store: &dyn KvStore) -> HsyncResult<()> {
    let probe = b"ok".to_vec();
    store.set(PROBE_KEY, probe.clone()).await?;
    let read = store.get(PROBE_KEY).await?;
    store.remove(PROBE_KEY).await?;
    if read.as_deref() != Some(probe.as_slice()) {
        return Err(HsyncError::Storage("health probe read back wrong bytes".into()));
    }
    Ok(())
}

/// Returns true if the store is usable, false otherwise (non-panicking)
pub async fn is_healthy(store: &dyn KvStore) -> bool {
    check_health(store).await.is_ok()
}
