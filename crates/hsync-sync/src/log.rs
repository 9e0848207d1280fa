//! Capped log of sync attempts kept in the persistent store

use std::sync::Arc;

use hsync_core::types::{SyncDirection, SyncRecord};
use hsync_core::{now_millis, HsyncResult};
use hsync_storage::{keys, KvStore, KvStoreExt};

/// Records kept; older ones are dropped on append
pub const MAX_SYNC_RECORDS: usize = 50;

#[derive(Clone)]
pub struct SyncLog {
    store: Arc<dyn KvStore>,
}

impl SyncLog {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// All records, oldest first
    pub async fn entries(&self) -> HsyncResult<Vec<SyncRecord>> {
        Ok(self
            .store
            .get_json::<Vec<SyncRecord>>(keys::SYNC_HISTORY)
            .await?
            .unwrap_or_default())
    }

    pub async fn append(&self, record: SyncRecord) -> HsyncResult<()> {
        let mut entries = self.entries().await?;
        entries.push(record);
        if entries.len() > MAX_SYNC_RECORDS {
            let excess = entries.len() - MAX_SYNC_RECORDS;
            entries.drain(..excess);
        }
        self.store.set_json(keys::SYNC_HISTORY, &entries).await
    }

    /// Append and swallow storage errors; the log must never fail a sync.
    pub async fn record(&self, direction: SyncDirection, success: bool, message: &str, item_count: usize) {
        let record = SyncRecord {
            timestamp: now_millis(),
            direction,
            success,
            message: message.to_string(),
            item_count,
        };
        if let Err(e) = self.append(record).await {
            tracing::warn!(error = %e, "could not append to sync log");
        }
    }

    pub async fn clear(&self) -> HsyncResult<()> {
        self.store.remove(keys::SYNC_HISTORY).await
    }
}
