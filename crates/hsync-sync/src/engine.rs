//! Sync orchestration: lock, load config, fetch, merge, upload.
//!
//! Each public operation:
//!   1. takes the cross-instance [`SyncLock`] (`SyncInProgress` if held)
//!   2. loads and validates the WebDAV config
//!   3. runs the network work, retrying transient failures as a whole
//!   4. releases the lock and drops the decrypted session config, whatever
//!      the outcome
//!   5. appends to the sync log and reports a [`SyncFailure`] on error

use std::future::Future;
use std::sync::Arc;

use hsync_core::config::SyncConfig;
use hsync_core::types::SyncDirection;
use hsync_core::validate::validate_all_config;
use hsync_core::{HistoryItem, HsyncError, HsyncResult, SyncFailure, WebDavConfig};
use hsync_crypto::KdfParams;
use hsync_secrets::ConfigManager;
use hsync_storage::Stores;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::client::WebDavClient;
use crate::codec::{decode_history, encode_history};
use crate::lock::SyncLock;
use crate::log::SyncLog;
use crate::merge::merge;
use crate::retry::RetryPolicy;
use crate::transport::HttpTransport;

/// Outcome of a successful upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReport {
    pub success: bool,
    /// Records now stored remotely
    pub items: usize,
    pub message: String,
    pub local_only: usize,
    pub remote_only: usize,
    pub updated: usize,
}

/// Remote state seen by a download
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteHistory {
    Found(Vec<HistoryItem>),
    /// No history object exists yet; not an error
    NotFound,
}

impl RemoteHistory {
    pub fn into_items(self) -> Vec<HistoryItem> {
        match self {
            RemoteHistory::Found(items) => items,
            RemoteHistory::NotFound => Vec::new(),
        }
    }
}

pub struct SyncEngine {
    config: ConfigManager,
    lock: SyncLock,
    log: SyncLog,
    transport: Arc<dyn HttpTransport>,
    sync: SyncConfig,
    params: KdfParams,
}

impl SyncEngine {
    pub fn new(
        stores: &Stores,
        config: ConfigManager,
        transport: Arc<dyn HttpTransport>,
        sync: SyncConfig,
        params: KdfParams,
    ) -> Self {
        Self {
            lock: SyncLock::new(Arc::clone(&stores.session), sync.lock_timeout()),
            log: SyncLog::new(Arc::clone(&stores.persistent)),
            config,
            transport,
            sync,
            params,
        }
    }

    pub fn lock(&self) -> &SyncLock {
        &self.lock
    }

    pub fn log(&self) -> &SyncLog {
        &self.log
    }

    /// Merge `local` with the remote history and upload the result.
    pub async fn sync_to_cloud(&self, local: &[HistoryItem]) -> Result<UploadReport, SyncFailure> {
        let result = self
            .locked(|| self.retry_transient("upload", || self.upload_once(local)))
            .await;
        match &result {
            Ok(report) => {
                self.log
                    .record(SyncDirection::Upload, true, &report.message, report.items)
                    .await;
            }
            Err(e) => self.record_failure(SyncDirection::Upload, e).await,
        }
        result.map_err(|e| SyncFailure::from_error(&e))
    }

    /// Download and decode the remote history.
    pub async fn sync_from_cloud(&self) -> Result<RemoteHistory, SyncFailure> {
        let result = self
            .locked(|| self.retry_transient("download", || self.download_once()))
            .await;
        match &result {
            Ok(RemoteHistory::Found(items)) => {
                let message = format!("Downloaded {} items", items.len());
                self.log
                    .record(SyncDirection::Download, true, &message, items.len())
                    .await;
            }
            Ok(RemoteHistory::NotFound) => {
                self.log
                    .record(SyncDirection::Download, true, "No remote history yet", 0)
                    .await;
            }
            Err(e) => self.record_failure(SyncDirection::Download, e).await,
        }
        result.map_err(|e| SyncFailure::from_error(&e))
    }

    /// PROPFIND the configured collection.
    pub async fn test_connection(&self) -> Result<(), SyncFailure> {
        let result = async {
            let (config, client) = self.client().await?;
            debug!(url = %config.url, "testing connection");
            client.test_connection().await
        }
        .await;
        self.clear_session_config().await;
        result.map_err(|e| SyncFailure::from_error(&e))
    }

    async fn record_failure(&self, direction: SyncDirection, err: &HsyncError) {
        let failure = SyncFailure::from_error(err);
        warn!(?direction, kind = ?failure.kind, error = %err, "sync failed");
        self.log
            .record(direction, false, &failure.message, 0)
            .await;
    }

    async fn clear_session_config(&self) {
        if let Err(e) = self.config.clear_session_config().await {
            warn!(error = %e, "could not clear session config");
        }
    }

    /// Run `op` under the sync lock; always release it and drop the session config.
    async fn locked<T, F, Fut>(&self, op: F) -> HsyncResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = HsyncResult<T>>,
    {
        if !self.lock.acquire().await {
            self.clear_session_config().await;
            return Err(HsyncError::SyncInProgress);
        }
        let result = op().await;
        self.lock.release().await;
        self.clear_session_config().await;
        result
    }

    /// Retry a whole operation on network/server failures.
    async fn retry_transient<T, F, Fut>(&self, what: &str, mut op: F) -> HsyncResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = HsyncResult<T>>,
    {
        let attempts = self.sync.outer_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Err(e) if e.is_retryable() && attempt < attempts => {
                    let delay = self.sync.base_delay() * attempt;
                    warn!(
                        operation = what,
                        attempt,
                        of = attempts,
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "sync attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn client(&self) -> HsyncResult<(WebDavConfig, WebDavClient)> {
        let config = self
            .config
            .load_config()
            .await?
            .ok_or_else(|| HsyncError::Config("WebDAV is not configured".into()))?;
        let advisories =
            validate_all_config(&config).map_err(|failure| HsyncError::Config(failure.message))?;
        for advisory in advisories {
            warn!("{advisory}");
        }
        let client = WebDavClient::new(
            &config,
            &self.sync.remote_file,
            Arc::clone(&self.transport),
            RetryPolicy::from_config(&self.sync),
        )?;
        Ok((config, client))
    }

    async fn upload_once(&self, local: &[HistoryItem]) -> HsyncResult<UploadReport> {
        let (config, client) = self.client().await?;

        // A missing or unreachable remote counts as empty
        let remote = match client.get_history().await {
            Ok(Some(body)) => decode_history(body, &config.encryption, self.params).await?,
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "could not fetch remote history; treating it as empty");
                Vec::new()
            }
        };

        let merged = merge(local, &remote);
        let (local_only, remote_only, updated) =
            (merged.local_only(), merged.remote_only(), merged.updated());
        let total = merged.total_items();

        let (body, content_type) =
            encode_history(merged.into_items(), &config.encryption, self.params).await?;
        client.put_history(body, content_type).await?;

        let message = format!(
            "Synced {total} items ({remote_only} new from cloud, {updated} merged)"
        );
        info!(
            total,
            local_only,
            remote_only,
            updated,
            encrypted = config.encryption.enabled,
            "history uploaded"
        );
        Ok(UploadReport {
            success: true,
            items: total,
            message,
            local_only,
            remote_only,
            updated,
        })
    }

    async fn download_once(&self) -> HsyncResult<RemoteHistory> {
        let (config, client) = self.client().await?;
        match client.get_history().await? {
            None => {
                info!("no remote history yet");
                Ok(RemoteHistory::NotFound)
            }
            Some(body) => {
                let items = decode_history(body, &config.encryption, self.params).await?;
                info!(count = items.len(), "history downloaded");
                Ok(RemoteHistory::Found(items))
            }
        }
    }
}
