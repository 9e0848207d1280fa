//! Local history sources

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use hsync_core::{HistoryItem, HsyncError, HsyncResult};

/// Source of the local browsing history pushed by a sync.
#[async_trait]
pub trait HistoryProvider: Send + Sync {
    /// Up to `max_results` records, newest first.
    ///
    /// `Unavailable` when this environment has no history to offer.
    async fn get_local_history(&self, max_results: usize) -> HsyncResult<Vec<HistoryItem>>;
}

/// History read from a JSON array export on disk
#[derive(Debug, Clone)]
pub struct JsonFileHistory {
    path: PathBuf,
}

impl JsonFileHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `items` as a pretty JSON array, replacing the file.
    pub async fn write(path: &Path, items: &[HistoryItem]) -> HsyncResult<()> {
        let json = serde_json::to_vec_pretty(items)
            .map_err(|e| HsyncError::Format(format!("serializing history: {e}")))?;
        tokio::fs::write(path, json)
            .await
            .map_err(|e| HsyncError::Storage(format!("writing {}: {e}", path.display())))
    }
}

#[async_trait]
impl HistoryProvider for JsonFileHistory {
    async fn get_local_history(&self, max_results: usize) -> HsyncResult<Vec<HistoryItem>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(HsyncError::Unavailable(format!(
                    "history export not found: {}",
                    self.path.display()
                )));
            }
            Err(e) => {
                return Err(HsyncError::Storage(format!(
                    "reading {}: {e}",
                    self.path.display()
                )));
            }
        };

        let mut items: Vec<HistoryItem> = serde_json::from_slice(&bytes).map_err(|e| {
            HsyncError::Format(format!(
                "{} is not a JSON array of history items: {e}",
                self.path.display()
            ))
        })?;
        items.sort_by(|a, b| b.last_visit_time.cmp(&a.last_visit_time));
        items.truncate(max_results);
        tracing::debug!(path = %self.path.display(), count = items.len(), "loaded local history");
        Ok(items)
    }
}

/// Provider for environments without history access
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHistory;

#[async_trait]
impl HistoryProvider for NoHistory {
    async fn get_local_history(&self, _max_results: usize) -> HsyncResult<Vec<HistoryItem>> {
        Err(HsyncError::Unavailable(
            "no browser history source is configured".into(),
        ))
    }
}
