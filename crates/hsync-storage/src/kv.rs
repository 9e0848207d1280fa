//! Async key-value store abstraction

use async_trait::async_trait;
use hsync_core::{HsyncError, HsyncResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Well-known store keys
pub mod keys {
    /// Persistent: WebDAV config, secrets enveloped when a master password is set
    pub const WEBDAV_CONFIG: &str = "webdav_config";
    /// Persistent: `{salt, verificationData}`
    pub const MASTER_PASSWORD_DATA: &str = "master_password_data";
    /// Persistent: auto-sync preferences
    pub const GENERAL_CONFIG: &str = "general_config";
    /// Persistent: capped log of sync attempts
    pub const SYNC_HISTORY: &str = "sync_history";

    /// Session: base64 of the raw 32-byte master key
    pub const MASTER_KEY_RAW: &str = "master_key_raw";
    /// Session: decrypted WebDAV config cache (same name, different store)
    pub const SESSION_CONFIG: &str = "webdav_config";
    /// Session: `{timestamp, instanceId}`
    pub const SYNC_LOCK: &str = "sync_lock";
}

/// Byte-oriented key-value store.
///
/// `get` returns `Ok(None)` for absent keys; `remove` of an absent key succeeds.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> HsyncResult<Option<Vec<u8>>>;

    async fn set(&self, key: &str, value: Vec<u8>) -> HsyncResult<()>;

    async fn remove(&self, key: &str) -> HsyncResult<()>;
}

/// JSON helpers on top of any [`KvStore`]
#[async_trait]
pub trait KvStoreExt: KvStore {
    async fn get_json<T: DeserializeOwned + Send>(&self, key: &str) -> HsyncResult<Option<T>> {
        match self.get(key).await? {
            None => Ok(None),
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| HsyncError::Format(format!("stored {key} is not valid JSON: {e}"))),
        }
    }

    async fn set_json<T: Serialize + Sync>(&self, key: &str, value: &T) -> HsyncResult<()> {
        let bytes = serde_json::to_vec(value)
            .map_err(|e| HsyncError::Format(format!("serializing {key}: {e}")))?;
        self.set(key, bytes).await
    }
}

impl<S: KvStore + ?Sized> KvStoreExt for S {}
