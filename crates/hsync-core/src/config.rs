use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration (loaded from hsync.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HsyncConfig {
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
    pub sync: SyncConfig,
    pub crypto: CryptoConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Persistent key-value store root (webdav_config, master_password_data, ...)
    pub data_dir: PathBuf,
    /// Session store root; should live on a tmpfs that is wiped at logout
    /// (master_key_raw, decrypted config cache, sync_lock)
    pub session_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Remote object name at the root of the WebDAV URL
    pub remote_file: String,
    /// Per-request HTTP timeout in seconds
    pub http_timeout_secs: u64,
    /// Attempts per HTTP request (including the first)
    pub max_retries: u32,
    /// Linear backoff unit in milliseconds
    pub base_delay_ms: u64,
    /// Attempts of a whole sync operation on transient failures
    pub outer_attempts: u32,
    /// Age in milliseconds after which a sync lock is considered stale
    pub lock_timeout_ms: u64,
}

impl SyncConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// PBKDF2-HMAC-SHA256 iterations for every derived key (default: 300000)
    pub pbkdf2_iterations: u32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("~/.local/share/hsync"),
            session_dir: None,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            remote_file: "history.json".into(),
            http_timeout_secs: 30,
            max_retries: 3,
            base_delay_ms: 1000,
            outer_attempts: 3,
            lock_timeout_ms: 300_000,
        }
    }
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            pbkdf2_iterations: 300_000,
        }
    }
}
