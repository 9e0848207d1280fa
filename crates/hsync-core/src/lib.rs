//! hsync-core: shared types, configuration schema, validation rules, and the
//! error taxonomy used by every other hsync crate.

pub mod config;
pub mod error;
pub mod recovery;
pub mod types;
pub mod validate;

pub use error::{ErrorKind, HsyncError, HsyncResult};
pub use recovery::SyncFailure;
pub use types::{Algorithm, EncryptionConfig, HistoryItem, KeyStrength, WebDavConfig};

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}
