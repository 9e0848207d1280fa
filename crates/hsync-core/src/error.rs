use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type HsyncResult<T> = Result<T, HsyncError>;

#[derive(Debug, Error)]
pub enum HsyncError {
    /// HTTP 401/403, or a master password that failed verification
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Connection refused, DNS failure, timeout
    #[error("network error: {0}")]
    Network(String),

    /// Retryable server-side status (0, 408, 429, 5xx)
    #[error("server error: HTTP {status}")]
    Server { status: u16 },

    /// Non-retryable, non-auth HTTP status
    #[error("request rejected: HTTP {status}")]
    Rejected { status: u16 },

    #[error("format error: {0}")]
    Format(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("decryption failed: {0}")]
    Decryption(String),

    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("another sync is already in progress")]
    SyncInProgress,

    #[error("storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HsyncError {
    /// The taxonomy bucket this error belongs to.
    ///
    /// `Other` carries no structure, so it reports `Unknown` and callers fall
    /// back to [`ErrorKind::from_message`].
    pub fn kind(&self) -> ErrorKind {
        match self {
            HsyncError::Authentication(_) => ErrorKind::Authentication,
            HsyncError::Network(_) => ErrorKind::Network,
            HsyncError::Server { .. } => ErrorKind::Server,
            // 404/405/409 on the sync file mean the configured collection is wrong
            HsyncError::Rejected { .. } => ErrorKind::Config,
            HsyncError::Format(_) => ErrorKind::Format,
            HsyncError::Config(_) => ErrorKind::Config,
            HsyncError::Decryption(_) => ErrorKind::Decryption,
            HsyncError::Precondition(_) => ErrorKind::Precondition,
            HsyncError::Unavailable(_) => ErrorKind::Unavailable,
            HsyncError::SyncInProgress => ErrorKind::SyncInProgress,
            HsyncError::Storage(_) => ErrorKind::Storage,
            HsyncError::Other(_) => ErrorKind::Unknown,
        }
    }

    /// Whether the low-level HTTP retry loop may try again after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, HsyncError::Network(_) | HsyncError::Server { .. })
    }
}

/// Error taxonomy surfaced to UI-facing callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Authentication,
    Network,
    Server,
    Format,
    Config,
    Decryption,
    Precondition,
    Unavailable,
    SyncInProgress,
    Storage,
    Unknown,
}

impl ErrorKind {
    /// Keyword classification for errors that only carry a message.
    ///
    /// Messages come from the crate's own fixed vocabulary, so substring
    /// matching is sufficient. Order matters: authentication wins over
    /// network so "401 on network request" is not retried.
    pub fn from_message(message: &str) -> ErrorKind {
        let msg = message.to_ascii_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| msg.contains(w));

        if has(&["401", "403", "unauthorized", "forbidden", "authentication"]) {
            ErrorKind::Authentication
        } else if has(&["decrypt", "master password", "encryption key"]) {
            ErrorKind::Decryption
        } else if has(&["network", "timeout", "timed out", "fetch failed", "connection", "dns"]) {
            ErrorKind::Network
        } else if has(&["500", "502", "503", "504", "429", "408", "server"]) {
            ErrorKind::Server
        } else if has(&["json", "format", "parse", "not an array"]) {
            ErrorKind::Format
        } else if has(&["url", "username", "password", "config"]) {
            ErrorKind::Config
        } else {
            ErrorKind::Unknown
        }
    }
}
