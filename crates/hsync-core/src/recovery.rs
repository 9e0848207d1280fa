//! User-facing failure reports with recovery advice.
//!
//! The retry layer only knows retryable vs terminal. Once an operation has
//! failed for good, the orchestration layer turns the error into a
//! [`SyncFailure`]: a kind, a message safe to show, and suggested actions.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ErrorKind, HsyncError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncFailure {
    pub kind: ErrorKind,
    pub message: String,
    pub recovery_actions: Vec<String>,
}

impl SyncFailure {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            recovery_actions: recovery_actions(kind)
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    /// Classify an error and attach recovery advice.
    ///
    /// Config and precondition errors keep their own message (it names the
    /// field to fix); every other kind gets a fixed summary so low-level
    /// detail never reaches the UI.
    pub fn from_error(err: &HsyncError) -> Self {
        let kind = match err.kind() {
            ErrorKind::Unknown => ErrorKind::from_message(&err.to_string()),
            kind => kind,
        };
        let message = match (kind, err) {
            (ErrorKind::Config, HsyncError::Config(msg)) => msg.clone(),
            (ErrorKind::Precondition, HsyncError::Precondition(msg)) => msg.clone(),
            (ErrorKind::Unavailable, HsyncError::Unavailable(msg)) => msg.clone(),
            _ => summary(kind).to_string(),
        };
        Self::new(kind, message)
    }
}

impl fmt::Display for SyncFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<&HsyncError> for SyncFailure {
    fn from(err: &HsyncError) -> Self {
        SyncFailure::from_error(err)
    }
}

fn summary(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Authentication => "Authentication failed",
        ErrorKind::Network => "Could not reach the WebDAV server",
        ErrorKind::Server => "The WebDAV server reported an error",
        ErrorKind::Format => "The remote history file is damaged or in an unknown format",
        ErrorKind::Config => "The WebDAV configuration is invalid",
        ErrorKind::Decryption => "Could not decrypt the synced history",
        ErrorKind::Precondition => "The operation is not available in the current state",
        ErrorKind::Unavailable => "Browser history is not available",
        ErrorKind::SyncInProgress => "Another sync is already in progress",
        ErrorKind::Storage => "Local extension storage failed",
        ErrorKind::Unknown => "Sync failed",
    }
}

/// Recovery advice per error kind.
pub fn recovery_actions(kind: ErrorKind) -> &'static [&'static str] {
    match kind {
        ErrorKind::Authentication => &[
            "Check the WebDAV username and password",
            "Make sure the account has access to the configured folder",
        ],
        ErrorKind::Network => &[
            "Check your internet connection",
            "Verify the WebDAV server address is reachable",
            "Try again in a few minutes",
        ],
        ErrorKind::Server => &[
            "The server may be overloaded or under maintenance",
            "Try again later",
        ],
        ErrorKind::Format => &[
            "Check that the encryption settings match the other devices",
            "Remove the remote history file to start a fresh sync",
        ],
        ErrorKind::Config => &[
            "Open the settings and review the WebDAV URL, username and password",
            "The URL must start with https://",
        ],
        ErrorKind::Decryption => &[
            "Check the master password",
            "Check that the encryption key matches the one used on other devices",
        ],
        ErrorKind::Precondition => &["Set and unlock the master password first"],
        ErrorKind::Unavailable => &["Grant the history permission and try again"],
        ErrorKind::SyncInProgress => &["Wait for the running sync to finish"],
        ErrorKind::Storage => &["Restart the browser and try again"],
        ErrorKind::Unknown => &["Try again", "Check the logs for details"],
    }
}
