//! hsync-secrets: master password lifecycle and WebDAV config at rest
//!
//! State machine:
//! ```text
//! NoPasswordSet ──set──► PasswordSet+Locked ──unlock──► PasswordSet+Unlocked
//!       ▲                        ▲   ◄──────lock───────────────┘
//!       └──────────clear─────────┴─────────────────────────────┘
//! ```
//! While a master password is set, the WebDAV password and the payload
//! encryption key are stored as AES-256-GCM envelopes under the master key.
//! The decrypted config is cached in the session store and dropped whenever
//! the master key changes or a sync ends.

pub mod config_store;
pub mod master;
pub mod prompt;

pub use config_store::ConfigManager;
pub use master::MasterPasswordManager;
