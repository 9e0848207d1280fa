//! hsync-crypto: encryption for synced browser history
//!
//! Key hierarchy:
//! ```text
//! Master password ──PBKDF2-SHA256 (salt from MasterPasswordData)──► Master Key (AES-256-GCM)
//!   ├── verification digest  (HKDF info="hsync-verify", stored hex)
//!   └── secret envelopes     (WebDAV password, payload key: IV ‖ ct+tag)
//!
//! Payload key (user string)
//!   ├── cipher key  PBKDF2-SHA256(key, per-payload salt), purpose-restricted
//!   └── MAC key     HKDF-SHA256(key, info="hsync-payload-mac")
//! ```
//!
//! Sync payload wire format: `base64(salt[16] ‖ iv[N] ‖ ciphertext ‖ hmac[32])`,
//! where `N` comes from the algorithm registry.

pub mod algorithm;
pub mod cipher;
pub mod envelope;
pub mod kdf;
pub mod payload;

pub use algorithm::{info_for, lookup, AlgorithmInfo};
pub use envelope::{decrypt_secret, encrypt_secret};
pub use kdf::{derive_key, derive_master_key, Decrypt, DerivedKey, Encrypt, KdfParams, MasterKey};
pub use payload::{decrypt, encrypt};

/// Size of every symmetric key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of the per-payload PBKDF2 salt
pub const SALT_SIZE: usize = 16;

/// Size of the trailing HMAC-SHA256 signature
pub const SIGNATURE_SIZE: usize = 32;

/// Size of the AES-256-GCM nonce used by secret envelopes
pub const ENVELOPE_IV_SIZE: usize = 12;

/// Additional authenticated data attached by AEAD payload ciphers
pub const APP_ID: &[u8] = b"hsync-history-v1";
