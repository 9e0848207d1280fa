//! Secret envelopes: short secrets at rest under the session master key.
//!
//! Blob format (base64):
//! ```text
//! [12 bytes: random IV][N bytes: AES-256-GCM ciphertext][16 bytes: tag]
//! ```
//!
//! No per-blob salt: the master key was already salted when derived.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hsync_core::{HsyncError, HsyncResult};
use rand::RngCore;

use crate::kdf::MasterKey;
use crate::ENVELOPE_IV_SIZE;

const TAG_SIZE: usize = 16;

/// Wrong key and corrupted data are indistinguishable here.
pub const ENVELOPE_REJECTED: &str = "wrong master password or corrupted data";

/// Encrypt a secret under the master key.
pub fn encrypt_secret(plaintext: &str, master: &MasterKey) -> HsyncResult<String> {
    let cipher = Aes256Gcm::new(master.as_bytes().into());

    let mut iv = [0u8; ENVELOPE_IV_SIZE];
    rand::thread_rng().fill_bytes(&mut iv);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&iv), plaintext.as_bytes())
        .map_err(|e| anyhow::anyhow!("secret encryption failed: {e}"))?;

    let mut blob = Vec::with_capacity(ENVELOPE_IV_SIZE + ciphertext.len());
    blob.extend_from_slice(&iv);
    blob.extend_from_slice(&ciphertext);
    Ok(STANDARD.encode(blob))
}

/// Decrypt a blob produced by [`encrypt_secret`].
pub fn decrypt_secret(blob: &str, master: &MasterKey) -> HsyncResult<String> {
    let raw = STANDARD
        .decode(blob.trim())
        .map_err(|_| HsyncError::Decryption(ENVELOPE_REJECTED.into()))?;

    if raw.len() < ENVELOPE_IV_SIZE + TAG_SIZE {
        return Err(HsyncError::Decryption(ENVELOPE_REJECTED.into()));
    }

    let (iv, ciphertext) = raw.split_at(ENVELOPE_IV_SIZE);
    let cipher = Aes256Gcm::new(master.as_bytes().into());

    let plaintext = cipher
        .decrypt(Nonce::from_slice(iv), ciphertext)
        .map_err(|_| HsyncError::Decryption(ENVELOPE_REJECTED.into()))?;

    String::from_utf8(plaintext).map_err(|_| HsyncError::Decryption(ENVELOPE_REJECTED.into()))
}
