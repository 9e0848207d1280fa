//! Key derivation: PBKDF2-HMAC-SHA256 password → key
//!
//! Derived payload keys carry their purpose in the type. A
//! `DerivedKey<Encrypt>` only seals and a `DerivedKey<Decrypt>` only opens,
//! so a key derived for one direction cannot be used for the other.

use std::marker::PhantomData;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hkdf::Hkdf;
use hsync_core::{Algorithm, HsyncError, HsyncResult};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::algorithm::info_for;
use crate::KEY_SIZE;

/// PBKDF2 parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Iteration count (default: 300000)
    pub iterations: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            iterations: 300_000,
        }
    }
}

/// A 256-bit AES-GCM key derived from the master password.
///
/// Zeroized on drop to prevent secrets lingering in memory.
#[derive(Clone)]
pub struct MasterKey {
    bytes: [u8; KEY_SIZE],
}

impl MasterKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// Raw key bytes, base64, as kept in the session store.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.bytes)
    }

    pub fn from_base64(encoded: &str) -> HsyncResult<Self> {
        let mut raw = STANDARD
            .decode(encoded.trim())
            .map_err(|e| HsyncError::Format(format!("session key is not base64: {e}")))?;
        if raw.len() != KEY_SIZE {
            raw.zeroize();
            return Err(HsyncError::Format(format!(
                "session key has wrong size: {} bytes (expected {KEY_SIZE})",
                raw.len()
            )));
        }
        let mut bytes = [0u8; KEY_SIZE];
        bytes.copy_from_slice(&raw);
        raw.zeroize();
        Ok(Self::from_bytes(bytes))
    }
}

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Marker for the single capability a derived key is allowed.
pub trait KeyPurpose: sealed::Sealed {
    const NAME: &'static str;
}

/// Key may only encrypt.
#[derive(Debug)]
pub enum Encrypt {}

/// Key may only decrypt.
#[derive(Debug)]
pub enum Decrypt {}

impl sealed::Sealed for Encrypt {}
impl sealed::Sealed for Decrypt {}

impl KeyPurpose for Encrypt {
    const NAME: &'static str = "encrypt";
}

impl KeyPurpose for Decrypt {
    const NAME: &'static str = "decrypt";
}

/// A payload cipher key bound to one algorithm and one purpose.
pub struct DerivedKey<P: KeyPurpose> {
    bytes: [u8; KEY_SIZE],
    algorithm: Algorithm,
    _purpose: PhantomData<P>,
}

impl<P: KeyPurpose> DerivedKey<P> {
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl<P: KeyPurpose> Drop for DerivedKey<P> {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl<P: KeyPurpose> std::fmt::Debug for DerivedKey<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("algorithm", &self.algorithm)
            .field("purpose", &P::NAME)
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

fn pbkdf2(material: &[u8], salt: &[u8], params: &KdfParams, out: &mut [u8]) {
    pbkdf2::pbkdf2_hmac::<Sha256>(material, salt, params.iterations, out);
}

/// Derive a purpose-restricted payload key from key material and salt.
///
/// Output length comes from the algorithm registry.
pub fn derive_key<P: KeyPurpose>(
    material: &[u8],
    salt: &[u8],
    algorithm: Algorithm,
    params: &KdfParams,
) -> DerivedKey<P> {
    let info = info_for(algorithm);
    let mut bytes = [0u8; KEY_SIZE];
    pbkdf2(material, salt, params, &mut bytes[..info.key_len]);
    DerivedKey {
        bytes,
        algorithm: info.algorithm,
        _purpose: PhantomData,
    }
}

/// Derive the AES-256-GCM master key from the master password.
pub fn derive_master_key(password: &SecretString, salt: &[u8], params: &KdfParams) -> MasterKey {
    let mut bytes = [0u8; KEY_SIZE];
    pbkdf2(password.expose_secret().as_bytes(), salt, params, &mut bytes);
    MasterKey::from_bytes(bytes)
}

/// Decode a base64 salt string.
pub fn decode_salt(encoded: &str) -> HsyncResult<Vec<u8>> {
    STANDARD
        .decode(encoded.trim())
        .map_err(|e| HsyncError::Format(format!("salt is not valid base64: {e}")))
}

/// Hex digest stored in `MasterPasswordData.verificationData`.
///
/// Domain-separated from the master key itself so the stored value reveals
/// nothing usable for decryption; a guess still costs a full PBKDF2 run.
pub fn verification_digest(master: &MasterKey) -> HsyncResult<String> {
    let hkdf = Hkdf::<Sha256>::new(None, master.as_bytes());
    let mut okm = [0u8; KEY_SIZE];
    hkdf.expand(b"hsync-verify", &mut okm)
        .map_err(|e| anyhow::anyhow!("HKDF expand failed: {e}"))?;
    let digest = hex::encode(okm);
    okm.zeroize();
    Ok(digest)
}

/// Constant-time comparison of a recomputed digest against the stored one.
pub fn verify_digest(master: &MasterKey, expected_hex: &str) -> HsyncResult<bool> {
    let actual = verification_digest(master)?;
    Ok(bool::from(
        actual.as_bytes().ct_eq(expected_hex.trim().to_ascii_lowercase().as_bytes()),
    ))
}
