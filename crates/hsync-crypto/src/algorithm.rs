//! Algorithm registry: cipher name → primitive parameters
//!
//! Both the encrypt and decrypt paths read IV length and AAD policy from here;
//! nothing else in the crate hard-codes them.

use hsync_core::Algorithm;

use crate::KEY_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlgorithmInfo {
    pub algorithm: Algorithm,
    /// Name of the underlying primitive
    pub primitive: &'static str,
    /// Key length in bytes (always 32)
    pub key_len: usize,
    /// IV / nonce length in bytes
    pub iv_len: usize,
    /// Whether `APP_ID` is bound as additional authenticated data
    pub uses_aad: bool,
}

static REGISTRY: [AlgorithmInfo; 4] = [
    AlgorithmInfo {
        algorithm: Algorithm::Aes256Cbc,
        primitive: "AES-CBC",
        key_len: KEY_SIZE,
        iv_len: 16,
        uses_aad: false,
    },
    AlgorithmInfo {
        algorithm: Algorithm::Aes256Gcm,
        primitive: "AES-GCM",
        key_len: KEY_SIZE,
        iv_len: 12,
        uses_aad: true,
    },
    AlgorithmInfo {
        algorithm: Algorithm::Aes256Ctr,
        primitive: "AES-CTR",
        key_len: KEY_SIZE,
        iv_len: 16,
        uses_aad: false,
    },
    AlgorithmInfo {
        algorithm: Algorithm::ChaCha20Poly1305,
        primitive: "ChaCha20-Poly1305",
        key_len: KEY_SIZE,
        iv_len: 12,
        uses_aad: true,
    },
];

pub fn info_for(algorithm: Algorithm) -> &'static AlgorithmInfo {
    REGISTRY
        .iter()
        .find(|s| s.algorithm == algorithm)
        .unwrap_or(&REGISTRY[0])
}

/// Look up by name; unknown names fall back to AES-256-CBC.
pub fn lookup(name: &str) -> &'static AlgorithmInfo {
    info_for(Algorithm::from_name(name))
}
