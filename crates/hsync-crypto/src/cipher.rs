//! Per-algorithm seal/open over purpose-restricted derived keys.
//!
//! CBC and CTR carry no authentication of their own; the payload HMAC
//! covers them. AEAD modes additionally bind `APP_ID` as AAD when the
//! registry says so.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit, StreamCipher};
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::Aes256Gcm;
use chacha20poly1305::ChaCha20Poly1305;
use hsync_core::{Algorithm, HsyncError, HsyncResult};

use crate::algorithm::info_for;
use crate::kdf::{Decrypt, DerivedKey, Encrypt};
use crate::APP_ID;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type Aes256Ctr = ctr::Ctr128BE<aes::Aes256>;

fn check_iv(algorithm: Algorithm, iv: &[u8]) -> HsyncResult<()> {
    let expected = info_for(algorithm).iv_len;
    if iv.len() != expected {
        return Err(HsyncError::Format(format!(
            "{algorithm} needs a {expected}-byte IV, got {}",
            iv.len()
        )));
    }
    Ok(())
}

fn aad(algorithm: Algorithm) -> &'static [u8] {
    if info_for(algorithm).uses_aad {
        APP_ID
    } else {
        &[]
    }
}

/// Encrypt `plaintext` under `key` with the given IV.
pub fn seal(key: &DerivedKey<Encrypt>, iv: &[u8], plaintext: &[u8]) -> HsyncResult<Vec<u8>> {
    let algorithm = key.algorithm();
    check_iv(algorithm, iv)?;
    let key_bytes = key.as_bytes().as_slice();

    match algorithm {
        Algorithm::Aes256Cbc => {
            let enc = Aes256CbcEnc::new_from_slices(key_bytes, iv)
                .map_err(|e| anyhow::anyhow!("AES-CBC init failed: {e}"))?;
            Ok(enc.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
        }
        Algorithm::Aes256Ctr => {
            let mut ctr = Aes256Ctr::new_from_slices(key_bytes, iv)
                .map_err(|e| anyhow::anyhow!("AES-CTR init failed: {e}"))?;
            let mut buf = plaintext.to_vec();
            ctr.apply_keystream(&mut buf);
            Ok(buf)
        }
        Algorithm::Aes256Gcm => {
            let cipher = Aes256Gcm::new_from_slice(key_bytes)
                .map_err(|e| anyhow::anyhow!("AES-GCM init failed: {e}"))?;
            cipher
                .encrypt(
                    aes_gcm::Nonce::from_slice(iv),
                    Payload {
                        msg: plaintext,
                        aad: aad(algorithm),
                    },
                )
                .map_err(|e| anyhow::anyhow!("AES-GCM encryption failed: {e}").into())
        }
        Algorithm::ChaCha20Poly1305 => {
            let cipher = ChaCha20Poly1305::new_from_slice(key_bytes)
                .map_err(|e| anyhow::anyhow!("ChaCha20-Poly1305 init failed: {e}"))?;
            cipher
                .encrypt(
                    chacha20poly1305::Nonce::from_slice(iv),
                    Payload {
                        msg: plaintext,
                        aad: aad(algorithm),
                    },
                )
                .map_err(|e| anyhow::anyhow!("ChaCha20-Poly1305 encryption failed: {e}").into())
        }
    }
}

/// Decrypt `ciphertext` under `key` with the given IV.
///
/// Tag and padding failures come back as `HsyncError::Decryption` with no
/// detail about which check failed.
pub fn open(key: &DerivedKey<Decrypt>, iv: &[u8], ciphertext: &[u8]) -> HsyncResult<Vec<u8>> {
    let algorithm = key.algorithm();
    check_iv(algorithm, iv)?;
    let key_bytes = key.as_bytes().as_slice();
    let rejected = || HsyncError::Decryption("ciphertext rejected".into());

    match algorithm {
        Algorithm::Aes256Cbc => {
            let dec = Aes256CbcDec::new_from_slices(key_bytes, iv)
                .map_err(|e| anyhow::anyhow!("AES-CBC init failed: {e}"))?;
            dec.decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
                .map_err(|_| rejected())
        }
        Algorithm::Aes256Ctr => {
            let mut ctr = Aes256Ctr::new_from_slices(key_bytes, iv)
                .map_err(|e| anyhow::anyhow!("AES-CTR init failed: {e}"))?;
            let mut buf = ciphertext.to_vec();
            ctr.apply_keystream(&mut buf);
            Ok(buf)
        }
        Algorithm::Aes256Gcm => {
            let cipher = Aes256Gcm::new_from_slice(key_bytes)
                .map_err(|e| anyhow::anyhow!("AES-GCM init failed: {e}"))?;
            cipher
                .decrypt(
                    aes_gcm::Nonce::from_slice(iv),
                    Payload {
                        msg: ciphertext,
                        aad: aad(algorithm),
                    },
                )
                .map_err(|_| rejected())
        }
        Algorithm::ChaCha20Poly1305 => {
            let cipher = ChaCha20Poly1305::new_from_slice(key_bytes)
                .map_err(|e| anyhow::anyhow!("ChaCha20-Poly1305 init failed: {e}"))?;
            cipher
                .decrypt(
                    chacha20poly1305::Nonce::from_slice(iv),
                    Payload {
                        msg: ciphertext,
                        aad: aad(algorithm),
                    },
                )
                .map_err(|_| rejected())
        }
    }
}
