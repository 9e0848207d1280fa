//! Sync payload encryption for the whole history array.
//!
//! Wire format (base64 of the concatenation):
//! ```text
//! [16 bytes: salt][N bytes: IV, N from registry][M bytes: ciphertext][32 bytes: HMAC-SHA256]
//! ```
//!
//! The HMAC input is the raw salt bytes, the raw IV bytes and the raw
//! ciphertext bytes, in that order. The MAC key is HKDF-SHA256 of the payload
//! key (info `hsync-payload-mac`), independent of the per-payload cipher key.
//! The signature is checked before anything is decrypted.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use hsync_core::{Algorithm, HistoryItem, HsyncError, HsyncResult};
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroize;

use crate::algorithm::info_for;
use crate::cipher::{open, seal};
use crate::kdf::{decode_salt, derive_key, Decrypt, Encrypt, KdfParams};
use crate::{KEY_SIZE, SALT_SIZE, SIGNATURE_SIZE};

type HmacSha256 = Hmac<Sha256>;

/// The only message a failed payload decryption ever carries.
pub const DECRYPT_FAILED: &str =
    "unable to decrypt synced history: check the encryption key and master password";

/// Input bytes per base64 chunk; a multiple of 3 so chunks concatenate cleanly.
const ENCODE_CHUNK: usize = 48 * 1024;

fn mac_key(key: &str) -> HsyncResult<[u8; KEY_SIZE]> {
    let hkdf = Hkdf::<Sha256>::new(None, key.as_bytes());
    let mut okm = [0u8; KEY_SIZE];
    hkdf.expand(b"hsync-payload-mac", &mut okm)
        .map_err(|e| anyhow::anyhow!("HKDF expand failed: {e}"))?;
    Ok(okm)
}

fn new_mac(key: &str, salt: &[u8], iv: &[u8], ciphertext: &[u8]) -> HsyncResult<HmacSha256> {
    let mut k = mac_key(key)?;
    let mac = <HmacSha256 as Mac>::new_from_slice(&k);
    k.zeroize();
    let mut mac = mac.map_err(|e| anyhow::anyhow!("HMAC init failed: {e}"))?;
    mac.update(salt);
    mac.update(iv);
    mac.update(ciphertext);
    Ok(mac)
}

fn encode_chunked(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len().div_ceil(3) * 4);
    for chunk in bytes.chunks(ENCODE_CHUNK) {
        STANDARD.encode_string(chunk, &mut out);
    }
    out
}

/// Encrypt a history array.
///
/// `salt` is an optional base64 16-byte salt; a fresh random one is used
/// when absent.
pub fn encrypt(
    items: &[HistoryItem],
    key: &str,
    algorithm: Algorithm,
    salt: Option<&str>,
    params: &KdfParams,
) -> HsyncResult<String> {
    let info = info_for(algorithm);

    let plaintext = serde_json::to_vec(items)
        .map_err(|e| HsyncError::Format(format!("history serialization: {e}")))?;

    let salt = match salt {
        Some(encoded) => {
            let decoded = decode_salt(encoded)?;
            if decoded.len() != SALT_SIZE {
                return Err(HsyncError::Format(format!(
                    "salt must be {SALT_SIZE} bytes, got {}",
                    decoded.len()
                )));
            }
            decoded
        }
        None => {
            let mut fresh = vec![0u8; SALT_SIZE];
            rand::thread_rng().fill_bytes(&mut fresh);
            fresh
        }
    };

    let cipher_key = derive_key::<Encrypt>(key.as_bytes(), &salt, info.algorithm, params);

    let mut iv = vec![0u8; info.iv_len];
    rand::thread_rng().fill_bytes(&mut iv);

    let ciphertext = seal(&cipher_key, &iv, &plaintext)?;
    let signature = new_mac(key, &salt, &iv, &ciphertext)?.finalize().into_bytes();

    let mut blob =
        Vec::with_capacity(SALT_SIZE + iv.len() + ciphertext.len() + SIGNATURE_SIZE);
    blob.extend_from_slice(&salt);
    blob.extend_from_slice(&iv);
    blob.extend_from_slice(&ciphertext);
    blob.extend_from_slice(&signature);

    tracing::debug!(
        algorithm = %info.algorithm,
        items = items.len(),
        bytes = blob.len(),
        "encrypted history payload"
    );
    Ok(encode_chunked(&blob))
}

/// Decrypt a blob produced by [`encrypt`].
///
/// Every failure is reported as the same `HsyncError::Decryption`.
pub fn decrypt(
    blob: &str,
    key: &str,
    algorithm: Algorithm,
    params: &KdfParams,
) -> HsyncResult<Vec<HistoryItem>> {
    decrypt_inner(blob, key, algorithm, params).map_err(|_| failed())
}

fn failed() -> HsyncError {
    HsyncError::Decryption(DECRYPT_FAILED.into())
}

fn decrypt_inner(
    blob: &str,
    key: &str,
    algorithm: Algorithm,
    params: &KdfParams,
) -> HsyncResult<Vec<HistoryItem>> {
    let info = info_for(algorithm);
    let raw = STANDARD.decode(blob.trim()).map_err(|_| failed())?;

    if raw.len() < SALT_SIZE + info.iv_len + SIGNATURE_SIZE {
        return Err(failed());
    }
    let ciphertext_len = raw.len() - SALT_SIZE - info.iv_len - SIGNATURE_SIZE;

    let (salt, rest) = raw.split_at(SALT_SIZE);
    let (iv, rest) = rest.split_at(info.iv_len);
    let (ciphertext, signature) = rest.split_at(ciphertext_len);

    // Integrity before confidentiality: nothing is decrypted unless the MAC holds
    new_mac(key, salt, iv, ciphertext)?
        .verify_slice(signature)
        .map_err(|_| failed())?;

    let cipher_key = derive_key::<Decrypt>(key.as_bytes(), salt, info.algorithm, params);
    let mut plaintext = open(&cipher_key, iv, ciphertext)?;

    let items = serde_json::from_slice::<Vec<HistoryItem>>(&plaintext).map_err(|_| failed());
    plaintext.zeroize();
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAST: KdfParams = KdfParams { iterations: 1_000 };
    const KEY: &str = "Correct-Horse-42";

    fn sample_items() -> Vec<HistoryItem> {
        vec![
            HistoryItem {
                id: "1".into(),
                url: "https://example.com/".into(),
                title: Some("Example".into()),
                last_visit_time: 1_700_000_000_000,
                visit_count: 3,
            },
            HistoryItem {
                id: "2".into(),
                url: "https://rust-lang.org/".into(),
                title: None,
                last_visit_time: 1_700_000_100_000,
                visit_count: 1,
            },
        ]
    }

    fn raw(blob: &str) -> Vec<u8> {
        STANDARD.decode(blob).unwrap()
    }

    #[test]
    fn test_roundtrip_every_algorithm() {
        for alg in Algorithm::ALL {
            let blob = encrypt(&sample_items(), KEY, alg, None, &FAST).unwrap();
            let items = decrypt(&blob, KEY, alg, &FAST).unwrap();
            assert_eq!(items, sample_items(), "{alg}");
        }
    }

    #[test]
    fn test_roundtrip_empty_array() {
        for alg in Algorithm::ALL {
            let blob = encrypt(&[], KEY, alg, None, &FAST).unwrap();
            assert!(decrypt(&blob, KEY, alg, &FAST).unwrap().is_empty(), "{alg}");
        }
    }

    #[test]
    fn test_layout_prefix_is_given_salt() {
        let salt = STANDARD.encode([7u8; SALT_SIZE]);
        let blob = encrypt(&sample_items(), KEY, Algorithm::Aes256Gcm, Some(&salt), &FAST).unwrap();
        let bytes = raw(&blob);
        assert_eq!(&bytes[..SALT_SIZE], &[7u8; SALT_SIZE]);

        // salt + iv + (json + tag) + signature
        let json_len = serde_json::to_vec(&sample_items()).unwrap().len();
        assert_eq!(bytes.len(), SALT_SIZE + 12 + json_len + 16 + SIGNATURE_SIZE);
    }

    #[test]
    fn test_signature_covers_raw_salt_bytes() {
        let blob = encrypt(&sample_items(), KEY, Algorithm::Aes256Ctr, None, &FAST).unwrap();
        let bytes = raw(&blob);
        let iv_end = SALT_SIZE + 16;
        let sig_start = bytes.len() - SIGNATURE_SIZE;

        let mut mac = <HmacSha256 as Mac>::new_from_slice(&mac_key(KEY).unwrap()).unwrap();
        mac.update(&bytes[..SALT_SIZE]);
        mac.update(&bytes[SALT_SIZE..iv_end]);
        mac.update(&bytes[iv_end..sig_start]);
        mac.verify_slice(&bytes[sig_start..]).unwrap();
    }

    #[test]
    fn test_rejects_bad_salt() {
        let short = STANDARD.encode([1u8; 8]);
        assert!(matches!(
            encrypt(&[], KEY, Algorithm::Aes256Gcm, Some(&short), &FAST),
            Err(HsyncError::Format(_))
        ));
        assert!(matches!(
            encrypt(&[], KEY, Algorithm::Aes256Gcm, Some("%%%"), &FAST),
            Err(HsyncError::Format(_))
        ));
    }

    #[test]
    fn test_wrong_key_fails_every_algorithm() {
        for alg in Algorithm::ALL {
            let blob = encrypt(&sample_items(), KEY, alg, None, &FAST).unwrap();
            let err = decrypt(&blob, "Wrong-Horse-42", alg, &FAST).unwrap_err();
            match err {
                HsyncError::Decryption(msg) => assert_eq!(msg, DECRYPT_FAILED),
                other => panic!("expected Decryption, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_every_bit_flip_detected() {
        let blob = encrypt(&sample_items()[..1], KEY, Algorithm::Aes256Cbc, None, &FAST).unwrap();
        let bytes = raw(&blob);
        for i in 0..bytes.len() {
            for bit in [0u8, 3, 7] {
                let mut tampered = bytes.clone();
                tampered[i] ^= 1 << bit;
                let result = decrypt(&STANDARD.encode(&tampered), KEY, Algorithm::Aes256Cbc, &FAST);
                assert!(result.is_err(), "flip at byte {i} bit {bit} not detected");
            }
        }
    }

    #[test]
    fn test_algorithm_mismatch_fails() {
        let blob = encrypt(&sample_items(), KEY, Algorithm::Aes256Gcm, None, &FAST).unwrap();
        assert!(decrypt(&blob, KEY, Algorithm::Aes256Cbc, &FAST).is_err());
    }

    #[test]
    fn test_truncated_and_garbage_input() {
        for blob in ["", "AAAA", "not base64 at all", &STANDARD.encode([0u8; 59])] {
            let err = decrypt(blob, KEY, Algorithm::ChaCha20Poly1305, &FAST).unwrap_err();
            assert!(matches!(err, HsyncError::Decryption(_)), "{blob:?}");
        }
    }

    #[test]
    fn test_chunked_encoding_matches_one_shot() {
        let data: Vec<u8> = (0..(ENCODE_CHUNK * 2 + 17)).map(|i| i as u8).collect();
        assert_eq!(encode_chunked(&data), STANDARD.encode(&data));
    }
}
