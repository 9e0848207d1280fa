//! Remote history body: plain JSON array or encrypted payload

use hsync_core::types::EncryptionConfig;
use hsync_core::{HistoryItem, HsyncError, HsyncResult};
use hsync_crypto::KdfParams;

use crate::client::{CONTENT_TYPE_ENCRYPTED, CONTENT_TYPE_JSON};

fn payload_key(enc: &EncryptionConfig) -> HsyncResult<String> {
    enc.key
        .as_deref()
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .ok_or_else(|| HsyncError::Config("Encryption key is required".into()))
}

/// Serialize `items` for upload. Returns the body and its content type.
pub async fn encode_history(
    items: Vec<HistoryItem>,
    enc: &EncryptionConfig,
    params: KdfParams,
) -> HsyncResult<(Vec<u8>, &'static str)> {
    if !enc.enabled {
        let body = serde_json::to_vec(&items)
            .map_err(|e| HsyncError::Format(format!("serializing history: {e}")))?;
        return Ok((body, CONTENT_TYPE_JSON));
    }

    let key = payload_key(enc)?;
    let algorithm = enc.algorithm;
    let salt = enc.salt.clone().filter(|s| !s.is_empty());
    // PBKDF2 runs on the blocking pool
    let blob = tokio::task::spawn_blocking(move || {
        hsync_crypto::encrypt(&items, &key, algorithm, salt.as_deref(), &params)
    })
    .await
    .map_err(|e| HsyncError::from(anyhow::anyhow!("encryption task failed: {e}")))??;
    Ok((blob.into_bytes(), CONTENT_TYPE_ENCRYPTED))
}

/// Parse a downloaded body into history records.
pub async fn decode_history(
    body: Vec<u8>,
    enc: &EncryptionConfig,
    params: KdfParams,
) -> HsyncResult<Vec<HistoryItem>> {
    if enc.enabled {
        let key = payload_key(enc)?;
        let algorithm = enc.algorithm;
        let text = String::from_utf8(body)
            .map_err(|_| HsyncError::Decryption(hsync_crypto::payload::DECRYPT_FAILED.into()))?;
        return tokio::task::spawn_blocking(move || {
            hsync_crypto::decrypt(&text, &key, algorithm, &params)
        })
        .await
        .map_err(|e| HsyncError::from(anyhow::anyhow!("decryption task failed: {e}")))?;
    }

    let value: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| HsyncError::Format(format!("remote history is not valid JSON: {e}")))?;
    if !value.is_array() {
        return Err(HsyncError::Format("remote history is not an array".into()));
    }
    serde_json::from_value(value)
        .map_err(|e| HsyncError::Format(format!("remote history has malformed records: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hsync_core::Algorithm;

    const FAST: KdfParams = KdfParams { iterations: 100 };

    fn items() -> Vec<HistoryItem> {
        vec![HistoryItem {
            id: "1".into(),
            url: "https://example.com/".into(),
            title: Some("Example".into()),
            last_visit_time: 42,
            visit_count: 1,
        }]
    }

    fn encrypted(key: &str) -> EncryptionConfig {
        EncryptionConfig {
            enabled: true,
            algorithm: Algorithm::Aes256Gcm,
            key: Some(key.into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_plain_json() {
        let enc = EncryptionConfig::default();
        let (body, ct) = encode_history(items(), &enc, FAST).await.unwrap();
        assert_eq!(ct, CONTENT_TYPE_JSON);
        assert!(body.starts_with(b"["));
        assert_eq!(decode_history(body, &enc, FAST).await.unwrap(), items());
    }

    #[tokio::test]
    async fn test_encrypted() {
        let enc = encrypted("Payload-Key-123");
        let (body, ct) = encode_history(items(), &enc, FAST).await.unwrap();
        assert_eq!(ct, CONTENT_TYPE_ENCRYPTED);
        assert!(!body.starts_with(b"["));
        assert_eq!(decode_history(body.clone(), &enc, FAST).await.unwrap(), items());

        let err = decode_history(body, &encrypted("Other-Key-456"), FAST)
            .await
            .unwrap_err();
        assert!(matches!(err, HsyncError::Decryption(_)));
    }

    #[tokio::test]
    async fn test_non_array_is_format_error() {
        let err = decode_history(br#"{"items":[]}"#.to_vec(), &EncryptionConfig::default(), FAST)
            .await
            .unwrap_err();
        match err {
            HsyncError::Format(msg) => assert!(msg.contains("not an array")),
            other => panic!("expected Format, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_enabled_without_key_is_config_error() {
        let enc = EncryptionConfig {
            enabled: true,
            ..Default::default()
        };
        let err = encode_history(items(), &enc, FAST).await.unwrap_err();
        assert!(matches!(err, HsyncError::Config(_)));
    }
}
