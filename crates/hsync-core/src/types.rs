use serde::{Deserialize, Serialize};
use std::fmt;

/// A single browser history entry.
///
/// `id` is assigned by the history provider; merge identity is the `url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    pub id: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Milliseconds since the Unix epoch
    pub last_visit_time: i64,
    #[serde(default)]
    pub visit_count: u32,
}

/// Payload cipher identifier, as stored in `EncryptionConfig.type`.
///
/// Unknown names deserialize to `Aes256Cbc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Algorithm {
    #[default]
    Aes256Cbc,
    Aes256Gcm,
    Aes256Ctr,
    ChaCha20Poly1305,
}

impl Algorithm {
    pub const ALL: [Algorithm; 4] = [
        Algorithm::Aes256Cbc,
        Algorithm::Aes256Gcm,
        Algorithm::Aes256Ctr,
        Algorithm::ChaCha20Poly1305,
    ];

    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "aes-256-gcm" => Algorithm::Aes256Gcm,
            "aes-256-ctr" => Algorithm::Aes256Ctr,
            "chacha20-poly1305" => Algorithm::ChaCha20Poly1305,
            _ => Algorithm::Aes256Cbc,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Aes256Cbc => "aes-256-cbc",
            Algorithm::Aes256Gcm => "aes-256-gcm",
            Algorithm::Aes256Ctr => "aes-256-ctr",
            Algorithm::ChaCha20Poly1305 => "chacha20-poly1305",
        }
    }
}

impl From<String> for Algorithm {
    fn from(name: String) -> Self {
        Algorithm::from_name(&name)
    }
}

impl From<Algorithm> for String {
    fn from(alg: Algorithm) -> Self {
        alg.as_str().to_string()
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStrength {
    Weak,
    Medium,
    Strong,
}

/// Payload encryption settings.
///
/// `key` holds plaintext while unlocked and an envelope blob at rest when a
/// master password is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptionConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(rename = "type", default)]
    pub algorithm: Algorithm,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_strength: Option<KeyStrength>,
}

/// WebDAV endpoint plus payload encryption settings.
///
/// `password` follows the same plaintext/envelope rule as `EncryptionConfig.key`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebDavConfig {
    pub url: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default)]
    pub encryption: EncryptionConfig,
}

impl WebDavConfig {
    /// Password, treating an empty string as unset.
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref().filter(|p| !p.is_empty())
    }

    /// Encryption key, treating an empty string as unset.
    pub fn encryption_key(&self) -> Option<&str> {
        self.encryption.key.as_deref().filter(|k| !k.is_empty())
    }
}

/// Stored master password verifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterPasswordData {
    /// Base64 PBKDF2 salt
    pub salt: String,
    /// Hex verification digest (64 chars)
    pub verification_data: String,
}

impl MasterPasswordData {
    /// A record with an empty field is treated as absent.
    pub fn is_complete(&self) -> bool {
        !self.salt.is_empty() && !self.verification_data.is_empty()
    }
}

/// User preferences that do not hold secrets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeneralConfig {
    pub auto_sync: bool,
    pub sync_interval_minutes: u32,
    pub max_history_items: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            auto_sync: false,
            sync_interval_minutes: 60,
            max_history_items: 1000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncDirection {
    Upload,
    Download,
}

/// One entry of the persisted sync log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRecord {
    pub timestamp: i64,
    pub direction: SyncDirection,
    pub success: bool,
    pub message: String,
    pub item_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_item_camel_case() {
        let json = r#"{"id":"1","url":"https://a.example","lastVisitTime":5,"visitCount":2}"#;
        let item: HistoryItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.last_visit_time, 5);
        assert_eq!(item.visit_count, 2);
        assert!(item.title.is_none());

        let back = serde_json::to_string(&item).unwrap();
        assert!(back.contains("\"lastVisitTime\":5"));
        assert!(!back.contains("title"));
    }

    #[test]
    fn test_algorithm_names() {
        for alg in Algorithm::ALL {
            assert_eq!(Algorithm::from_name(alg.as_str()), alg);
        }
        assert_eq!(Algorithm::from_name("rot13"), Algorithm::Aes256Cbc);
    }

    #[test]
    fn test_unknown_algorithm_deserializes_to_cbc() {
        let cfg: EncryptionConfig =
            serde_json::from_str(r#"{"enabled":true,"type":"blowfish"}"#).unwrap();
        assert_eq!(cfg.algorithm, Algorithm::Aes256Cbc);

        let cfg: EncryptionConfig =
            serde_json::from_str(r#"{"enabled":true,"type":"chacha20-poly1305"}"#).unwrap();
        assert_eq!(cfg.algorithm, Algorithm::ChaCha20Poly1305);
    }

    #[test]
    fn test_webdav_config_empty_password_is_unset() {
        let cfg = WebDavConfig {
            url: "https://dav.example".into(),
            username: "me".into(),
            password: Some(String::new()),
            ..Default::default()
        };
        assert!(cfg.password().is_none());
    }

    #[test]
    fn test_master_password_data_completeness() {
        let data = MasterPasswordData {
            salt: "c2FsdA==".into(),
            verification_data: String::new(),
        };
        assert!(!data.is_complete());
    }
}
