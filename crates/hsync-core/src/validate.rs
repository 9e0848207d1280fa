//! Stateless validation rules for the WebDAV and encryption settings.
//!
//! Every message here is part of the fixed vocabulary that
//! [`crate::recovery`] classifies, so keep wording stable.

use serde::Serialize;
use url::Url;

use crate::error::ErrorKind;
use crate::recovery::SyncFailure;
use crate::types::{KeyStrength, WebDavConfig};

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MIN_KEY_LEN: usize = 12;

pub const WEAK_KEY_ADVISORY: &str =
    "Encryption key is weak: use 16+ characters and include symbols";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Validation {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Validation {
    fn ok() -> Self {
        Self {
            is_valid: true,
            error: None,
        }
    }

    fn fail(msg: &str) -> Self {
        Self {
            is_valid: false,
            error: Some(msg.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyValidation {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub strength: KeyStrength,
    /// Set when the key is accepted but weak
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advisory: Option<String>,
}

pub fn validate_url(url: &str) -> Validation {
    let url = url.trim();
    if url.is_empty() {
        return Validation::fail("URL is required");
    }
    let parsed = match Url::parse(url) {
        Ok(u) => u,
        Err(_) => return Validation::fail("Invalid URL format"),
    };
    if parsed.scheme() != "https" {
        return Validation::fail("URL must use HTTPS");
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Validation::fail("URL must include a hostname");
    }
    Validation::ok()
}

pub fn validate_password(password: &str) -> Validation {
    if password.is_empty() {
        return Validation::fail("Password is required");
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Validation::fail("Password must be at least 8 characters long");
    }
    Validation::ok()
}

/// Point score: length >= 12, length >= 16, upper, lower, digit, symbol.
pub fn key_strength(key: &str) -> KeyStrength {
    let len = key.chars().count();
    let score = [
        len >= MIN_KEY_LEN,
        len >= 16,
        key.chars().any(|c| c.is_ascii_uppercase()),
        key.chars().any(|c| c.is_ascii_lowercase()),
        key.chars().any(|c| c.is_ascii_digit()),
        key.chars().any(|c| !c.is_ascii_alphanumeric()),
    ]
    .iter()
    .filter(|&&hit| hit)
    .count();

    match score {
        s if s >= 5 => KeyStrength::Strong,
        s if s >= 3 => KeyStrength::Medium,
        _ => KeyStrength::Weak,
    }
}

pub fn validate_encryption_key(key: &str) -> KeyValidation {
    let strength = key_strength(key);
    let fail = |msg: &str| KeyValidation {
        is_valid: false,
        error: Some(msg.to_string()),
        strength,
        advisory: None,
    };

    if key.is_empty() {
        return fail("Encryption key is required");
    }
    if key.chars().count() < MIN_KEY_LEN {
        return fail("Encryption key must be at least 12 characters long");
    }
    if !key.chars().any(|c| c.is_ascii_uppercase()) {
        return fail("Encryption key must contain at least one uppercase letter");
    }
    if !key.chars().any(|c| c.is_ascii_lowercase()) {
        return fail("Encryption key must contain at least one lowercase letter");
    }
    if !key.chars().any(|c| c.is_ascii_digit()) {
        return fail("Encryption key must contain at least one number");
    }

    KeyValidation {
        is_valid: true,
        error: None,
        strength,
        advisory: (strength == KeyStrength::Weak).then(|| WEAK_KEY_ADVISORY.to_string()),
    }
}

/// Minimal shape check used when saving: url and username present.
///
/// An empty password is allowed here ("not yet filled"); the stricter
/// [`validate_all_config`] rejects it before a sync.
pub fn validate_config(config: &WebDavConfig) -> Validation {
    if config.url.trim().is_empty() {
        return Validation::fail("URL is required");
    }
    if config.username.trim().is_empty() {
        return Validation::fail("Username is required");
    }
    Validation::ok()
}

/// Full pre-sync check: URL, then password, then (if encryption is enabled)
/// the encryption key. Stops at the first failure.
///
/// On success returns advisories (e.g. a weak but valid key).
pub fn validate_all_config(config: &WebDavConfig) -> Result<Vec<String>, SyncFailure> {
    let shape = validate_config(config);
    if let Some(err) = shape.error {
        return Err(SyncFailure::new(ErrorKind::Config, err));
    }

    if let Some(err) = validate_url(&config.url).error {
        return Err(SyncFailure::new(ErrorKind::Config, err));
    }

    if let Some(err) = validate_password(config.password().unwrap_or_default()).error {
        return Err(SyncFailure::new(ErrorKind::Config, err));
    }

    let mut advisories = Vec::new();
    if config.encryption.enabled {
        let key = validate_encryption_key(config.encryption_key().unwrap_or_default());
        if let Some(err) = key.error {
            return Err(SyncFailure::new(ErrorKind::Config, err));
        }
        advisories.extend(key.advisory);
    }
    Ok(advisories)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EncryptionConfig;

    fn config(url: &str, password: &str) -> WebDavConfig {
        WebDavConfig {
            url: url.into(),
            username: "alice".into(),
            password: Some(password.into()),
            encryption: EncryptionConfig::default(),
        }
    }

    #[test]
    fn test_url_requires_https() {
        assert!(!validate_url("http://x").is_valid);
        assert_eq!(
            validate_url("http://x").error.as_deref(),
            Some("URL must use HTTPS")
        );
        assert!(validate_url("https://x").is_valid);
        assert!(validate_url("https://dav.example.com/remote.php/webdav/").is_valid);
    }

    #[test]
    fn test_url_rejects_garbage() {
        assert_eq!(validate_url("").error.as_deref(), Some("URL is required"));
        assert_eq!(
            validate_url("not a url").error.as_deref(),
            Some("Invalid URL format")
        );
        assert!(!validate_url("ftp://files.example").is_valid);
    }

    #[test]
    fn test_password_boundary() {
        assert!(validate_password("12345678").is_valid);
        assert!(!validate_password("1234567").is_valid);
        assert_eq!(
            validate_password("1234567").error.as_deref(),
            Some("Password must be at least 8 characters long")
        );
    }

    #[test]
    fn test_key_boundary() {
        let ok = validate_encryption_key("Abcdefghij12");
        assert!(ok.is_valid, "{ok:?}");

        assert_eq!(
            validate_encryption_key("Abcdefghi12").error.as_deref(),
            Some("Encryption key must be at least 12 characters long")
        );
        assert_eq!(
            validate_encryption_key("abcdefghij12").error.as_deref(),
            Some("Encryption key must contain at least one uppercase letter")
        );
        assert_eq!(
            validate_encryption_key("ABCDEFGHIJ12").error.as_deref(),
            Some("Encryption key must contain at least one lowercase letter")
        );
        assert_eq!(
            validate_encryption_key("Abcdefghijkl").error.as_deref(),
            Some("Encryption key must contain at least one number")
        );
    }

    #[test]
    fn test_key_strength_points() {
        // 12 chars + upper + lower + digit = 4 points
        assert_eq!(key_strength("Abcdefghij12"), KeyStrength::Medium);
        // + 16 chars + symbol = 6 points
        assert_eq!(key_strength("Abcdefghij12345!"), KeyStrength::Strong);
        assert_eq!(key_strength("abc"), KeyStrength::Weak);
    }

    #[test]
    fn test_validate_config_allows_empty_password() {
        let cfg = config("https://dav.example", "");
        assert!(validate_config(&cfg).is_valid);

        let mut missing_user = cfg.clone();
        missing_user.username.clear();
        assert_eq!(
            validate_config(&missing_user).error.as_deref(),
            Some("Username is required")
        );
    }

    #[test]
    fn test_validate_all_config_order() {
        // Both URL and password are bad: URL is reported
        let failure = validate_all_config(&config("http://dav.example", "short")).unwrap_err();
        assert_eq!(failure.kind, ErrorKind::Config);
        assert_eq!(failure.message, "URL must use HTTPS");
        assert!(!failure.recovery_actions.is_empty());

        let failure = validate_all_config(&config("https://dav.example", "short")).unwrap_err();
        assert_eq!(failure.message, "Password must be at least 8 characters long");
    }

    #[test]
    fn test_validate_all_config_checks_key_only_when_enabled() {
        let mut cfg = config("https://dav.example", "longenough");
        cfg.encryption.key = Some("weak".into());
        assert!(validate_all_config(&cfg).is_ok());

        cfg.encryption.enabled = true;
        let failure = validate_all_config(&cfg).unwrap_err();
        assert_eq!(
            failure.message,
            "Encryption key must be at least 12 characters long"
        );

        cfg.encryption.key = Some("Abcdefghij12".into());
        assert_eq!(validate_all_config(&cfg).unwrap(), Vec::<String>::new());
    }
}
