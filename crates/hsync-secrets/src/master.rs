//! Master password: verification record, session unlock, key rotation

use std::sync::Arc;

use hsync_core::types::MasterPasswordData;
use hsync_core::{HsyncError, HsyncResult, WebDavConfig};
use hsync_crypto::kdf::{decode_salt, verification_digest, verify_digest};
use hsync_crypto::{derive_master_key, KdfParams, MasterKey, SALT_SIZE};
use hsync_storage::{keys, KvStore, KvStoreExt, Stores};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};

use crate::config_store::{open_secrets, seal_secrets};

/// Owns the master password record and the session master key.
///
/// Cloning is cheap; clones share the same stores.
#[derive(Clone)]
pub struct MasterPasswordManager {
    persistent: Arc<dyn KvStore>,
    session: Arc<dyn KvStore>,
    params: KdfParams,
}

/// PBKDF2 is CPU-bound; keep it off the async workers.
async fn derive_in_background(
    password: &SecretString,
    salt: Vec<u8>,
    params: KdfParams,
) -> HsyncResult<MasterKey> {
    let password = SecretString::from(password.expose_secret().to_owned());
    tokio::task::spawn_blocking(move || derive_master_key(&password, &salt, &params))
        .await
        .map_err(|e| HsyncError::from(anyhow::anyhow!("key derivation task failed: {e}")))
}

impl MasterPasswordManager {
    pub fn new(stores: &Stores, params: KdfParams) -> Self {
        Self {
            persistent: Arc::clone(&stores.persistent),
            session: Arc::clone(&stores.session),
            params,
        }
    }

    /// The stored record, or `None` when absent or incomplete.
    pub async fn password_data(&self) -> HsyncResult<Option<MasterPasswordData>> {
        let data: Option<MasterPasswordData> =
            self.persistent.get_json(keys::MASTER_PASSWORD_DATA).await?;
        match data {
            Some(d) if d.is_complete() => Ok(Some(d)),
            Some(_) => {
                tracing::warn!("master password record is incomplete; treating as unset");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    pub async fn has_master_password(&self) -> HsyncResult<bool> {
        Ok(self.password_data().await?.is_some())
    }

    /// The unlocked master key, if any.
    pub async fn session_key(&self) -> HsyncResult<Option<MasterKey>> {
        match self.session.get(keys::MASTER_KEY_RAW).await? {
            None => Ok(None),
            Some(bytes) => {
                let encoded = String::from_utf8(bytes)
                    .map_err(|_| HsyncError::Format("session key is not UTF-8".into()))?;
                MasterKey::from_base64(&encoded).map(Some)
            }
        }
    }

    pub async fn is_unlocked(&self) -> bool {
        matches!(self.session_key().await, Ok(Some(_)))
    }

    /// Set or replace the master password.
    ///
    /// Stored secrets are re-wrapped under the new key. Replacing an existing
    /// password requires the session to be unlocked, otherwise the old
    /// envelopes could never be opened again. Leaves the session locked.
    pub async fn set_master_password(&self, password: &SecretString) -> HsyncResult<()> {
        if password.expose_secret().is_empty() {
            return Err(HsyncError::Config("Password is required".into()));
        }

        let had_password = self.has_master_password().await?;
        let old_key = self.session_key().await?;
        if had_password && old_key.is_none() {
            return Err(HsyncError::Precondition(
                "unlock with the current master password before changing it".into(),
            ));
        }

        let stored: Option<WebDavConfig> = self.persistent.get_json(keys::WEBDAV_CONFIG).await?;
        let plain = match (stored, old_key) {
            (Some(cfg), Some(old)) if had_password => match open_secrets(&cfg, &old) {
                Ok(plain) => Some(plain),
                Err(e) => {
                    tracing::warn!(error = %e, "could not decrypt stored config under the old key; keeping it as-is");
                    None
                }
            },
            (Some(cfg), _) if !had_password => Some(cfg),
            _ => None,
        };

        let mut salt = vec![0u8; SALT_SIZE];
        rand::thread_rng().fill_bytes(&mut salt);
        let key = derive_in_background(password, salt.clone(), self.params).await?;

        let data = MasterPasswordData {
            salt: base64_encode(&salt),
            verification_data: verification_digest(&key)?,
        };
        self.persistent
            .set_json(keys::MASTER_PASSWORD_DATA, &data)
            .await?;

        if let Some(plain) = plain {
            let sealed = seal_secrets(&plain, &key)?;
            self.persistent.set_json(keys::WEBDAV_CONFIG, &sealed).await?;
        }

        self.lock().await?;
        tracing::info!(rotated = had_password, "master password set");
        Ok(())
    }

    /// Check a candidate password against the stored record.
    ///
    /// Any storage or decoding problem counts as a mismatch.
    pub async fn verify_master_password(&self, password: &SecretString) -> bool {
        match self.derive_verified(password).await {
            Ok(Some(_)) => true,
            Ok(None) => false,
            Err(e) => {
                tracing::debug!(error = %e, "master password verification failed");
                false
            }
        }
    }

    /// Derive the key for `password` and return it only if it matches the record.
    async fn derive_verified(&self, password: &SecretString) -> HsyncResult<Option<MasterKey>> {
        let Some(data) = self.password_data().await? else {
            return Ok(None);
        };
        let salt = decode_salt(&data.salt)?;
        let key = derive_in_background(password, salt, self.params).await?;
        if verify_digest(&key, &data.verification_data)? {
            Ok(Some(key))
        } else {
            Ok(None)
        }
    }

    /// Unlock: verify the password and keep the derived key for this session.
    pub async fn set_session_master_password(&self, password: &SecretString) -> HsyncResult<()> {
        if !self.has_master_password().await? {
            return Err(HsyncError::Precondition(
                "no master password has been set".into(),
            ));
        }
        let key = self
            .derive_verified(password)
            .await?
            .ok_or_else(|| HsyncError::Authentication("invalid master password".into()))?;

        self.session.remove(keys::SESSION_CONFIG).await?;
        self.session
            .set(keys::MASTER_KEY_RAW, key.to_base64().into_bytes())
            .await?;
        tracing::info!("session unlocked");
        Ok(())
    }

    /// Forget the session key and the decrypted config cache.
    pub async fn lock(&self) -> HsyncResult<()> {
        self.session.remove(keys::MASTER_KEY_RAW).await?;
        self.session.remove(keys::SESSION_CONFIG).await?;
        Ok(())
    }

    /// Remove the master password and return stored secrets to plaintext.
    ///
    /// When locked the envelopes cannot be opened; the WebDAV password and
    /// encryption key are then dropped and must be entered again.
    pub async fn clear_master_password(&self) -> HsyncResult<()> {
        let stored: Option<WebDavConfig> = self.persistent.get_json(keys::WEBDAV_CONFIG).await?;
        if let Some(cfg) = stored {
            if self.has_master_password().await? {
                let restored = match self.session_key().await? {
                    Some(key) => open_secrets(&cfg, &key).unwrap_or_else(|e| {
                        tracing::warn!(error = %e, "stored secrets unreadable; dropping them");
                        strip_secrets(&cfg)
                    }),
                    None => {
                        tracing::warn!("clearing while locked; stored secrets are dropped");
                        strip_secrets(&cfg)
                    }
                };
                self.persistent.set_json(keys::WEBDAV_CONFIG, &restored).await?;
            }
        }

        self.persistent.remove(keys::MASTER_PASSWORD_DATA).await?;
        self.lock().await?;
        tracing::info!("master password cleared");
        Ok(())
    }
}

fn strip_secrets(cfg: &WebDavConfig) -> WebDavConfig {
    let mut stripped = cfg.clone();
    stripped.password = None;
    stripped.encryption.key = None;
    stripped
}

fn base64_encode(bytes: &[u8]) -> String {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    STANDARD.encode(bytes)
}
