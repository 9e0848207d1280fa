//! WebDAV config persistence with enveloped secrets and a session cache

use std::sync::Arc;

use hsync_core::types::GeneralConfig;
use hsync_core::validate::{key_strength, validate_config};
use hsync_core::{HsyncError, HsyncResult, WebDavConfig};
use hsync_crypto::{decrypt_secret, encrypt_secret, MasterKey};
use hsync_storage::{keys, KvStore, KvStoreExt, Stores};

use crate::master::MasterPasswordManager;

/// Replace the WebDAV password and payload key with envelopes under `key`.
pub(crate) fn seal_secrets(cfg: &WebDavConfig, key: &MasterKey) -> HsyncResult<WebDavConfig> {
    let mut sealed = cfg.clone();
    sealed.password = cfg
        .password()
        .map(|p| encrypt_secret(p, key))
        .transpose()?;
    sealed.encryption.key = cfg
        .encryption_key()
        .map(|k| encrypt_secret(k, key))
        .transpose()?;
    Ok(sealed)
}

/// Inverse of [`seal_secrets`]. A wrong key fails with `Decryption`.
pub(crate) fn open_secrets(cfg: &WebDavConfig, key: &MasterKey) -> HsyncResult<WebDavConfig> {
    let mut plain = cfg.clone();
    plain.password = cfg
        .password()
        .map(|p| decrypt_secret(p, key))
        .transpose()?;
    plain.encryption.key = cfg
        .encryption_key()
        .map(|k| decrypt_secret(k, key))
        .transpose()?;
    Ok(plain)
}

/// Loads and saves the WebDAV config and general settings.
#[derive(Clone)]
pub struct ConfigManager {
    persistent: Arc<dyn KvStore>,
    session: Arc<dyn KvStore>,
    master: MasterPasswordManager,
}

impl ConfigManager {
    pub fn new(stores: &Stores, master: MasterPasswordManager) -> Self {
        Self {
            persistent: Arc::clone(&stores.persistent),
            session: Arc::clone(&stores.session),
            master,
        }
    }

    pub fn master(&self) -> &MasterPasswordManager {
        &self.master
    }

    /// The usable (decrypted) config.
    ///
    /// Served from the session cache when present. Otherwise the stored record
    /// is decrypted with the session key and cached. With a master password
    /// set and the session locked this is a `Precondition` error.
    pub async fn load_config(&self) -> HsyncResult<Option<WebDavConfig>> {
        let cached: Option<WebDavConfig> = self.session.get_json(keys::SESSION_CONFIG).await?;
        if cached.is_some() {
            return Ok(cached);
        }

        let stored: Option<WebDavConfig> = self.persistent.get_json(keys::WEBDAV_CONFIG).await?;
        let Some(stored) = stored else {
            return Ok(None);
        };

        let plain = if self.master.has_master_password().await? {
            let key = self.master.session_key().await?.ok_or_else(|| {
                HsyncError::Precondition(
                    "master password is locked; unlock to use the stored config".into(),
                )
            })?;
            open_secrets(&stored, &key)?
        } else {
            stored
        };

        self.session.set_json(keys::SESSION_CONFIG, &plain).await?;
        Ok(Some(plain))
    }

    /// Validate and persist a config, enveloping secrets when a master
    /// password is set. Refreshes the session cache.
    pub async fn save_config(&self, config: &WebDavConfig) -> HsyncResult<()> {
        if let Some(err) = validate_config(config).error {
            return Err(HsyncError::Config(err));
        }

        let mut config = config.clone();
        config.encryption.key_strength = config.encryption_key().map(key_strength);

        let at_rest = if self.master.has_master_password().await? {
            let key = self.master.session_key().await?.ok_or_else(|| {
                HsyncError::Precondition(
                    "master password is locked; unlock before saving the config".into(),
                )
            })?;
            seal_secrets(&config, &key)?
        } else {
            config.clone()
        };

        self.persistent.set_json(keys::WEBDAV_CONFIG, &at_rest).await?;
        self.session.set_json(keys::SESSION_CONFIG, &config).await?;
        tracing::info!(url = %config.url, encrypted = config.encryption.enabled, "config saved");
        Ok(())
    }

    /// Drop the decrypted config cache.
    pub async fn clear_session_config(&self) -> HsyncResult<()> {
        self.session.remove(keys::SESSION_CONFIG).await
    }

    pub async fn load_general_config(&self) -> HsyncResult<GeneralConfig> {
        Ok(self
            .persistent
            .get_json(keys::GENERAL_CONFIG)
            .await?
            .unwrap_or_default())
    }

    pub async fn save_general_config(&self, general: &GeneralConfig) -> HsyncResult<()> {
        if general.sync_interval_minutes == 0 {
            return Err(HsyncError::Config(
                "sync interval must be at least one minute".into(),
            ));
        }
        self.persistent.set_json(keys::GENERAL_CONFIG, general).await
    }
}
