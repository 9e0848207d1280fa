//! OpenDAL-backed stores

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use hsync_core::config::StorageConfig;
use hsync_core::{HsyncError, HsyncResult};
use opendal::Operator;

use crate::kv::KvStore;

/// Where a store keeps its bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// Process-local, lost on exit
    Memory,
    /// One file per key under the given root
    Fs(PathBuf),
}

/// Build an OpenDAL Operator for a store backend
pub fn build_operator(backend: &Backend) -> HsyncResult<Operator> {
    let op = match backend {
        Backend::Memory => Operator::new(opendal::services::Memory::default())
            .map_err(|e| HsyncError::Storage(format!("creating memory operator: {e}")))?
            .layer(opendal::layers::LoggingLayer::default())
            .finish(),
        Backend::Fs(root) => {
            let root = root
                .to_str()
                .ok_or_else(|| HsyncError::Storage(format!("non UTF-8 store root: {root:?}")))?;
            // opendal 0.55: builders use the consuming pattern
            let builder = opendal::services::Fs::default().root(root);
            Operator::new(builder)
                .map_err(|e| HsyncError::Storage(format!("creating fs operator at {root}: {e}")))?
                .layer(opendal::layers::LoggingLayer::default())
                .finish()
        }
    };
    Ok(op)
}

/// [`KvStore`] over an OpenDAL operator
#[derive(Clone)]
pub struct OpendalStore {
    op: Operator,
}

impl OpendalStore {
    pub fn new(op: Operator) -> Self {
        Self { op }
    }

    pub fn open(backend: &Backend) -> HsyncResult<Self> {
        build_operator(backend).map(Self::new)
    }

    /// In-memory store, used for tests and throwaway sessions
    pub fn memory() -> HsyncResult<Self> {
        Self::open(&Backend::Memory)
    }

    pub fn fs(root: impl Into<PathBuf>) -> HsyncResult<Self> {
        Self::open(&Backend::Fs(root.into()))
    }
}

#[async_trait]
impl KvStore for OpendalStore {
    async fn get(&self, key: &str) -> HsyncResult<Option<Vec<u8>>> {
        match self.op.read(key).await {
            Ok(data) => Ok(Some(data.to_vec())),
            Err(e) if e.kind() == opendal::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(HsyncError::Storage(format!("reading {key}: {e}"))),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> HsyncResult<()> {
        self.op
            .write(key, value)
            .await
            .map_err(|e| HsyncError::Storage(format!("writing {key}: {e}")))?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> HsyncResult<()> {
        match self.op.delete(key).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == opendal::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(HsyncError::Storage(format!("removing {key}: {e}"))),
        }
    }
}

/// The two stores the application runs on
#[derive(Clone)]
pub struct Stores {
    pub persistent: Arc<dyn KvStore>,
    pub session: Arc<dyn KvStore>,
}

impl Stores {
    /// Two independent in-memory stores
    pub fn memory() -> HsyncResult<Self> {
        Ok(Self {
            persistent: Arc::new(OpendalStore::memory()?),
            session: Arc::new(OpendalStore::memory()?),
        })
    }
}

/// Expand a leading `~/` against the user's home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

/// Resolve the session directory: configured, else `$XDG_RUNTIME_DIR/hsync`,
/// else a `session/` directory beside the persistent data.
pub fn session_root(cfg: &StorageConfig) -> PathBuf {
    if let Some(dir) = &cfg.session_dir {
        return expand_home(dir);
    }
    if let Some(runtime) = dirs::runtime_dir() {
        return runtime.join("hsync");
    }
    let fallback = expand_home(&cfg.data_dir).join("session");
    tracing::warn!(
        path = %fallback.display(),
        "no runtime directory available; session keys will persist on disk until `hsync master lock`"
    );
    fallback
}

/// Open the persistent and session stores described by the config
pub fn open_stores(cfg: &StorageConfig) -> HsyncResult<Stores> {
    let data_dir = expand_home(&cfg.data_dir);
    let session_dir = session_root(cfg);
    tracing::debug!(
        data_dir = %data_dir.display(),
        session_dir = %session_dir.display(),
        "opening stores"
    );
    Ok(Stores {
        persistent: Arc::new(OpendalStore::fs(data_dir)?),
        session: Arc::new(OpendalStore::fs(session_dir)?),
    })
}
