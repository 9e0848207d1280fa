//! hsync-storage: key-value stores over OpenDAL
//!
//! Two stores back the application:
//! - **persistent**: survives restarts (`webdav_config`, `master_password_data`, ...)
//! - **session**: dropped on logout (`master_key_raw`, decrypted config cache, `sync_lock`)

pub mod health;
pub mod kv;
pub mod operator;

pub use health::check_health;
pub use kv::{keys, KvStore, KvStoreExt};
pub use operator::{build_operator, open_stores, Backend, OpendalStore, Stores};
