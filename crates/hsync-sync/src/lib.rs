//! hsync-sync: WebDAV sync engine with retry, merge and a cross-instance lock

pub mod client;
pub mod codec;
pub mod engine;
pub mod history;
pub mod lock;
pub mod log;
pub mod merge;
pub mod retry;
pub mod transport;

pub use client::WebDavClient;
pub use engine::{RemoteHistory, SyncEngine, UploadReport};
pub use history::{HistoryProvider, JsonFileHistory};
pub use lock::SyncLock;
pub use log::SyncLog;
pub use merge::{merge, MergeResult};
pub use retry::{fetch_with_retry, RetryPolicy};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, Method, ReqwestTransport};
