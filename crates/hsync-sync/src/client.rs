//! WebDAV client for the single remote history object

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hsync_core::{HsyncError, HsyncResult, WebDavConfig};
use url::Url;

use crate::retry::{fetch_with_retry, RetryPolicy};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, Method};

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_ENCRYPTED: &str = "application/octet-stream";

pub struct WebDavClient {
    transport: Arc<dyn HttpTransport>,
    base_url: Url,
    file_url: Url,
    authorization: String,
    policy: RetryPolicy,
}

impl std::fmt::Debug for WebDavClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebDavClient")
            .field("base_url", &self.base_url.as_str())
            .field("file_url", &self.file_url.as_str())
            .field("authorization", &"[REDACTED]")
            .finish()
    }
}

impl WebDavClient {
    /// `remote_file` is resolved against the configured URL treated as a
    /// collection (a trailing `/` is added if missing).
    pub fn new(
        config: &WebDavConfig,
        remote_file: &str,
        transport: Arc<dyn HttpTransport>,
        policy: RetryPolicy,
    ) -> HsyncResult<Self> {
        let mut base = config.url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url =
            Url::parse(&base).map_err(|_| HsyncError::Config("Invalid URL format".into()))?;
        let file_url = base_url
            .join(remote_file)
            .map_err(|e| HsyncError::Config(format!("invalid remote file name {remote_file:?}: {e}")))?;

        let credentials = format!(
            "{}:{}",
            config.username,
            config.password().unwrap_or_default()
        );
        let authorization = format!("Basic {}", STANDARD.encode(credentials));

        Ok(Self {
            transport,
            base_url,
            file_url,
            authorization,
            policy,
        })
    }

    pub fn file_url(&self) -> &str {
        self.file_url.as_str()
    }

    fn request(&self, method: Method, url: &Url) -> HttpRequest {
        HttpRequest::new(method, url.as_str()).header("Authorization", self.authorization.clone())
    }

    async fn send(&self, request: HttpRequest) -> HsyncResult<HttpResponse> {
        fetch_with_retry(self.transport.as_ref(), &request, &self.policy).await
    }

    /// PROPFIND with `Depth: 0` on the collection; any 2xx (usually 207) is ok.
    pub async fn test_connection(&self) -> HsyncResult<()> {
        let request = self.request(Method::Propfind, &self.base_url).header("Depth", "0");
        let resp = self.send(request).await?;
        if resp.is_success() {
            tracing::info!(url = %self.base_url, status = resp.status, "WebDAV connection ok");
            Ok(())
        } else {
            Err(HsyncError::Rejected {
                status: resp.status,
            })
        }
    }

    /// Fetch the remote history object. `None` when it does not exist yet.
    pub async fn get_history(&self) -> HsyncResult<Option<Vec<u8>>> {
        let resp = self.send(self.request(Method::Get, &self.file_url)).await?;
        if resp.status == 404 {
            tracing::debug!(url = %self.file_url, "remote history not found");
            return Ok(None);
        }
        Ok(Some(resp.body))
    }

    /// Replace the remote history object.
    pub async fn put_history(&self, body: Vec<u8>, content_type: &str) -> HsyncResult<()> {
        let bytes = body.len();
        let request = self
            .request(Method::Put, &self.file_url)
            .header("Content-Type", content_type)
            .body(body);
        let resp = self.send(request).await?;
        if !resp.is_success() {
            return Err(HsyncError::Rejected {
                status: resp.status,
            });
        }
        tracing::debug!(url = %self.file_url, bytes, status = resp.status, "uploaded history");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    struct Recorder {
        status: u16,
        seen: Mutex<Vec<HttpRequest>>,
    }

    #[async_trait]
    impl HttpTransport for Recorder {
        async fn send(&self, request: &HttpRequest) -> HsyncResult<HttpResponse> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(HttpResponse::new(self.status, b"[]".to_vec()))
        }
    }

    fn config(url: &str) -> WebDavConfig {
        WebDavConfig {
            url: url.into(),
            username: "alice".into(),
            password: Some("s3cret-pass".into()),
            ..Default::default()
        }
    }

    fn client(url: &str, status: u16) -> (WebDavClient, Arc<Recorder>) {
        let recorder = Arc::new(Recorder {
            status,
            seen: Mutex::new(Vec::new()),
        });
        let policy = RetryPolicy {
            max_retries: 1,
            base_delay: Duration::from_millis(1),
        };
        let client = WebDavClient::new(&config(url), "history.json", recorder.clone(), policy)
            .unwrap();
        (client, recorder)
    }

    #[test]
    fn test_file_url_resolution() {
        let (c, _) = client("https://dav.example.com/remote.php/dav/files/alice/hsync", 200);
        assert_eq!(
            c.file_url(),
            "https://dav.example.com/remote.php/dav/files/alice/hsync/history.json"
        );
        let (c, _) = client("https://dav.example.com/", 200);
        assert_eq!(c.file_url(), "https://dav.example.com/history.json");
    }

    #[test]
    fn test_invalid_url_is_config_error() {
        let policy = RetryPolicy::default();
        let transport: Arc<dyn HttpTransport> = Arc::new(Recorder {
            status: 200,
            seen: Mutex::new(Vec::new()),
        });
        let err = WebDavClient::new(&config("not a url"), "history.json", transport, policy)
            .unwrap_err();
        assert!(matches!(err, HsyncError::Config(_)));
    }

    #[test]
    fn test_debug_redacts_credentials() {
        let (c, _) = client("https://dav.example.com/", 200);
        let debug = format!("{c:?}");
        assert!(!debug.contains(&STANDARD.encode("alice:s3cret-pass")));
        assert!(debug.contains("REDACTED"));
    }

    #[tokio::test]
    async fn test_propfind_depth_zero_with_basic_auth() {
        let (c, rec) = client("https://dav.example.com/hsync/", 207);
        c.test_connection().await.unwrap();

        let seen = rec.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].method, Method::Propfind);
        assert_eq!(seen[0].url, "https://dav.example.com/hsync/");
        assert_eq!(seen[0].header_value("Depth"), Some("0"));
        let expected = format!("Basic {}", STANDARD.encode("alice:s3cret-pass"));
        assert_eq!(seen[0].header_value("Authorization"), Some(expected.as_str()));
    }

    #[tokio::test]
    async fn test_connection_not_found_is_rejected() {
        let (c, _) = client("https://dav.example.com/missing/", 404);
        let err = c.test_connection().await.unwrap_err();
        assert!(matches!(err, HsyncError::Rejected { status: 404 }));
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let (c, _) = client("https://dav.example.com/", 404);
        assert_eq!(c.get_history().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_put_sets_content_type() {
        let (c, rec) = client("https://dav.example.com/", 201);
        c.put_history(b"[]".to_vec(), CONTENT_TYPE_JSON).await.unwrap();
        let seen = rec.seen.lock().unwrap();
        assert_eq!(seen[0].method, Method::Put);
        assert_eq!(seen[0].header_value("Content-Type"), Some(CONTENT_TYPE_JSON));
        assert_eq!(seen[0].body.as_deref(), Some(&b"[]"[..]));
    }

    #[tokio::test]
    async fn test_put_not_found_is_rejected() {
        let (c, _) = client("https://dav.example.com/", 404);
        let err = c.put_history(Vec::new(), CONTENT_TYPE_JSON).await.unwrap_err();
        assert!(matches!(err, HsyncError::Rejected { status: 404 }));
    }
}
