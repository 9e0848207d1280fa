//! Bounded retry around single HTTP requests

use std::time::Duration;

use hsync_core::{HsyncError, HsyncResult};
use tracing::{debug, warn};

use crate::transport::{HttpRequest, HttpResponse, HttpTransport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_retries: u32,
    /// Linear backoff unit: the wait after attempt `n` (0-based) is `base_delay * (n + 1)`
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(cfg: &hsync_core::config::SyncConfig) -> Self {
        Self {
            max_retries: cfg.max_retries,
            base_delay: cfg.base_delay(),
        }
    }
}

/// Statuses worth another attempt
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 0 | 408 | 429 | 500..=599)
}

fn is_network_failure(err: &HsyncError) -> bool {
    if matches!(err, HsyncError::Network(_)) {
        return true;
    }
    let msg = err.to_string().to_ascii_lowercase();
    ["network", "timeout", "fetch failed"]
        .iter()
        .any(|w| msg.contains(w))
}

/// Send `request`, retrying transient failures.
///
/// - 2xx or 404: returned as a response
/// - 401/403: `Authentication`, never retried
/// - 0, 408, 429, 5xx and network failures: retried
/// - any other status: `Rejected`, not retried
///
/// After the last attempt the most recent error is returned.
pub async fn fetch_with_retry(
    transport: &dyn HttpTransport,
    request: &HttpRequest,
    policy: &RetryPolicy,
) -> HsyncResult<HttpResponse> {
    let attempts = policy.max_retries.max(1);
    let mut last_err = HsyncError::Network("no attempt made".into());

    for attempt in 0..attempts {
        match transport.send(request).await {
            Ok(resp) if resp.is_success() || resp.status == 404 => return Ok(resp),
            Ok(resp) if matches!(resp.status, 401 | 403) => {
                return Err(HsyncError::Authentication(format!(
                    "HTTP {} from WebDAV server",
                    resp.status
                )));
            }
            Ok(resp) if is_retryable_status(resp.status) => {
                last_err = HsyncError::Server {
                    status: resp.status,
                };
            }
            Ok(resp) => return Err(HsyncError::Rejected { status: resp.status }),
            Err(e) if is_network_failure(&e) => last_err = e,
            Err(e) => return Err(e),
        }

        if attempt + 1 < attempts {
            let delay = policy.base_delay * (attempt + 1);
            warn!(
                method = request.method.as_str(),
                attempt = attempt + 1,
                of = attempts,
                error = %last_err,
                delay_ms = delay.as_millis() as u64,
                "request failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    debug!(error = %last_err, "retries exhausted");
    Err(last_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Method;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned outcomes in order and counts calls
    struct Scripted {
        outcomes: Mutex<VecDeque<HsyncResult<HttpResponse>>>,
        calls: Mutex<u32>,
    }

    impl Scripted {
        fn new(outcomes: Vec<HsyncResult<HttpResponse>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into()),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl HttpTransport for Scripted {
        async fn send(&self, _request: &HttpRequest) -> HsyncResult<HttpResponse> {
            *self.calls.lock().unwrap() += 1;
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(HttpResponse::new(500, Vec::new())))
        }
    }

    fn fast() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(1),
        }
    }

    fn get() -> HttpRequest {
        HttpRequest::new(Method::Get, "https://dav.example/history.json")
    }

    #[tokio::test]
    async fn test_succeeds_on_third_attempt() {
        let t = Scripted::new(vec![
            Err(HsyncError::Network("connection reset".into())),
            Ok(HttpResponse::new(503, Vec::new())),
            Ok(HttpResponse::new(200, b"[]".to_vec())),
        ]);
        let resp = fetch_with_retry(&t, &get(), &fast()).await.unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(t.calls(), 3);
    }

    #[tokio::test]
    async fn test_unauthorized_is_not_retried() {
        for status in [401, 403] {
            let t = Scripted::new(vec![Ok(HttpResponse::new(status, Vec::new()))]);
            let err = fetch_with_retry(&t, &get(), &fast()).await.unwrap_err();
            assert!(matches!(err, HsyncError::Authentication(_)));
            assert_eq!(t.calls(), 1);
        }
    }

    #[tokio::test]
    async fn test_server_error_exhausts_attempts() {
        let t = Scripted::new(Vec::new());
        let err = fetch_with_retry(&t, &get(), &fast()).await.unwrap_err();
        assert!(matches!(err, HsyncError::Server { status: 500 }));
        assert_eq!(t.calls(), 3);
    }

    #[tokio::test]
    async fn test_not_found_is_a_response() {
        let t = Scripted::new(vec![Ok(HttpResponse::new(404, Vec::new()))]);
        let resp = fetch_with_retry(&t, &get(), &fast()).await.unwrap();
        assert_eq!(resp.status, 404);
        assert_eq!(t.calls(), 1);
    }

    #[tokio::test]
    async fn test_other_client_error_is_terminal() {
        let t = Scripted::new(vec![Ok(HttpResponse::new(405, Vec::new()))]);
        let err = fetch_with_retry(&t, &get(), &fast()).await.unwrap_err();
        assert!(matches!(err, HsyncError::Rejected { status: 405 }));
        assert_eq!(t.calls(), 1);
    }

    #[tokio::test]
    async fn test_opaque_timeout_message_is_retried() {
        let t = Scripted::new(vec![
            Err(HsyncError::Other(anyhow::anyhow!("operation timeout"))),
            Ok(HttpResponse::new(200, Vec::new())),
        ]);
        fetch_with_retry(&t, &get(), &fast()).await.unwrap();
        assert_eq!(t.calls(), 2);
    }

    #[tokio::test]
    async fn test_non_network_error_is_terminal() {
        let t = Scripted::new(vec![Err(HsyncError::Format("bad".into()))]);
        assert!(fetch_with_retry(&t, &get(), &fast()).await.is_err());
        assert_eq!(t.calls(), 1);
    }

    #[tokio::test]
    async fn test_status_zero_and_throttling_are_retried() {
        let t = Scripted::new(vec![
            Ok(HttpResponse::new(0, Vec::new())),
            Ok(HttpResponse::new(429, Vec::new())),
            Ok(HttpResponse::new(408, Vec::new())),
        ]);
        let err = fetch_with_retry(&t, &get(), &fast()).await.unwrap_err();
        assert!(matches!(err, HsyncError::Server { status: 408 }));
        assert_eq!(t.calls(), 3);
    }

    #[tokio::test]
    async fn test_single_attempt_policy() {
        let t = Scripted::new(Vec::new());
        let policy = RetryPolicy {
            max_retries: 1,
            base_delay: Duration::from_millis(1),
        };
        assert!(fetch_with_retry(&t, &get(), &policy).await.is_err());
        assert_eq!(t.calls(), 1);
    }
}
