//! In-memory WebDAV server behind the `HttpTransport` seam

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hsync_core::{HsyncError, HsyncResult};
use hsync_sync::{HttpRequest, HttpResponse, HttpTransport, Method};

pub struct MockWebDav {
    authorization: String,
    files: Mutex<HashMap<String, (Vec<u8>, String)>>,
    /// Outcomes served before normal handling, one per request
    injected: Mutex<VecDeque<HsyncResult<HttpResponse>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockWebDav {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            authorization: format!("Basic {}", STANDARD.encode(format!("{username}:{password}"))),
            files: Mutex::new(HashMap::new()),
            injected: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn inject(&self, outcome: HsyncResult<HttpResponse>) {
        self.injected.lock().unwrap().push_back(outcome);
    }

    pub fn inject_network_errors(&self, n: usize) {
        for _ in 0..n {
            self.inject(Err(HsyncError::Network("connection refused".into())));
        }
    }

    pub fn put_file(&self, url: &str, body: Vec<u8>, content_type: &str) {
        self.files
            .lock()
            .unwrap()
            .insert(url.to_string(), (body, content_type.to_string()));
    }

    pub fn file(&self, url: &str) -> Option<(Vec<u8>, String)> {
        self.files.lock().unwrap().get(url).cloned()
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, method: Method) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method)
            .count()
    }
}

#[async_trait]
impl HttpTransport for MockWebDav {
    async fn send(&self, request: &HttpRequest) -> HsyncResult<HttpResponse> {
        self.requests.lock().unwrap().push(request.clone());

        if let Some(outcome) = self.injected.lock().unwrap().pop_front() {
            return outcome;
        }

        if request.header_value("Authorization") != Some(self.authorization.as_str()) {
            return Ok(HttpResponse::new(401, Vec::new()));
        }

        let mut files = self.files.lock().unwrap();
        match request.method {
            Method::Propfind => Ok(HttpResponse::new(207, b"<multistatus/>".to_vec())),
            Method::Get => match files.get(&request.url) {
                Some((body, _)) => Ok(HttpResponse::new(200, body.clone())),
                None => Ok(HttpResponse::new(404, Vec::new())),
            },
            Method::Put => {
                let content_type = request.header_value("Content-Type").unwrap_or("").to_string();
                let body = request.body.clone().unwrap_or_default();
                let status = if files.contains_key(&request.url) { 204 } else { 201 };
                files.insert(request.url.clone(), (body, content_type));
                Ok(HttpResponse::new(status, Vec::new()))
            }
        }
    }
}
