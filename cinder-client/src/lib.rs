use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

pub mod error;
pub mod sentinel;
pub mod wire;

pub use error::{ErrorKind, ExecutionError};
pub use sentinel::Sentinel;
pub use wire::{CompileReply, CompileRequest, CompileResponse, interpret_reply};

/// The interface for any compile-and-run backend.
#[async_trait]
pub trait CompileBackend: Send + Sync {
    /// Exactly one round trip. Never retries.
    async fn execute(&self, request: &CompileRequest) -> Result<CompileResponse, ExecutionError>;
}

/// Direct HTTP client for the remote compile service.
#[derive(Debug, Clone)]
pub struct HttpCompileClient {
    http: Client,
    base_url: String,
    timeout: Option<Duration>,
    sentinel: Sentinel,
}

impl HttpCompileClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: None,
            sentinel: Sentinel::default(),
        }
    }

    /// Use a preconfigured reqwest client (proxy, TLS, headers).
    pub fn with_http(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    /// Deadline for a whole round trip. Elapsing yields `ExecutionError::Timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_sentinel(mut self, sentinel: Sentinel) -> Self {
        self.sentinel = sentinel;
        self
    }

    pub fn endpoint(&self) -> String {
        format!("{}/api/compile", self.base_url)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn classify(&self, err: reqwest::Error) -> ExecutionError {
        if err.is_timeout() {
            return ExecutionError::Timeout(self.timeout.unwrap_or_default());
        }
        if err.is_connect() || err.is_request() {
            return ExecutionError::Transport(err.to_string());
        }
        ExecutionError::Unknown(err.to_string())
    }
}

#[async_trait]
impl CompileBackend for HttpCompileClient {
    async fn execute(&self, request: &CompileRequest) -> Result<CompileResponse, ExecutionError> {
        let url = self.endpoint();
        debug!(
            "POST {} ({} bytes source, {} bytes stdin)",
            url,
            request.source.len(),
            request.stdin.len()
        );

        let mut builder = self.http.post(&url).json(request);
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        let resp = builder.send().await.map_err(|e| self.classify(e))?;

        let status = resp.status().as_u16();
        let text = resp.text().await.map_err(|e| self.classify(e))?;

        let result = interpret_reply(status, &text, &self.sentinel);
        if let Err(e) = &result {
            warn!("Compile service round trip failed: {:?}", e);
        }
        result
    }
}
