//! HTTP Client Abstraction
//!
//! Provider connectors only ever talk to the network through [`HttpClient`].
//! The contract is deliberately thin: one attempt per call, non-2xx statuses
//! come back as responses, and transport failures come back as a classified
//! [`BridgeError::Transport`]. Retrying is the migration engine's decision.

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{BridgeError, Result};

/// Streaming response body.
pub type ByteStream = Box<dyn tokio::io::AsyncRead + Send + Unpin>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Bytes>,
    /// Overrides the client's default timeout
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn bearer_token(self, token: impl Into<String>) -> Self {
        self.header("Authorization", format!("Bearer {}", token.into()))
    }

    /// `Content-Range: bytes start-end/total`, with `end` inclusive.
    pub fn content_range(self, start: u64, end: u64, total: u64) -> Self {
        self.header("Content-Range", format!("bytes {}-{}/{}", start, end, total))
    }

    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self> {
        let json = serde_json::to_vec(body).map_err(|e| {
            BridgeError::OperationFailed(format!("JSON serialization failed: {}", e))
        })?;
        self.body = Some(Bytes::from(json));
        Ok(self.header("Content-Type", "application/json"))
    }

    /// Raw body; also sets `Content-Length`.
    pub fn body(mut self, body: Bytes) -> Self {
        let len = body.len();
        self.body = Some(body);
        self.header("Content-Length", len.to_string())
    }

    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }
}

#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    /// Lower-cased header names
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Response whose body has not been read yet.
pub struct StreamingResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: ByteStream,
}

impl StreamingResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// `Content-Length`, when the server sent one.
    pub fn content_length(&self) -> Option<u64> {
        self.headers
            .get("content-length")
            .and_then(|value| value.parse().ok())
    }

    /// Drain the body into memory. Used for error payloads.
    pub async fn into_bytes(mut self) -> Result<Bytes> {
        use tokio::io::AsyncReadExt;

        let mut buf = Vec::new();
        self.body.read_to_end(&mut buf).await?;
        Ok(Bytes::from(buf))
    }
}

impl std::fmt::Debug for StreamingResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Send `request` once and buffer the response body.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Transport`] when no response was received (refused
    /// connection, DNS failure, timeout, TLS failure, reset mid-body).
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;

    /// Send `request` once and hand back the body unread.
    ///
    /// Used for file downloads, which are never buffered in full. Read errors
    /// on the stream surface as `std::io::Error` from the reader.
    async fn download_stream(&self, request: HttpRequest) -> Result<StreamingResponse>;
}
